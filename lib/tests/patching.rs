mod common;

use addon_patcher::jvm::class_file::{
    BootstrapMethods, BytecodeIndex, ClassFile, ExceptionHandler, LineNumber, LineNumberTable,
    StackMapFrame, StackMapTable, Version, VerificationType,
};
use addon_patcher::jvm::code::{decode_code, BranchInstruction, Instruction, Op};
use addon_patcher::jvm::{ClassConstantIndex, ConstantIndex, Offset};
use addon_patcher::patch::{self, Error};
use addon_patcher::{patch_class, Profile};
use common::*;

/// `ScriptLoader.currentScript = ScriptLoader.currentScript; return ScriptLoader.hasDelayBefore`
fn field_access_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("com/example/Fields");
    let current_script = class.field(SCRIPT_LOADER, "currentScript", CONFIG);
    let has_delay = class.field(SCRIPT_LOADER, "hasDelayBefore", "Lch/njol/util/Kleenean;");
    let unrelated = class.field(SCRIPT_LOADER, "loadedScripts", "I");

    let mut bytes = vec![0xb2];
    bytes.extend(idx(current_script)); // getstatic currentScript
    bytes.push(0xb3);
    bytes.extend(idx(current_script)); // putstatic currentScript
    bytes.push(0xb2);
    bytes.extend(idx(unrelated)); // getstatic loadedScripts
    bytes.push(0x57); // pop
    bytes.push(0xb2);
    bytes.extend(idx(has_delay)); // getstatic hasDelayBefore
    bytes.push(0xb0); // areturn
    class.add_method("fields", "()Lch/njol/util/Kleenean;", code(1, 0, bytes));
    class.build()
}

/// `return parser.getCurrentScript()` with the old `Config` return type
fn current_script_class(version: Version) -> Vec<u8> {
    let mut class = ClassBuilder::new("com/example/CurrentScript").version(version);
    let getter = class.method(PARSER_INSTANCE, "getCurrentScript", &format!("(){}", CONFIG));
    let mut bytes = vec![0x2a, 0xb6]; // aload_0; invokevirtual
    bytes.extend(idx(getter));
    bytes.push(0xb0); // areturn
    class.add_method(
        "currentScript",
        &format!("(L{};){}", PARSER_INSTANCE, CONFIG),
        code(1, 1, bytes),
    );
    class.build()
}

/// `return trigger.getScript()` with the old `File` return type
fn trigger_script_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("com/example/TriggerScript");
    let getter = class.method(TRIGGER, "getScript", &format!("(){}", FILE));
    let mut bytes = vec![0x2a, 0xb6];
    bytes.extend(idx(getter));
    bytes.push(0xb0);
    class.add_method(
        "scriptFile",
        &format!("(L{};){}", TRIGGER, FILE),
        code(1, 1, bytes),
    );
    class.build()
}

/// `return new Trigger(file, "on load", event, items)`
fn trigger_constructor_class() -> Vec<u8> {
    let mut class = ClassBuilder::new("com/example/NewTrigger");
    let trigger = class.class(TRIGGER);
    let name = class.string("on load");
    let constructor = class.method(
        TRIGGER,
        "<init>",
        &format!("({}Ljava/lang/String;{}{})V", FILE, SKRIPT_EVENT, LIST),
    );

    let mut bytes = vec![0xbb];
    bytes.extend(idx(trigger)); // new Trigger
    bytes.push(0x59); // dup
    bytes.push(0x2a); // aload_0
    bytes.push(0x12); // ldc "on load"
    bytes.push(idx(name)[1]);
    bytes.push(0x2b); // aload_1
    bytes.push(0x2c); // aload_2
    bytes.push(0xb7);
    bytes.extend(idx(constructor)); // invokespecial
    bytes.push(0xb0); // areturn
    class.add_method(
        "newTrigger",
        &format!("({}{}{})L{};", FILE, SKRIPT_EVENT, LIST, TRIGGER),
        code(6, 3, bytes),
    );
    class.build()
}

#[test]
fn field_accesses_become_accessor_calls() {
    for profile in Profile::ALL {
        let patched = patch_class(&field_access_class(), profile).unwrap();
        assert!(patched.changed);
        assert_eq!(patched.substitutions.count("field access"), 3);

        let class = ClassFile::parse(&patched.bytes).unwrap();
        let trace = run_method(&class, "fields", &[]);
        assert_eq!(trace.field_accesses, ["get ScriptLoader.loadedScripts"]);

        let getters = trace.calls_to(SCRIPT_LOADER, "getCurrentScript");
        assert_eq!(getters.len(), 1);
        assert!(getters[0].static_call);
        assert_eq!(getters[0].descriptor, format!("(){}", CONFIG));

        let setters = trace.calls_to(SCRIPT_LOADER, "setCurrentScript");
        assert_eq!(setters.len(), 1);
        assert_eq!(setters[0].descriptor, format!("({})V", CONFIG));
        assert_eq!(setters[0].arguments[0].expr, "ScriptLoader.getCurrentScript()");

        assert_eq!(trace.stack.len(), 1);
        assert_eq!(trace.stack[0].expr, "ScriptLoader.getHasDelayBefore()");
        assert_eq!(trace.stack[0].typ, "Lch/njol/util/Kleenean;");
    }
}

#[test]
fn patching_is_idempotent() {
    let classes = [
        field_access_class(),
        current_script_class(Version::JAVA8),
        trigger_script_class(),
        trigger_constructor_class(),
    ];
    for profile in Profile::ALL {
        for original in &classes {
            let once = patch_class(original, profile).unwrap();
            let twice = patch_class(&once.bytes, profile).unwrap();
            assert!(!twice.changed, "{} profile patched its own output", profile);
            assert_eq!(twice.bytes, once.bytes);
        }
    }
}

#[test]
fn classes_without_legacy_shapes_are_untouched() {
    let mut class = ClassBuilder::new("com/example/Clean");
    let println = class.method("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let out = class.field("java/lang/System", "out", "Ljava/io/PrintStream;");
    let hello = class.string("hello");

    let mut bytes = vec![0xb2];
    bytes.extend(idx(out));
    bytes.push(0x12);
    bytes.push(idx(hello)[1]);
    bytes.push(0xb6);
    bytes.extend(idx(println));
    bytes.push(0xb1);
    class.add_method("hello", "()V", code(2, 0, bytes));
    let original = class.build();

    for profile in Profile::ALL {
        let patched = patch_class(&original, profile).unwrap();
        assert!(!patched.changed);
        assert_eq!(patched.substitutions.total(), 0);
        assert_eq!(patched.bytes, original);
    }
}

#[test]
fn current_script_is_null_safe() {
    let patched = patch_class(&current_script_class(Version::JAVA8), Profile::Structure).unwrap();
    assert!(patched.changed);
    assert_eq!(patched.substitutions.count("call site"), 1);

    let class = ClassFile::parse(&patched.bytes).unwrap();
    let trace = run_method(&class, "currentScript", &[&format!("L{};", PARSER_INSTANCE)]);
    assert_eq!(trace.stack.len(), 1);
    assert_eq!(trace.stack[0].typ, CONFIG);
    assert_eq!(
        trace.stack[0].expr,
        "Optional.ofNullable(local0)\
         .filter(ParserInstance::isActive)\
         .map(ParserInstance::getCurrentScript)\
         .map(Script::getConfig)\
         .orElse(null)"
    );

    // Predicate, and one function per hop
    let bootstrap_methods: BootstrapMethods = class
        .attributes
        .iter()
        .find(|attribute| attribute.is::<BootstrapMethods>(&class.constants).unwrap())
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(bootstrap_methods.0.len(), 3);

    let code = method_code(&class, "currentScript");
    assert_eq!(code.max_stack as usize, trace.max_depth);
    assert_eq!(code.max_stack, 2);
}

#[test]
fn current_script_is_null_while_parser_is_inactive() {
    let patched = patch_class(&current_script_class(Version::JAVA8), Profile::Structure).unwrap();
    let class = ClassFile::parse(&patched.bytes).unwrap();
    let parser = format!("L{};", PARSER_INSTANCE);

    let inactive = run_method_where(&class, "currentScript", &[&parser], &[("isActive", false)]);
    assert_eq!(inactive.stack.len(), 1);
    assert_eq!(inactive.stack[0].typ, CONFIG);
    assert_eq!(inactive.stack[0].expr, "null");
    assert_eq!(inactive.calls_to(PARSER_INSTANCE, "isActive").len(), 1);
    assert!(inactive.calls_to(PARSER_INSTANCE, "getCurrentScript").is_empty());

    let active = run_method_where(&class, "currentScript", &[&parser], &[("isActive", true)]);
    assert_eq!(active.stack[0].typ, CONFIG);
    assert_eq!(active.stack[0].expr, "local0.getCurrentScript().getConfig()");
    assert_eq!(active.calls_to(PARSER_INSTANCE, "getCurrentScript").len(), 1);
}

#[test]
fn current_script_of_null_parser_is_null() {
    let patched = patch_class(&current_script_class(Version::JAVA8), Profile::Structure).unwrap();
    let class = ClassFile::parse(&patched.bytes).unwrap();

    // The predicate never gets asked about an empty optional
    let trace = run_method_where(&class, "currentScript", &["null"], &[]);
    assert_eq!(trace.stack[0].expr, "null");
    assert!(trace.calls.is_empty());
}

#[test]
fn current_script_direct_chain() {
    let patched = patch_class(&current_script_class(Version::JAVA8), Profile::Parallel).unwrap();
    assert!(patched.changed);

    let class = ClassFile::parse(&patched.bytes).unwrap();
    let trace = run_method(&class, "currentScript", &[&format!("L{};", PARSER_INSTANCE)]);
    assert_eq!(trace.stack.len(), 1);
    assert_eq!(trace.stack[0].typ, CONFIG);
    assert_eq!(trace.stack[0].expr, "local0.getCurrentScript().getConfig()");
    assert_eq!(trace.calls[0].descriptor, format!("(){}", SCRIPT));

    // No function references needed
    assert!(class
        .attributes
        .iter()
        .all(|attribute| !attribute.is::<BootstrapMethods>(&class.constants).unwrap()));
    assert_eq!(method_code(&class, "currentScript").max_stack, 1);
}

#[test]
fn function_references_need_invokedynamic() {
    let java6 = Version {
        major_version: 50,
        minor_version: 0,
    };
    let original = current_script_class(java6);
    assert!(matches!(
        patch_class(&original, Profile::Structure),
        Err(Error::InvokeDynamicUnsupported { version }) if version == java6
    ));

    // The direct chain needs no `invokedynamic`
    assert!(patch_class(&original, Profile::Parallel).unwrap().changed);
}

#[test]
fn trigger_script_is_reached_through_hops() {
    let original = trigger_script_class();
    assert!(!patch_class(&original, Profile::Parallel).unwrap().changed);

    let patched = patch_class(&original, Profile::Structure).unwrap();
    let class = ClassFile::parse(&patched.bytes).unwrap();
    let trace = run_method(&class, "scriptFile", &[&format!("L{};", TRIGGER)]);
    assert_eq!(trace.stack.len(), 1);
    assert_eq!(trace.stack[0].typ, FILE);
    assert_eq!(trace.stack[0].expr, "local0.getScript().getConfig().getFile()");
}

#[test]
fn trigger_constructor_arguments_are_reordered() {
    let original = trigger_constructor_class();
    let locals = [FILE, SKRIPT_EVENT, LIST];

    let before = run_method(&ClassFile::parse(&original).unwrap(), "newTrigger", &locals);
    let patched = patch_class(&original, Profile::Structure).unwrap();
    assert_eq!(patched.substitutions.count("constructor"), 1);
    let class = ClassFile::parse(&patched.bytes).unwrap();
    let after = run_method(&class, "newTrigger", &locals);

    // Same stack once the object is constructed
    assert_eq!(before.stack, after.stack);
    assert_eq!(after.stack[0].typ, format!("L{};", TRIGGER));

    let constructors = after.calls_to(TRIGGER, "<init>");
    assert_eq!(constructors.len(), 1);
    let constructor = constructors[0];
    assert_eq!(
        constructor.descriptor,
        format!("({}Ljava/lang/String;{}{})V", SCRIPT, SKRIPT_EVENT, LIST)
    );

    let arguments: Vec<&str> = constructor
        .arguments
        .iter()
        .map(|argument| argument.expr.as_str())
        .collect();
    assert_eq!(
        arguments,
        [
            "new Trigger",
            "Optional.ofNullable(local0).map(ScriptLoader::getScript).orElse(null)",
            "\"on load\"",
            "local1",
            "local2",
        ]
    );
    assert_eq!(constructor.arguments[1].typ, SCRIPT);

    let code = method_code(&class, "newTrigger");
    assert_eq!(code.max_stack as usize, after.max_depth);
    assert!(code.max_stack > 6);
}

#[test]
fn branches_handlers_and_frames_follow_substitutions() {
    let mut builder = ClassBuilder::new("com/example/Guarded");
    let getter = builder.method(PARSER_INSTANCE, "getCurrentScript", &format!("(){}", CONFIG));
    let throwable = builder.class("java/lang/Throwable");

    let mut bytes = vec![
        0x2a, // 0: aload_0
        0xc6, 0x00, 0x09, // 1: ifnull 10
        0x2a, // 4: aload_0
        0xb6, // 5: invokevirtual getCurrentScript
    ];
    bytes.extend(idx(getter));
    bytes.extend([
        0xb0, // 8: areturn
        0x57, // 9: pop (handler)
        0x01, // 10: aconst_null
        0xb0, // 11: areturn
    ]);

    let mut code = code(1, 1, bytes);
    code.exception_table.push(ExceptionHandler {
        start_pc: BytecodeIndex(4),
        end_pc: BytecodeIndex(8),
        handler_pc: BytecodeIndex(9),
        catch_type: ClassConstantIndex(ConstantIndex(0)),
    });
    let frames = StackMapTable(vec![
        StackMapFrame::SameLocalsOneStack {
            offset_delta: 9,
            stack: VerificationType::Object(throwable),
        },
        StackMapFrame::SameLocalsNoStack { offset_delta: 0 },
    ]);
    let lines = LineNumberTable(vec![
        LineNumber {
            start_pc: BytecodeIndex(0),
            line_number: 1,
        },
        LineNumber {
            start_pc: BytecodeIndex(4),
            line_number: 2,
        },
        LineNumber {
            start_pc: BytecodeIndex(10),
            line_number: 3,
        },
    ]);
    code.attributes.push(builder.attribute(&frames));
    code.attributes.push(builder.attribute(&lines));
    builder.add_method(
        "guarded",
        &format!("(L{};)Ljava/lang/Object;", PARSER_INSTANCE),
        code,
    );

    let patched = patch_class(&builder.build(), Profile::Structure).unwrap();
    let class = ClassFile::parse(&patched.bytes).unwrap();
    let code = method_code(&class, "guarded");

    // The 3-byte call became 34 bytes, so everything after offset 8 moved by 31
    assert_eq!(code.code_array.0.len(), 43);
    let items = decode_code(&code.code_array.0).unwrap();
    assert!(matches!(
        items[1].op,
        Op::Branch(BranchInstruction::IfNull(_, Offset(41)))
    ));
    assert!(matches!(items[3].op, Op::Plain(Instruction::Invoke(_, _))));

    assert_eq!(
        code.exception_table,
        [ExceptionHandler {
            start_pc: BytecodeIndex(4),
            end_pc: BytecodeIndex(39),
            handler_pc: BytecodeIndex(40),
            catch_type: ClassConstantIndex(ConstantIndex(0)),
        }]
    );

    let mut frames = None;
    let mut lines = None;
    for attribute in &code.attributes {
        if attribute.is::<StackMapTable>(&class.constants).unwrap() {
            frames = Some(attribute.decode::<StackMapTable>().unwrap());
        } else if attribute.is::<LineNumberTable>(&class.constants).unwrap() {
            lines = Some(attribute.decode::<LineNumberTable>().unwrap());
        }
    }
    let frames = frames.unwrap();
    assert_eq!(frames.0[0].offset_delta(), 40);
    assert_eq!(frames.0[1].offset_delta(), 0);
    let starts: Vec<u16> = lines.unwrap().0.iter().map(|line| line.start_pc.0).collect();
    assert_eq!(starts, [0, 4, 41]);

    // Deepest point is inside the null-safe chain
    assert_eq!(code.max_stack, 2);
}

#[test]
fn undecodable_classes_are_errors() {
    assert!(matches!(
        patch_class(b"not a class", Profile::Structure),
        Err(patch::Error::Jvm(_))
    ));

    let mut truncated = field_access_class();
    truncated.truncate(truncated.len() - 3);
    assert!(patch_class(&truncated, Profile::Parallel).is_err());
}
