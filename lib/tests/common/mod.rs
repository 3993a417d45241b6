#![allow(dead_code)]

use addon_patcher::jvm::class_file::{
    Attribute, AttributeLike, BootstrapMethods, ClassFile, Code, ConstantsPool, Method, Version,
};
use addon_patcher::jvm::code::{decode_code, BranchInstruction, Instruction, InvokeType, Op};
use addon_patcher::jvm::{
    parse_method_descriptor, ClassAccessFlags, ClassConstantIndex, Constant, ConstantIndex,
    FieldRefConstantIndex, HandleKind, MethodAccessFlags, MethodRefConstantIndex,
    RenderDescriptor,
};
use std::collections::HashMap;

pub const SCRIPT_LOADER: &str = "ch/njol/skript/ScriptLoader";
pub const PARSER_INSTANCE: &str = "ch/njol/skript/lang/parser/ParserInstance";
pub const TRIGGER: &str = "ch/njol/skript/lang/Trigger";
pub const CONFIG: &str = "Lch/njol/skript/config/Config;";
pub const SCRIPT: &str = "Lorg/skriptlang/skript/lang/script/Script;";
pub const FILE: &str = "Ljava/io/File;";
pub const SKRIPT_EVENT: &str = "Lch/njol/skript/lang/SkriptEvent;";
pub const LIST: &str = "Ljava/util/List;";

/// Big-endian bytes of a constant index, for splicing into hand-written bytecode
pub fn idx(index: impl Into<ConstantIndex>) -> [u8; 2] {
    index.into().0.to_be_bytes()
}

/// Minimal class file assembler
pub struct ClassBuilder {
    pub constants: ConstantsPool,
    version: Version,
    this_class: ClassConstantIndex,
    super_class: ClassConstantIndex,
    methods: Vec<Method>,
    attributes: Vec<Attribute>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> ClassBuilder {
        let mut constants = ConstantsPool::new();
        let this_class = class_in(&mut constants, name);
        let super_class = class_in(&mut constants, "java/lang/Object");
        ClassBuilder {
            constants,
            version: Version::JAVA8,
            this_class,
            super_class,
            methods: vec![],
            attributes: vec![],
        }
    }

    pub fn version(mut self, version: Version) -> ClassBuilder {
        self.version = version;
        self
    }

    pub fn class(&mut self, name: &str) -> ClassConstantIndex {
        class_in(&mut self.constants, name)
    }

    pub fn field(&mut self, class: &str, name: &str, descriptor: &str) -> FieldRefConstantIndex {
        let class = self.class(class);
        let name = self.constants.get_utf8(name).unwrap();
        let descriptor = self.constants.get_utf8(descriptor).unwrap();
        let name_and_type = self.constants.get_name_and_type(name, descriptor).unwrap();
        self.constants.get_field_ref(class, name_and_type).unwrap()
    }

    pub fn method(&mut self, class: &str, name: &str, descriptor: &str) -> MethodRefConstantIndex {
        let class = self.class(class);
        let name = self.constants.get_utf8(name).unwrap();
        let descriptor = self.constants.get_utf8(descriptor).unwrap();
        let name_and_type = self.constants.get_name_and_type(name, descriptor).unwrap();
        self.constants
            .get_method_ref(class, name_and_type, false)
            .unwrap()
    }

    pub fn string(&mut self, value: &str) -> ConstantIndex {
        let utf8 = self.constants.get_utf8(value).unwrap();
        self.constants.get_string(utf8).unwrap().into()
    }

    pub fn attribute<A: AttributeLike>(&mut self, attribute: &A) -> Attribute {
        self.constants.get_attribute(attribute).unwrap()
    }

    /// Add a `public static` method
    pub fn add_method(&mut self, name: &str, descriptor: &str, code: Code) {
        let name_index = self.constants.get_utf8(name).unwrap();
        let descriptor_index = self.constants.get_utf8(descriptor).unwrap();
        let code = self.attribute(&code);
        self.methods.push(Method {
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            name_index,
            descriptor_index,
            attributes: vec![code],
        });
    }

    pub fn build(self) -> Vec<u8> {
        ClassFile {
            version: self.version,
            constants: self.constants,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: vec![],
            fields: vec![],
            methods: self.methods,
            attributes: self.attributes,
        }
        .to_bytes()
        .unwrap()
    }
}

fn class_in(constants: &mut ConstantsPool, name: &str) -> ClassConstantIndex {
    let name = constants.get_utf8(name).unwrap();
    constants.get_class(name).unwrap()
}

pub fn code(max_stack: u16, max_locals: u16, bytes: Vec<u8>) -> Code {
    Code {
        max_stack,
        max_locals,
        code_array: addon_patcher::jvm::class_file::BytecodeArray(bytes),
        exception_table: vec![],
        attributes: vec![],
    }
}

/// Decoded `Code` attribute of the named method
pub fn method_code(class: &ClassFile, name: &str) -> Code {
    class
        .methods
        .iter()
        .find(|method| class.constants.utf8(method.name_index).unwrap() == name)
        .unwrap_or_else(|| panic!("no method {}", name))
        .code(&class.constants)
        .unwrap()
        .unwrap()
}

/// Symbolic operand stack entry: a type descriptor, and an expression for where it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    pub typ: String,
    pub expr: String,
}

impl Value {
    fn new(typ: impl Into<String>, expr: impl Into<String>) -> Value {
        Value {
            typ: typ.into(),
            expr: expr.into(),
        }
    }

    fn is_reference(&self) -> bool {
        self.typ == "null" || self.typ.starts_with('L') || self.typ.starts_with('[')
    }
}

#[derive(Clone, Debug)]
pub struct Call {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub static_call: bool,

    /// Receiver first (unless static), then the arguments
    pub arguments: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct Trace {
    /// Operand stack right before the first return instruction
    pub stack: Vec<Value>,
    pub calls: Vec<Call>,
    pub field_accesses: Vec<String>,
    pub max_depth: usize,
}

impl Trace {
    pub fn calls_to(&self, owner: &str, name: &str) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| call.owner == owner && call.name == name)
            .collect()
    }
}

fn simple_name(binary_name: &str) -> &str {
    binary_name.rsplit('/').next().unwrap_or(binary_name)
}

fn assignable(value: &Value, expected: &str) -> bool {
    if value.typ == expected {
        return true;
    }
    let expected_reference = expected.starts_with('L') || expected.starts_with('[');
    if value.typ == "null" {
        return expected_reference;
    }
    expected == "Ljava/lang/Object;" && value.is_reference()
}

/// Method bound by an `invokedynamic` function reference
#[derive(Clone, Debug)]
struct FunctionTarget {
    owner: String,
    name: String,
    descriptor: String,
    static_call: bool,
}

impl FunctionTarget {
    /// Call the target on the function's single argument
    fn apply(&self, argument: Value, trace: &mut Trace) -> Value {
        let descriptor = parse_method_descriptor(&self.descriptor).unwrap();
        let expected = if self.static_call {
            assert_eq!(descriptor.parameters.len(), 1, "{} isn't unary", self.name);
            descriptor.parameters[0].render()
        } else {
            assert!(descriptor.parameters.is_empty(), "{} isn't unary", self.name);
            format!("L{};", self.owner)
        };
        assert!(assignable(&argument, &expected), "{:?} passed for {}", argument, expected);

        let expr = if self.static_call {
            format!("{}.{}({})", simple_name(&self.owner), self.name, argument.expr)
        } else {
            format!("{}.{}()", argument.expr, self.name)
        };
        trace.calls.push(Call {
            owner: self.owner.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
            static_call: self.static_call,
            arguments: vec![argument],
        });
        Value::new(descriptor.return_type.unwrap().render(), expr)
    }
}

/// Execute a straight-line method body symbolically
///
/// Every value on the stack is tracked by type and by the expression that produced it, and every
/// call checks that its arguments have the declared parameter types. `locals` gives the types of
/// the local variables.
pub fn run_method(class: &ClassFile, name: &str, locals: &[&str]) -> Trace {
    simulate(class, name, locals, None)
}

/// Like [`run_method`], but `java.util.Optional` pipelines are actually evaluated
///
/// `ofNullable` of a `null` is empty, function references call their target method on the
/// contents, and every predicate method named in `predicates` answers with the given value.
pub fn run_method_where(
    class: &ClassFile,
    name: &str,
    locals: &[&str],
    predicates: &[(&str, bool)],
) -> Trace {
    simulate(class, name, locals, Some(predicates))
}

fn simulate(
    class: &ClassFile,
    name: &str,
    locals: &[&str],
    predicates: Option<&[(&str, bool)]>,
) -> Trace {
    let constants = &class.constants;
    let code = method_code(class, name);
    let items = decode_code(&code.code_array.0).unwrap();

    let mut bootstrap_methods = BootstrapMethods::default();
    for attribute in &class.attributes {
        if attribute.is::<BootstrapMethods>(constants).unwrap() {
            bootstrap_methods = attribute.decode().unwrap();
        }
    }

    let mut trace = Trace::default();
    let mut stack: Vec<Value> = vec![];
    let mut arrays: HashMap<String, Vec<Option<Value>>> = HashMap::new();
    let mut optionals: HashMap<String, Option<Value>> = HashMap::new();
    let mut functions: HashMap<String, FunctionTarget> = HashMap::new();

    for item in &items {
        let instruction = match &item.op {
            Op::Plain(instruction) => instruction,
            Op::Branch(
                BranchInstruction::Return
                | BranchInstruction::AReturn
                | BranchInstruction::IReturn,
            ) => {
                trace.stack = stack;
                return trace;
            }
            Op::Branch(other) => panic!("not straight-line code: {:?}", other),
        };

        match instruction {
            Instruction::Nop => (),
            Instruction::AConstNull => stack.push(Value::new("null", "null")),
            Instruction::IConst0 => stack.push(Value::new("I", "0")),
            Instruction::IConst1 => stack.push(Value::new("I", "1")),
            Instruction::IConst2 => stack.push(Value::new("I", "2")),
            Instruction::IConst3 => stack.push(Value::new("I", "3")),
            Instruction::IConst4 => stack.push(Value::new("I", "4")),
            Instruction::IConst5 => stack.push(Value::new("I", "5")),
            Instruction::BiPush(value) => stack.push(Value::new("I", value.to_string())),
            Instruction::SiPush(value) => stack.push(Value::new("I", value.to_string())),
            Instruction::Ldc(index) => match constants.get(*index).unwrap() {
                Constant::String(utf8) => stack.push(Value::new(
                    "Ljava/lang/String;",
                    format!("{:?}", constants.utf8(*utf8).unwrap()),
                )),
                Constant::Integer(value) => stack.push(Value::new("I", value.to_string())),
                other => panic!("unexpected ldc of {:?}", other),
            },
            Instruction::ALoad(local) => stack.push(Value::new(
                locals[*local as usize],
                format!("local{}", local),
            )),
            Instruction::New(class) => {
                let class = constants.class_name(*class).unwrap();
                stack.push(Value::new(
                    format!("uninitialized L{};", class),
                    format!("new {}", simple_name(&class)),
                ));
            }
            Instruction::Dup => {
                let top = stack.last().unwrap().clone();
                stack.push(top);
            }
            Instruction::DupX1 => {
                let top = stack.pop().unwrap();
                let below = stack.pop().unwrap();
                stack.push(top.clone());
                stack.push(below);
                stack.push(top);
            }
            Instruction::Swap => {
                let top = stack.pop().unwrap();
                let below = stack.pop().unwrap();
                stack.push(top);
                stack.push(below);
            }
            Instruction::Pop => {
                stack.pop().unwrap();
            }
            Instruction::ANewArray(class) => {
                let count = stack.pop().unwrap();
                assert_eq!(count.typ, "I");
                let class = constants.class_name(*class).unwrap();
                let expr = format!("array{}", arrays.len());
                arrays.insert(expr.clone(), vec![None; count.expr.parse().unwrap()]);
                stack.push(Value::new(format!("[L{};", class), expr));
            }
            Instruction::AAStore => {
                let value = stack.pop().unwrap();
                let index = stack.pop().unwrap();
                let array = stack.pop().unwrap();
                assert!(value.is_reference(), "storing {:?}", value);
                let slots = arrays.get_mut(&array.expr).unwrap();
                slots[index.expr.parse::<usize>().unwrap()] = Some(value);
            }
            Instruction::AALoad => {
                let index = stack.pop().unwrap();
                let array = stack.pop().unwrap();
                let slot = arrays[&array.expr][index.expr.parse::<usize>().unwrap()].clone();
                let value = slot.expect("array slot read before it was written");
                let element = array.typ.strip_prefix('[').unwrap().to_owned();
                stack.push(Value::new(element, value.expr));
            }
            Instruction::CheckCast(class) => {
                let value = stack.pop().unwrap();
                assert!(value.is_reference(), "casting {:?}", value);
                let class = constants.class_name(*class).unwrap();
                let typ = if class.starts_with('[') {
                    class.to_string()
                } else {
                    format!("L{};", class)
                };
                stack.push(Value::new(typ, value.expr));
            }
            Instruction::GetStatic(field) | Instruction::PutStatic(field) => {
                let field = constants.field_ref(*field).unwrap();
                let name = format!("{}.{}", simple_name(&field.class), field.name);
                if let Instruction::GetStatic(_) = instruction {
                    trace.field_accesses.push(format!("get {}", name));
                    stack.push(Value::new(field.descriptor.to_string(), name));
                } else {
                    trace.field_accesses.push(format!("put {}", name));
                    let value = stack.pop().unwrap();
                    assert!(assignable(&value, &field.descriptor), "storing {:?}", value);
                }
            }
            Instruction::Invoke(_, method)
                if predicates.is_some()
                    && constants.method_ref(*method).unwrap().class == "java/util/Optional" =>
            {
                let method = constants.method_ref(*method).unwrap();
                let answers = predicates.unwrap();
                let result = match &*method.name {
                    "ofNullable" => {
                        let value = stack.pop().unwrap();
                        let contents = Some(value).filter(|value| value.typ != "null");
                        let expr = format!("optional{}", optionals.len());
                        optionals.insert(expr.clone(), contents);
                        Value::new("Ljava/util/Optional;", expr)
                    }
                    "filter" | "map" => {
                        let function = stack.pop().unwrap();
                        let optional = stack.pop().unwrap();
                        let target = functions[&function.expr].clone();
                        let contents = optionals[&optional.expr].clone().and_then(|value| {
                            let result = target.apply(value.clone(), &mut trace);
                            if method.name == "map" {
                                Some(result)
                            } else {
                                let (_, answer) = answers
                                    .iter()
                                    .find(|(predicate, _)| *predicate == target.name)
                                    .unwrap_or_else(|| panic!("no answer for {}", target.name));
                                Some(value).filter(|_| *answer)
                            }
                        });
                        let expr = format!("optional{}", optionals.len());
                        optionals.insert(expr.clone(), contents);
                        Value::new("Ljava/util/Optional;", expr)
                    }
                    "orElse" => {
                        let fallback = stack.pop().unwrap();
                        let optional = stack.pop().unwrap();
                        optionals[&optional.expr].clone().unwrap_or(fallback)
                    }
                    other => panic!("Optional.{} not simulated", other),
                };
                stack.push(result);
            }
            Instruction::Invoke(invoke_type, method) => {
                let method = constants.method_ref(*method).unwrap();
                let descriptor = parse_method_descriptor(&method.descriptor).unwrap();
                let static_call = matches!(invoke_type, InvokeType::Static);

                let mut arguments = vec![];
                for parameter in descriptor.parameters.iter().rev() {
                    let argument = stack.pop().unwrap();
                    let expected = parameter.render();
                    assert!(
                        assignable(&argument, &expected),
                        "{}.{}: {:?} passed for {}",
                        method.class,
                        method.name,
                        argument,
                        expected
                    );
                    arguments.push(argument);
                }
                if !static_call {
                    let receiver = stack.pop().unwrap();
                    let expected = format!("L{};", method.class);
                    if method.name == "<init>" {
                        assert_eq!(receiver.typ, format!("uninitialized {}", expected));
                        for value in stack.iter_mut() {
                            if value.typ == receiver.typ && value.expr == receiver.expr {
                                value.typ = expected.clone();
                            }
                        }
                    } else {
                        assert!(assignable(&receiver, &expected), "receiver {:?}", receiver);
                    }
                    arguments.push(receiver);
                }
                arguments.reverse();

                let shown: Vec<&str> = arguments
                    .iter()
                    .skip(if static_call { 0 } else { 1 })
                    .map(|argument| argument.expr.as_str())
                    .collect();
                let expr = if static_call {
                    format!(
                        "{}.{}({})",
                        simple_name(&method.class),
                        method.name,
                        shown.join(", ")
                    )
                } else {
                    format!("{}.{}({})", arguments[0].expr, method.name, shown.join(", "))
                };
                if let Some(return_type) = &descriptor.return_type {
                    stack.push(Value::new(return_type.render(), expr));
                }
                trace.calls.push(Call {
                    owner: method.class.to_string(),
                    name: method.name.to_string(),
                    descriptor: method.descriptor.to_string(),
                    static_call,
                    arguments,
                });
            }
            Instruction::InvokeDynamic(call_site) => {
                let (bootstrap_idx, _, descriptor) = constants.invoke_dynamic(*call_site).unwrap();
                let descriptor = parse_method_descriptor(&descriptor).unwrap();
                assert!(descriptor.parameters.is_empty(), "captures aren't simulated");

                let bootstrap = &bootstrap_methods.0[bootstrap_idx as usize];
                let (target, handle_kind) =
                    match constants.get(bootstrap.bootstrap_arguments[1]).unwrap() {
                        Constant::MethodHandle {
                            member,
                            handle_kind,
                        } => (
                            constants.method_ref(MethodRefConstantIndex(*member)).unwrap(),
                            *handle_kind,
                        ),
                        other => panic!("unexpected bootstrap argument {:?}", other),
                    };
                let return_type = descriptor.return_type.unwrap().render();
                let expr = format!("{}::{}", simple_name(&target.class), target.name);
                functions.insert(
                    expr.clone(),
                    FunctionTarget {
                        owner: target.class.to_string(),
                        name: target.name.to_string(),
                        descriptor: target.descriptor.to_string(),
                        static_call: handle_kind == HandleKind::InvokeStatic,
                    },
                );
                stack.push(Value::new(return_type, expr));
            }
            other => panic!("instruction not simulated: {:?}", other),
        }
        trace.max_depth = trace.max_depth.max(stack.len());
    }

    panic!("method {} fell off the end", name)
}
