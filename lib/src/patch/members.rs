use crate::jvm::class_file::MemberRef;
use crate::jvm::code::{Instruction, InvokeType};
use crate::jvm::{
    BaseType, BinaryName, ConstantIndex, ConstantPoolOverflow, ConstantsPool, ConstantsWriter,
    FieldType, HandleKind, MethodDescriptor, MethodRefConstantIndex, Name, RenderDescriptor,
    UnqualifiedName,
};

/// How a method gets invoked
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dispatch {
    Static,
    Virtual,
    Special,
    Interface,
}

impl Dispatch {
    /// Method handle kind that invokes the method the same way
    pub fn handle_kind(self) -> HandleKind {
        match self {
            Dispatch::Static => HandleKind::InvokeStatic,
            Dispatch::Virtual => HandleKind::InvokeVirtual,
            Dispatch::Special => HandleKind::InvokeSpecial,
            Dispatch::Interface => HandleKind::InvokeInterface,
        }
    }
}

/// Fully spelled-out reference to a method
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub dispatch: Dispatch,
}

impl MethodRef {
    pub fn new(
        class: BinaryName,
        name: UnqualifiedName,
        parameters: Vec<FieldType<BinaryName>>,
        return_type: Option<FieldType<BinaryName>>,
        dispatch: Dispatch,
    ) -> MethodRef {
        MethodRef {
            class,
            name,
            descriptor: MethodDescriptor {
                parameters,
                return_type,
            },
            dispatch,
        }
    }

    /// Does a resolved constant pool reference point at this method?
    ///
    /// Dispatch isn't compared: the owner, name and descriptor already pin the method down.
    pub fn matches(&self, member: &MemberRef) -> bool {
        member.class == self.class.as_str()
            && member.name == self.name.as_str()
            && member.descriptor == self.descriptor.render()
    }

    /// Instruction calling this method
    pub fn invoke(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<Instruction, ConstantPoolOverflow> {
        let index: MethodRefConstantIndex = self.constant_index(constants)?;
        let invoke_type = match self.dispatch {
            Dispatch::Static => InvokeType::Static,
            Dispatch::Virtual => InvokeType::Virtual,
            Dispatch::Special => InvokeType::Special,
            Dispatch::Interface => {
                InvokeType::Interface(self.descriptor.parameter_length(true) as u8)
            }
        };
        Ok(Instruction::Invoke(invoke_type, index))
    }

    /// `CONSTANT_MethodHandle_info` that invokes this method
    pub fn method_handle(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let member: MethodRefConstantIndex = self.constant_index(constants)?;
        constants.get_method_handle(self.dispatch.handle_kind(), member.into())
    }
}

/// Write a `CONSTANT_Methodref_info` (or `CONSTANT_InterfaceMethodref_info`)
impl ConstantsWriter<MethodRefConstantIndex> for MethodRef {
    fn constant_index(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        let class = self.class.constant_index(constants)?;
        let name = constants.get_utf8(self.name.as_str())?;
        let descriptor = constants.get_utf8(self.descriptor.render())?;
        let name_and_type = constants.get_name_and_type(name, descriptor)?;
        constants.get_method_ref(
            class,
            name_and_type,
            self.dispatch == Dispatch::Interface,
        )
    }
}

/// Fully spelled-out reference to a field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub field_type: FieldType<BinaryName>,
}

impl FieldRef {
    pub fn matches(&self, member: &MemberRef) -> bool {
        member.class == self.class.as_str()
            && member.name == self.name.as_str()
            && member.descriptor == self.field_type.render()
    }
}

/// Unary function value to synthesize with `invokedynamic`
///
/// The value implements `interface`, whose single abstract method `method` has the erased
/// descriptor `erased`. Calls to it are forwarded to `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionRef {
    pub interface: BinaryName,
    pub method: UnqualifiedName,
    pub erased: MethodDescriptor<BinaryName>,
    pub target: MethodRef,
}

impl FunctionRef {
    /// `java.util.function.Function` forwarding to `target`
    pub fn function(target: MethodRef) -> FunctionRef {
        FunctionRef {
            interface: BinaryName::FUNCTION,
            method: UnqualifiedName::APPLY,
            erased: MethodDescriptor {
                parameters: vec![FieldType::object(BinaryName::OBJECT)],
                return_type: Some(FieldType::object(BinaryName::OBJECT)),
            },
            target,
        }
    }

    /// `java.util.function.Predicate` forwarding to `target`
    pub fn predicate(target: MethodRef) -> FunctionRef {
        FunctionRef {
            interface: BinaryName::PREDICATE,
            method: UnqualifiedName::TEST,
            erased: MethodDescriptor {
                parameters: vec![FieldType::object(BinaryName::OBJECT)],
                return_type: Some(FieldType::Base(BaseType::Boolean)),
            },
            target,
        }
    }

    /// Descriptor of `method` specialized to the target
    ///
    /// For an instance method the receiver becomes the first parameter.
    pub fn instantiated(&self) -> MethodDescriptor<BinaryName> {
        let target = &self.target;
        let mut parameters = vec![];
        if target.dispatch != Dispatch::Static {
            parameters.push(FieldType::object(target.class.clone()));
        }
        parameters.extend(target.descriptor.parameters.iter().cloned());
        MethodDescriptor {
            parameters,
            return_type: target.descriptor.return_type.clone(),
        }
    }

    /// Descriptor of the `invokedynamic` call site: no captures, returns the interface
    pub fn call_site_descriptor(&self) -> MethodDescriptor<BinaryName> {
        MethodDescriptor {
            parameters: vec![],
            return_type: Some(FieldType::object(self.interface.clone())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::borrow::Cow;

    fn get_current_script() -> MethodRef {
        MethodRef::new(
            BinaryName::PARSERINSTANCE,
            UnqualifiedName::GETCURRENTSCRIPT,
            vec![],
            Some(FieldType::object(BinaryName::SCRIPT)),
            Dispatch::Virtual,
        )
    }

    #[test]
    fn matching_compares_descriptors() {
        let method = get_current_script();
        let mut member = MemberRef {
            class: Cow::Borrowed("ch/njol/skript/lang/parser/ParserInstance"),
            name: Cow::Borrowed("getCurrentScript"),
            descriptor: Cow::Borrowed("()Lorg/skriptlang/skript/lang/script/Script;"),
            is_interface: false,
        };
        assert!(method.matches(&member));
        member.descriptor = Cow::Borrowed("()Lch/njol/skript/config/Config;");
        assert!(!method.matches(&member));
    }

    #[test]
    fn instantiated_descriptor_takes_receiver() {
        let function = FunctionRef::function(get_current_script());
        assert_eq!(
            function.instantiated().render(),
            "(Lch/njol/skript/lang/parser/ParserInstance;)Lorg/skriptlang/skript/lang/script/Script;"
        );
        assert_eq!(function.erased.render(), "(Ljava/lang/Object;)Ljava/lang/Object;");
        assert_eq!(
            function.call_site_descriptor().render(),
            "()Ljava/util/function/Function;"
        );
    }

    #[test]
    fn interface_invocations_count_arguments() {
        let mut pool = ConstantsPool::new();
        let method = MethodRef::new(
            BinaryName::LIST,
            UnqualifiedName::from_string(String::from("get")).unwrap(),
            vec![FieldType::Base(BaseType::Int)],
            Some(FieldType::object(BinaryName::OBJECT)),
            Dispatch::Interface,
        );
        let invoke = method.invoke(&mut pool).unwrap();
        assert!(matches!(
            invoke,
            Instruction::Invoke(InvokeType::Interface(2), _)
        ));
        let Instruction::Invoke(_, index) = invoke else { unreachable!() };
        assert!(pool.method_ref(index).unwrap().is_interface);
    }
}
