//! Building blocks for replacement sequences

use super::{Dispatch, Error, FunctionRef, MethodRef, RewriteContext};
use crate::jvm::class_file::BootstrapMethod;
use crate::jvm::code::Instruction;
use crate::jvm::{
    BinaryName, ConstantsWriter, FieldType, MethodDescriptor, Name, RefType, RenderDescriptor,
    UnqualifiedName,
};

fn object(class: BinaryName) -> FieldType<BinaryName> {
    FieldType::object(class)
}

/// `LambdaMetafactory.metafactory`, the bootstrap method behind Java lambdas and method references
pub fn metafactory() -> MethodRef {
    MethodRef::new(
        BinaryName::LAMBDAMETAFACTORY,
        UnqualifiedName::METAFACTORY,
        vec![
            object(BinaryName::METHODHANDLES_LOOKUP),
            object(BinaryName::STRING),
            object(BinaryName::METHODTYPE),
            object(BinaryName::METHODTYPE),
            object(BinaryName::METHODHANDLE),
            object(BinaryName::METHODTYPE),
        ],
        Some(object(BinaryName::CALLSITE)),
        Dispatch::Static,
    )
}

fn optional_of_nullable() -> MethodRef {
    MethodRef::new(
        BinaryName::OPTIONAL,
        UnqualifiedName::OFNULLABLE,
        vec![object(BinaryName::OBJECT)],
        Some(object(BinaryName::OPTIONAL)),
        Dispatch::Static,
    )
}

fn optional_filter() -> MethodRef {
    MethodRef::new(
        BinaryName::OPTIONAL,
        UnqualifiedName::FILTER,
        vec![object(BinaryName::PREDICATE)],
        Some(object(BinaryName::OPTIONAL)),
        Dispatch::Virtual,
    )
}

fn optional_map() -> MethodRef {
    MethodRef::new(
        BinaryName::OPTIONAL,
        UnqualifiedName::MAP,
        vec![object(BinaryName::FUNCTION)],
        Some(object(BinaryName::OPTIONAL)),
        Dispatch::Virtual,
    )
}

fn optional_or_else() -> MethodRef {
    MethodRef::new(
        BinaryName::OPTIONAL,
        UnqualifiedName::ORELSE,
        vec![object(BinaryName::OBJECT)],
        Some(object(BinaryName::OBJECT)),
        Dispatch::Virtual,
    )
}

impl RewriteContext<'_> {
    pub fn invoke(&mut self, method: &MethodRef) -> Result<Instruction, Error> {
        Ok(method.invoke(self.constants)?)
    }

    pub fn check_cast(&mut self, typ: &RefType<BinaryName>) -> Result<Instruction, Error> {
        Ok(Instruction::CheckCast(typ.constant_index(self.constants)?))
    }

    /// `anewarray` with the given element class
    pub fn new_array(&mut self, element: &BinaryName) -> Result<Instruction, Error> {
        Ok(Instruction::ANewArray(element.constant_index(self.constants)?))
    }

    /// Shortest instruction pushing an `int` constant
    pub fn push_int(&mut self, value: i32) -> Result<Instruction, Error> {
        Ok(match value {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            _ => {
                if let Ok(byte) = i8::try_from(value) {
                    Instruction::BiPush(byte)
                } else if let Ok(short) = i16::try_from(value) {
                    Instruction::SiPush(short)
                } else {
                    Instruction::Ldc(self.constants.get_integer(value)?)
                }
            }
        })
    }

    /// Push a function value bound to a method (like a Java method reference `Foo::bar`)
    ///
    /// This is an `invokedynamic` bootstrapped by `LambdaMetafactory.metafactory`, with the
    /// static arguments being the erased method type, a handle to the target, and the method type
    /// specialized to the target. Identical bootstrap methods are shared.
    pub fn function_reference(&mut self, function: &FunctionRef) -> Result<Instruction, Error> {
        if !self.version.supports_invoke_dynamic() {
            return Err(Error::InvokeDynamicUnsupported {
                version: self.version,
            });
        }

        let bootstrap_method = metafactory().method_handle(self.constants)?;
        let erased = function.erased.constant_index(self.constants)?;
        let target = function.target.method_handle(self.constants)?;
        let instantiated = function.instantiated().constant_index(self.constants)?;
        let bootstrap = BootstrapMethod {
            bootstrap_method,
            bootstrap_arguments: vec![erased.into(), target, instantiated.into()],
        };

        let bootstrap_methods = &mut self.bootstrap_methods.0;
        let bootstrap_idx = match bootstrap_methods.iter().position(|bm| *bm == bootstrap) {
            Some(idx) => idx,
            None => {
                bootstrap_methods.push(bootstrap);
                bootstrap_methods.len() - 1
            }
        };
        let bootstrap_idx = u16::try_from(bootstrap_idx)
            .map_err(|_| crate::jvm::Error::BootstrapMethodsOverflow)?;

        let name = self.constants.get_utf8(function.method.as_str())?;
        let descriptor = self
            .constants
            .get_utf8(function.call_site_descriptor().render())?;
        let name_and_type = self.constants.get_name_and_type(name, descriptor)?;
        let call_site = self
            .constants
            .get_invoke_dynamic(bootstrap_idx, name_and_type)?;
        Ok(Instruction::InvokeDynamic(call_site))
    }

    /// Null-safe call chain on the value at the top of the stack
    ///
    /// Equivalent to `Optional.ofNullable(value).filter(guard).map(hop1).map(hop2)...orElse(null)`
    /// followed by a cast to `result`. Each hop takes the result of the previous one.
    pub fn null_safe_chain(
        &mut self,
        guard: Option<&MethodRef>,
        hops: &[MethodRef],
        result: &RefType<BinaryName>,
    ) -> Result<Vec<Instruction>, Error> {
        let mut code = vec![self.invoke(&optional_of_nullable())?];
        if let Some(guard) = guard {
            code.push(self.function_reference(&FunctionRef::predicate(guard.clone()))?);
            code.push(self.invoke(&optional_filter())?);
        }
        for hop in hops {
            code.push(self.function_reference(&FunctionRef::function(hop.clone()))?);
            code.push(self.invoke(&optional_map())?);
        }
        code.push(Instruction::AConstNull);
        code.push(self.invoke(&optional_or_else())?);
        code.push(self.check_cast(result)?);
        Ok(code)
    }
}

/// Referenced type returned by a method, if it returns one
pub fn returned_reference(
    descriptor: &MethodDescriptor<BinaryName>,
) -> Option<&RefType<BinaryName>> {
    match &descriptor.return_type {
        Some(FieldType::Ref(ref_type)) => Some(ref_type),
        _ => None,
    }
}
