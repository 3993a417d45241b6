use super::{Dispatch, Error, FieldRef, InstructionTransform, MethodRef, RewriteContext};
use crate::jvm::code::Instruction;
use crate::jvm::UnqualifiedName;

/// Field that is no longer accessible, along with the methods that replace reading and writing it
#[derive(Clone, Debug)]
pub struct FieldRule {
    pub field: FieldRef,

    /// No-argument method returning the field's value
    pub accessor: UnqualifiedName,

    /// Single-argument method setting the field's value
    pub mutator: UnqualifiedName,
}

impl FieldRule {
    fn accessor(&self, dispatch: Dispatch) -> MethodRef {
        MethodRef::new(
            self.field.class.clone(),
            self.accessor.clone(),
            vec![],
            Some(self.field.field_type.clone()),
            dispatch,
        )
    }

    fn mutator(&self, dispatch: Dispatch) -> MethodRef {
        MethodRef::new(
            self.field.class.clone(),
            self.mutator.clone(),
            vec![self.field.field_type.clone()],
            None,
            dispatch,
        )
    }
}

/// Turns raw field reads and writes into calls to the accessor and mutator
///
/// `getstatic`/`putstatic` become `invokestatic`, `getfield`/`putfield` become `invokevirtual`.
/// In all cases the operand stack before and after is the same.
pub struct FieldAccessRedirector {
    rules: Vec<FieldRule>,
}

impl FieldAccessRedirector {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        FieldAccessRedirector { rules }
    }
}

impl InstructionTransform for FieldAccessRedirector {
    fn name(&self) -> &'static str {
        "field access"
    }

    fn rewrite(
        &self,
        instruction: &Instruction,
        ctx: &mut RewriteContext,
    ) -> Result<Option<Vec<Instruction>>, Error> {
        let (field, dispatch, is_write) = match instruction {
            Instruction::GetStatic(field) => (field, Dispatch::Static, false),
            Instruction::PutStatic(field) => (field, Dispatch::Static, true),
            Instruction::GetField(field) => (field, Dispatch::Virtual, false),
            Instruction::PutField(field) => (field, Dispatch::Virtual, true),
            _ => return Ok(None),
        };

        let member = ctx.constants.field_ref(*field)?;
        let rule = match self.rules.iter().find(|rule| rule.field.matches(&member)) {
            Some(rule) => rule,
            None => return Ok(None),
        };

        let method = if is_write {
            rule.mutator(dispatch)
        } else {
            rule.accessor(dispatch)
        };
        Ok(Some(vec![ctx.invoke(&method)?]))
    }
}
