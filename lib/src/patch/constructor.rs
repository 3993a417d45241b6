use super::{Error, InstructionTransform, MethodRef, RewriteContext};
use crate::jvm::code::Instruction;
use crate::jvm::{BinaryName, FieldType, RefType};
use std::slice;

/// Constructor whose leading parameter changed type
///
/// The remaining parameters are unchanged and must all be references (they get parked in an
/// `Object[]` while the leading argument is converted).
#[derive(Clone, Debug)]
pub struct ConstructorRule {
    pub legacy: MethodRef,
    pub replacement: MethodRef,

    /// Method converting the old leading argument into the new one (`null` stays `null`)
    pub convert_leading: MethodRef,
}

/// Rewrites calls to a legacy constructor into calls to its replacement
///
/// The arguments are all on the stack at the point of the `invokespecial`, with the leading one
/// buried under the others. The replacement sequence is:
///
///   1. park the trailing arguments in a fresh `Object[]`, last one first
///   2. swap the array under the leading argument and convert that argument
///   3. take the trailing arguments back out of the array, casting each to its type
///   4. drop the array and call the new constructor
pub struct ConstructorReorderer {
    rules: Vec<ConstructorRule>,
}

impl ConstructorReorderer {
    pub fn new(rules: Vec<ConstructorRule>) -> Self {
        ConstructorReorderer { rules }
    }
}

impl InstructionTransform for ConstructorReorderer {
    fn name(&self) -> &'static str {
        "constructor"
    }

    fn rewrite(
        &self,
        instruction: &Instruction,
        ctx: &mut RewriteContext,
    ) -> Result<Option<Vec<Instruction>>, Error> {
        let method = match instruction {
            Instruction::Invoke(_, method) => *method,
            _ => return Ok(None),
        };
        let member = ctx.constants.method_ref(method)?;
        let rule = match self.rules.iter().find(|rule| rule.legacy.matches(&member)) {
            Some(rule) => rule,
            None => return Ok(None),
        };

        let parameters = &rule.replacement.descriptor.parameters;
        let leading = match parameters.first() {
            Some(FieldType::Ref(leading)) => leading,
            _ => return Ok(None),
        };
        let trailing: Vec<&RefType<BinaryName>> = parameters[1..]
            .iter()
            .filter_map(|parameter| match parameter {
                FieldType::Ref(ref_type) => Some(ref_type),
                FieldType::Base(_) => None,
            })
            .collect();
        if trailing.len() + 1 != parameters.len() {
            log::warn!(
                "Skipping constructor rule for {}: primitive parameters can't be reordered",
                rule.legacy.class
            );
            return Ok(None);
        }

        // [.., leading, t_0, .., t_n-1] -> [.., leading, array]
        let mut code = vec![
            ctx.push_int(trailing.len() as i32)?,
            ctx.new_array(&BinaryName::OBJECT)?,
        ];
        for idx in (0..trailing.len()).rev() {
            code.push(Instruction::DupX1);
            code.push(Instruction::Swap);
            code.push(ctx.push_int(idx as i32)?);
            code.push(Instruction::Swap);
            code.push(Instruction::AAStore);
        }

        // [.., leading, array] -> [.., array, converted]
        code.push(Instruction::Swap);
        code.extend(ctx.null_safe_chain(None, slice::from_ref(&rule.convert_leading), leading)?);

        // [.., array, converted] -> [.., converted, t_0, .., t_n-1, array]
        code.push(Instruction::Swap);
        for (idx, typ) in trailing.iter().enumerate() {
            code.push(Instruction::Dup);
            code.push(ctx.push_int(idx as i32)?);
            code.push(Instruction::AALoad);
            code.push(ctx.check_cast(typ)?);
            code.push(Instruction::Swap);
        }

        code.push(Instruction::Pop);
        code.push(ctx.invoke(&rule.replacement)?);
        Ok(Some(code))
    }
}
