use super::{returned_reference, Error, InstructionTransform, MethodRef, RewriteContext};
use crate::jvm::code::Instruction;

/// How a legacy call gets replaced
#[derive(Clone, Debug)]
pub enum CallSiteRecipe {
    /// Call each method on the result of the previous one (the first is called on the original
    /// receiver)
    Chain(Vec<MethodRef>),

    /// Like `Chain`, but stops at the first `null` (and returns `null`)
    ///
    /// If there is a guard, receivers for which it returns `false` are treated as `null` too.
    NullSafe {
        guard: Option<MethodRef>,
        hops: Vec<MethodRef>,
    },
}

#[derive(Clone, Debug)]
pub struct CallSiteRule {
    pub legacy: MethodRef,
    pub recipe: CallSiteRecipe,
}

/// Replaces calls to methods that changed their return type
///
/// The replacement always leaves a value of the legacy return type on the stack, so code after
/// the call is none the wiser.
pub struct CallSiteAdapter {
    rules: Vec<CallSiteRule>,
}

impl CallSiteAdapter {
    pub fn new(rules: Vec<CallSiteRule>) -> Self {
        CallSiteAdapter { rules }
    }
}

impl InstructionTransform for CallSiteAdapter {
    fn name(&self) -> &'static str {
        "call site"
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

        let code = match &rule.recipe {
            CallSiteRecipe::Chain(hops) => hops
                .iter()
                .map(|hop| ctx.invoke(hop))
                .collect::<Result<Vec<_>, _>>()?,
            CallSiteRecipe::NullSafe { guard, hops } => {
                let result = match returned_reference(&rule.legacy.descriptor) {
                    Some(result) => result,
                    None => return Ok(None),
                };
                ctx.null_safe_chain(guard.as_ref(), hops, result)?
            }
        };
        Ok(Some(code))
    }
}
