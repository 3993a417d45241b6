use super::{BranchInstruction, CodeItem, Instruction, InvokeType, Op};
use crate::jvm::class_file::ConstantsPool;
use crate::jvm::{parse_field_type, parse_method_descriptor, Error, FieldRefConstantIndex};
use crate::util::{Offset, Width};
use std::collections::HashMap;

/// Number of operand stack slots an instruction pops, then pushes
///
/// Slots are counted the way `max_stack` counts them: `long` and `double` take two.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackEffect {
    pub pops: usize,
    pub pushes: usize,
}

const fn effect(pops: usize, pushes: usize) -> StackEffect {
    StackEffect { pops, pushes }
}

fn field_width(constants: &ConstantsPool, field: FieldRefConstantIndex) -> Result<usize, Error> {
    let field = constants.field_ref(field)?;
    Ok(parse_field_type(&field.descriptor)?.width())
}

impl Instruction {
    /// Stack effect (constant pool lookups are needed for fields and methods)
    pub fn stack_effect(&self, constants: &ConstantsPool) -> Result<StackEffect, Error> {
        use Instruction::*;

        Ok(match self {
            Nop | IInc(_, _) | Ret(_) => effect(0, 0),

            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) | Ldc(_) | ILoad(_)
            | FLoad(_) | ALoad(_) | New(_) => effect(0, 1),

            LConst0 | LConst1 | DConst0 | DConst1 | Ldc2(_) | LLoad(_) | DLoad(_) => effect(0, 2),

            IALoad | FALoad | AALoad | BALoad | CALoad | SALoad => effect(2, 1),
            LALoad | DALoad => effect(2, 2),

            IStore(_) | FStore(_) | AStore(_) | Pop | MonitorEnter | MonitorExit => effect(1, 0),
            LStore(_) | DStore(_) | Pop2 => effect(2, 0),

            IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => effect(3, 0),
            LAStore | DAStore => effect(4, 0),

            Dup => effect(1, 2),
            DupX1 => effect(2, 3),
            DupX2 => effect(3, 4),
            Dup2 => effect(2, 4),
            Dup2X1 => effect(3, 5),
            Dup2X2 => effect(4, 6),
            Swap => effect(2, 2),

            IAdd | FAdd | ISub | FSub | IMul | FMul | IDiv | FDiv | IRem | FRem | ISh(_)
            | IAnd | IOr | IXor | FCmp(_) => effect(2, 1),
            LAdd | DAdd | LSub | DSub | LMul | DMul | LDiv | DDiv | LRem | DRem | LAnd | LOr
            | LXor => effect(4, 2),
            LSh(_) => effect(3, 2),
            LCmp | DCmp(_) => effect(4, 1),

            INeg | FNeg | I2F | F2I | I2B | I2C | I2S => effect(1, 1),
            LNeg | DNeg | L2D | D2L => effect(2, 2),
            I2L | I2D | F2L | F2D => effect(1, 2),
            L2I | L2F | D2I | D2F => effect(2, 1),

            NewArray(_) | ANewArray(_) | ArrayLength | CheckCast(_) | InstanceOf(_) => {
                effect(1, 1)
            }
            MultiANewArray(_, dimensions) => effect(*dimensions as usize, 1),

            GetStatic(field) => effect(0, field_width(constants, *field)?),
            PutStatic(field) => effect(field_width(constants, *field)?, 0),
            GetField(field) => effect(1, field_width(constants, *field)?),
            PutField(field) => effect(1 + field_width(constants, *field)?, 0),

            Invoke(invoke_type, method) => {
                let method = constants.method_ref(*method)?;
                let descriptor = parse_method_descriptor(&method.descriptor)?;
                let has_this = !matches!(invoke_type, InvokeType::Static);
                effect(
                    descriptor.parameter_length(has_this),
                    descriptor.return_length(),
                )
            }
            InvokeDynamic(indy) => {
                let (_, _, descriptor) = constants.invoke_dynamic(*indy)?;
                let descriptor = parse_method_descriptor(&descriptor)?;
                effect(
                    descriptor.parameter_length(false),
                    descriptor.return_length(),
                )
            }
        })
    }
}

impl<Lbl> BranchInstruction<Lbl> {
    /// Stack effect along every outgoing edge (except that `jsr` pushes a return address for its
    /// target)
    pub fn stack_effect(&self) -> StackEffect {
        use BranchInstruction::*;

        match self {
            Goto(_) | GotoW(_) | Jsr(_) | JsrW(_) | Return => effect(0, 0),
            If(_, _) | IfNull(_, _) | TableSwitch { .. } | LookupSwitch { .. } | IReturn
            | FReturn | AReturn | AThrow => effect(1, 0),
            IfICmp(_, _) | IfACmp(_, _) | LReturn | DReturn => effect(2, 0),
        }
    }
}

/// Compute the maximum operand stack depth of a method body
///
/// This is a plain data-flow pass: every reachable instruction is visited once with the depth at
/// which it is first reached. Exception handlers start with just the exception on the stack.
pub fn max_stack(
    items: &[CodeItem],
    handlers: &[Offset],
    constants: &ConstantsPool,
) -> Result<u16, Error> {
    let index_of: HashMap<Offset, usize> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| item.origin.map(|origin| (origin, idx)))
        .collect();
    let lookup = |offset: &Offset| {
        index_of
            .get(offset)
            .copied()
            .ok_or(Error::BadBranchTarget {
                offset: *offset,
                target: offset.0 as isize,
            })
    };

    let mut depths: Vec<Option<usize>> = vec![None; items.len()];
    let mut worklist: Vec<(usize, usize)> = vec![];
    if !items.is_empty() {
        worklist.push((0, 0));
    }
    for handler in handlers {
        worklist.push((lookup(handler)?, 1));
    }

    let mut max: usize = 0;
    while let Some((idx, depth)) = worklist.pop() {
        if idx >= items.len() || depths[idx].is_some() {
            continue;
        }
        depths[idx] = Some(depth);
        max = max.max(depth);

        let item = &items[idx];
        let change = match &item.op {
            Op::Plain(instruction) => instruction.stack_effect(constants)?,
            Op::Branch(branch) => branch.stack_effect(),
        };
        if depth < change.pops {
            let offset = items[..=idx]
                .iter()
                .rev()
                .find_map(|item| item.origin)
                .unwrap_or(Offset(0));
            return Err(Error::StackUnderflow(offset));
        }
        let after = depth - change.pops + change.pushes;
        max = max.max(after);

        match &item.op {
            Op::Plain(Instruction::Ret(_)) => (),
            Op::Plain(_) => worklist.push((idx + 1, after)),
            Op::Branch(branch) => {
                let into_subroutine = matches!(
                    branch,
                    BranchInstruction::Jsr(_) | BranchInstruction::JsrW(_)
                );
                for target in branch.jump_targets() {
                    let target_depth = if into_subroutine { after + 1 } else { after };
                    max = max.max(target_depth);
                    worklist.push((lookup(target)?, target_depth));
                }
                if branch.falls_through() {
                    worklist.push((idx + 1, after));
                }
            }
        }
    }

    Ok(max.min(u16::MAX as usize) as u16)
}
