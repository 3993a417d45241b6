use super::{CodeItem, Op};
use crate::jvm::class_file::{
    Attribute, AttributeLike, BytecodeArray, BytecodeIndex, Code, ConstantsPool,
    ExceptionHandler, LineNumberTable, LocalVariable, LocalVariableTable,
    LocalVariableTypeTable, StackMapTable, VerificationType,
};
use crate::jvm::{Error, Serialize};
use crate::util::{Offset, Width};
use std::collections::HashMap;

/// Largest possible code array
const MAX_CODE_LENGTH: usize = 65535;

/// Mapping from offsets in the original code array to offsets in the re-encoded one
///
/// Only offsets at which an instruction started (plus the offset one past the end of the code)
/// have an image. Instructions inserted during rewriting have no preimage.
#[derive(Debug)]
pub struct OffsetMap {
    offsets: HashMap<Offset, Offset>,
}

impl OffsetMap {
    pub fn get(&self, old: Offset) -> Result<Offset, Error> {
        self.offsets
            .get(&old)
            .copied()
            .ok_or(Error::BadBranchTarget {
                offset: old,
                target: old.0 as isize,
            })
    }

    fn get_index(&self, old: BytecodeIndex) -> Result<BytecodeIndex, Error> {
        let new = self.get(Offset(old.0 as usize))?;
        Ok(BytecodeIndex(new.0 as u16))
    }
}

/// Lay out and encode a method body
///
/// `old_len` is the length of the code array the items were decoded from, so that exclusive end
/// offsets can be mapped too. Branch targets are re-resolved against the new layout; a 16-bit
/// branch that can no longer reach its target is an error (we never widen branches).
pub fn encode_code(items: &[CodeItem], old_len: usize) -> Result<(Vec<u8>, OffsetMap), Error> {
    // First pass: pick offsets (only switch padding depends on position)
    let mut starts = Vec::with_capacity(items.len());
    let mut offsets = HashMap::new();
    let mut next = Offset(0);
    for item in items {
        starts.push(next);
        if let Some(origin) = item.origin {
            offsets.entry(origin).or_insert(next);
        }
        next.0 += match &item.op {
            Op::Plain(instruction) => instruction.width(),
            Op::Branch(branch) => branch.width_at(next),
        };
    }
    if next.0 > MAX_CODE_LENGTH {
        return Err(Error::MethodCodeOverflow(next));
    }
    offsets.insert(Offset(old_len), next);
    let offsets = OffsetMap { offsets };

    // Second pass: encode
    let mut bytes = Vec::with_capacity(next.0);
    for (item, start) in items.iter().zip(starts) {
        match &item.op {
            Op::Plain(instruction) => instruction.serialize(&mut bytes)?,
            Op::Branch(branch) => {
                let narrow = branch.has_narrow_targets();
                let relative = branch.map_labels(|target| {
                    let delta = offsets.get(*target)? - start;
                    if narrow && i16::try_from(delta).is_err() {
                        return Err(Error::BranchOffsetOverflow {
                            offset: start,
                            delta,
                        });
                    }
                    Ok(delta as i32)
                })?;
                relative.serialize_at(start, &mut bytes)?;
            }
        }
    }
    debug_assert_eq!(bytes.len(), next.0);

    Ok((bytes, offsets))
}

/// Build a new `Code` attribute around a rewritten method body
///
/// The exception table, line numbers, local variable ranges, and stack map frames are moved to
/// follow the instructions they were attached to. Type annotations can't be moved like this (we
/// don't decode them), so they are dropped.
pub fn rewrite_code(
    code: &Code,
    items: &[CodeItem],
    constants: &ConstantsPool,
) -> Result<Code, Error> {
    let (bytes, offsets) = encode_code(items, code.code_array.0.len())?;

    let exception_table = code
        .exception_table
        .iter()
        .map(|handler| {
            Ok(ExceptionHandler {
                start_pc: offsets.get_index(handler.start_pc)?,
                end_pc: offsets.get_index(handler.end_pc)?,
                handler_pc: offsets.get_index(handler.handler_pc)?,
                catch_type: handler.catch_type,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let mut attributes = vec![];
    for attribute in &code.attributes {
        let name = attribute.name(constants)?;
        match name.as_ref() {
            LineNumberTable::NAME => {
                let mut table: LineNumberTable = attribute.decode()?;
                for line in &mut table.0 {
                    line.start_pc = offsets.get_index(line.start_pc)?;
                }
                attributes.push(reencode(attribute, &table)?);
            }
            LocalVariableTable::NAME => {
                let mut table: LocalVariableTable = attribute.decode()?;
                remap_locals(&mut table.0, &offsets)?;
                attributes.push(reencode(attribute, &table)?);
            }
            LocalVariableTypeTable::NAME => {
                let mut table: LocalVariableTypeTable = attribute.decode()?;
                remap_locals(&mut table.0, &offsets)?;
                attributes.push(reencode(attribute, &table)?);
            }
            StackMapTable::NAME => {
                let mut table: StackMapTable = attribute.decode()?;
                remap_frames(&mut table, &offsets)?;
                attributes.push(reencode(attribute, &table)?);
            }
            "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
                log::debug!("Dropping {} from rewritten method body", name);
            }
            _ => attributes.push(attribute.clone()),
        }
    }

    Ok(Code {
        max_stack: code.max_stack,
        max_locals: code.max_locals,
        code_array: BytecodeArray(bytes),
        exception_table,
        attributes,
    })
}

fn reencode<A: AttributeLike>(original: &Attribute, attribute: &A) -> Result<Attribute, Error> {
    let mut info = vec![];
    attribute.serialize(&mut info)?;
    Ok(Attribute {
        name_index: original.name_index,
        info,
    })
}

/// Local variable ranges are `[start_pc, start_pc + length)`
fn remap_locals(locals: &mut [LocalVariable], offsets: &OffsetMap) -> Result<(), Error> {
    for local in locals {
        let end = Offset(local.start_pc.0 as usize + local.length as usize);
        let new_start = offsets.get_index(local.start_pc)?;
        let new_end = offsets.get(end)?;
        local.start_pc = new_start;
        local.length = (new_end.0 - new_start.0 as usize) as u16;
    }
    Ok(())
}

/// Frame offsets are deltas: the first frame is at `offset_delta`, every other frame is at
/// `previous + offset_delta + 1`
fn remap_frames(table: &mut StackMapTable, offsets: &OffsetMap) -> Result<(), Error> {
    let mut previous: Option<(usize, usize)> = None;
    for frame in &mut table.0 {
        let delta = frame.offset_delta() as usize;
        let old_offset = match previous {
            None => delta,
            Some((old_previous, _)) => old_previous + delta + 1,
        };
        let new_offset = offsets.get(Offset(old_offset))?.0;
        let new_delta = match previous {
            None => new_offset,
            Some((_, new_previous)) => new_offset - new_previous - 1,
        };
        frame.set_offset_delta(new_delta as u16);

        for typ in frame.verification_types_mut() {
            if let VerificationType::Uninitialized(created_at) = typ {
                *created_at = offsets.get_index(*created_at)?;
            }
        }
        previous = Some((old_offset, new_offset));
    }
    Ok(())
}
