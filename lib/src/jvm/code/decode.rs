use super::{
    BranchInstruction, CodeItem, CompareMode, EqComparison, Instruction, InvokeType, Op,
    OrdComparison, ShiftType,
};
use crate::jvm::{
    BaseType, ClassConstantIndex, ConstantIndex, Deserialize, Error, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex,
};
use crate::util::Offset;
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashSet;
use std::io::Cursor;

/// Decode a code array into a stream of instructions
///
/// Every item has its original offset as `origin`, and branch targets are absolute offsets into
/// `code`. All branch targets are checked to land on the start of an instruction.
pub fn decode_code(code: &[u8]) -> Result<Vec<CodeItem>, Error> {
    let mut reader = Cursor::new(code);
    let mut items = vec![];

    while (reader.position() as usize) < code.len() {
        let offset = Offset(reader.position() as usize);
        let op = decode_op(&mut reader, offset)?;
        items.push(CodeItem {
            origin: Some(offset),
            op,
        });
    }

    let starts: HashSet<Offset> = items.iter().filter_map(|item| item.origin).collect();
    for item in &items {
        if let (Some(offset), Op::Branch(branch)) = (item.origin, &item.op) {
            for target in branch.jump_targets() {
                if !starts.contains(target) {
                    return Err(Error::BadBranchTarget {
                        offset,
                        target: target.0 as isize,
                    });
                }
            }
        }
    }

    Ok(items)
}

/// Resolve a relative jump into an absolute offset
fn jump_target(offset: Offset, delta: i32) -> Result<Offset, Error> {
    let target = offset.0 as isize + delta as isize;
    if target < 0 {
        Err(Error::BadBranchTarget { offset, target })
    } else {
        Ok(Offset(target as usize))
    }
}

fn read_u8_index(reader: &mut Cursor<&[u8]>) -> Result<u16, Error> {
    Ok(reader.read_u8()? as u16)
}

fn read_constant(reader: &mut Cursor<&[u8]>) -> Result<ConstantIndex, Error> {
    ConstantIndex::deserialize(reader)
}

fn skip_switch_padding(reader: &mut Cursor<&[u8]>) -> Result<(), Error> {
    while reader.position() % 4 != 0 {
        reader.read_u8()?;
    }
    Ok(())
}

fn decode_op(reader: &mut Cursor<&[u8]>, offset: Offset) -> Result<Op, Error> {
    use Instruction::*;

    let opcode = reader.read_u8()?;
    let plain = match opcode {
        0x00 => Nop,
        0x01 => AConstNull,
        0x02 => IConstM1,
        0x03 => IConst0,
        0x04 => IConst1,
        0x05 => IConst2,
        0x06 => IConst3,
        0x07 => IConst4,
        0x08 => IConst5,
        0x09 => LConst0,
        0x0a => LConst1,
        0x0b => FConst0,
        0x0c => FConst1,
        0x0d => FConst2,
        0x0e => DConst0,
        0x0f => DConst1,
        0x10 => BiPush(reader.read_i8()?),
        0x11 => SiPush(reader.read_i16::<BigEndian>()?),
        0x12 => Ldc(ConstantIndex(read_u8_index(reader)?)),
        0x13 => Ldc(read_constant(reader)?),
        0x14 => Ldc2(read_constant(reader)?),
        0x15 => ILoad(read_u8_index(reader)?),
        0x16 => LLoad(read_u8_index(reader)?),
        0x17 => FLoad(read_u8_index(reader)?),
        0x18 => DLoad(read_u8_index(reader)?),
        0x19 => ALoad(read_u8_index(reader)?),
        0x1a..=0x1d => ILoad((opcode - 0x1a) as u16),
        0x1e..=0x21 => LLoad((opcode - 0x1e) as u16),
        0x22..=0x25 => FLoad((opcode - 0x22) as u16),
        0x26..=0x29 => DLoad((opcode - 0x26) as u16),
        0x2a..=0x2d => ALoad((opcode - 0x2a) as u16),
        0x2e => IALoad,
        0x2f => LALoad,
        0x30 => FALoad,
        0x31 => DALoad,
        0x32 => AALoad,
        0x33 => BALoad,
        0x34 => CALoad,
        0x35 => SALoad,
        0x36 => IStore(read_u8_index(reader)?),
        0x37 => LStore(read_u8_index(reader)?),
        0x38 => FStore(read_u8_index(reader)?),
        0x39 => DStore(read_u8_index(reader)?),
        0x3a => AStore(read_u8_index(reader)?),
        0x3b..=0x3e => IStore((opcode - 0x3b) as u16),
        0x3f..=0x42 => LStore((opcode - 0x3f) as u16),
        0x43..=0x46 => FStore((opcode - 0x43) as u16),
        0x47..=0x4a => DStore((opcode - 0x47) as u16),
        0x4b..=0x4e => AStore((opcode - 0x4b) as u16),
        0x4f => IAStore,
        0x50 => LAStore,
        0x51 => FAStore,
        0x52 => DAStore,
        0x53 => AAStore,
        0x54 => BAStore,
        0x55 => CAStore,
        0x56 => SAStore,
        0x57 => Pop,
        0x58 => Pop2,
        0x59 => Dup,
        0x5a => DupX1,
        0x5b => DupX2,
        0x5c => Dup2,
        0x5d => Dup2X1,
        0x5e => Dup2X2,
        0x5f => Swap,
        0x60 => IAdd,
        0x61 => LAdd,
        0x62 => FAdd,
        0x63 => DAdd,
        0x64 => ISub,
        0x65 => LSub,
        0x66 => FSub,
        0x67 => DSub,
        0x68 => IMul,
        0x69 => LMul,
        0x6a => FMul,
        0x6b => DMul,
        0x6c => IDiv,
        0x6d => LDiv,
        0x6e => FDiv,
        0x6f => DDiv,
        0x70 => IRem,
        0x71 => LRem,
        0x72 => FRem,
        0x73 => DRem,
        0x74 => INeg,
        0x75 => LNeg,
        0x76 => FNeg,
        0x77 => DNeg,
        0x78 => ISh(ShiftType::Left),
        0x79 => LSh(ShiftType::Left),
        0x7a => ISh(ShiftType::ArithmeticRight),
        0x7b => LSh(ShiftType::ArithmeticRight),
        0x7c => ISh(ShiftType::LogicalRight),
        0x7d => LSh(ShiftType::LogicalRight),
        0x7e => IAnd,
        0x7f => LAnd,
        0x80 => IOr,
        0x81 => LOr,
        0x82 => IXor,
        0x83 => LXor,
        0x84 => IInc(read_u8_index(reader)?, reader.read_i8()? as i16),
        0x85 => I2L,
        0x86 => I2F,
        0x87 => I2D,
        0x88 => L2I,
        0x89 => L2F,
        0x8a => L2D,
        0x8b => F2I,
        0x8c => F2L,
        0x8d => F2D,
        0x8e => D2I,
        0x8f => D2L,
        0x90 => D2F,
        0x91 => I2B,
        0x92 => I2C,
        0x93 => I2S,
        0x94 => LCmp,
        0x95 => FCmp(CompareMode::L),
        0x96 => FCmp(CompareMode::G),
        0x97 => DCmp(CompareMode::L),
        0x98 => DCmp(CompareMode::G),
        0x99..=0xa8 | 0xaa..=0xb1 | 0xbf | 0xc6..=0xc9 => {
            return decode_branch(reader, opcode, offset).map(Op::Branch)
        }
        0xa9 => Ret(read_u8_index(reader)?),
        0xb2 => GetStatic(FieldRefConstantIndex::deserialize(reader)?),
        0xb3 => PutStatic(FieldRefConstantIndex::deserialize(reader)?),
        0xb4 => GetField(FieldRefConstantIndex::deserialize(reader)?),
        0xb5 => PutField(FieldRefConstantIndex::deserialize(reader)?),
        0xb6 => Invoke(
            InvokeType::Virtual,
            MethodRefConstantIndex::deserialize(reader)?,
        ),
        0xb7 => Invoke(
            InvokeType::Special,
            MethodRefConstantIndex::deserialize(reader)?,
        ),
        0xb8 => Invoke(
            InvokeType::Static,
            MethodRefConstantIndex::deserialize(reader)?,
        ),
        0xb9 => {
            let method = MethodRefConstantIndex::deserialize(reader)?;
            let count = reader.read_u8()?;
            let _zero = reader.read_u8()?;
            Invoke(InvokeType::Interface(count), method)
        }
        0xba => {
            let method = InvokeDynamicConstantIndex::deserialize(reader)?;
            let _zeros = reader.read_u16::<BigEndian>()?;
            InvokeDynamic(method)
        }
        0xbb => New(ClassConstantIndex::deserialize(reader)?),
        0xbc => {
            let base_type = match reader.read_u8()? {
                4 => BaseType::Boolean,
                5 => BaseType::Char,
                6 => BaseType::Float,
                7 => BaseType::Double,
                8 => BaseType::Byte,
                9 => BaseType::Short,
                10 => BaseType::Int,
                11 => BaseType::Long,
                _ => return Err(Error::BadOpcode { opcode, offset }),
            };
            NewArray(base_type)
        }
        0xbd => ANewArray(ClassConstantIndex::deserialize(reader)?),
        0xbe => ArrayLength,
        0xc0 => CheckCast(ClassConstantIndex::deserialize(reader)?),
        0xc1 => InstanceOf(ClassConstantIndex::deserialize(reader)?),
        0xc2 => MonitorEnter,
        0xc3 => MonitorExit,
        0xc4 => decode_wide(reader, offset)?,
        0xc5 => {
            let class = ClassConstantIndex::deserialize(reader)?;
            MultiANewArray(class, reader.read_u8()?)
        }
        _ => return Err(Error::BadOpcode { opcode, offset }),
    };
    Ok(Op::Plain(plain))
}

/// Instruction following a `wide` prefix
fn decode_wide(reader: &mut Cursor<&[u8]>, offset: Offset) -> Result<Instruction, Error> {
    use Instruction::*;

    let opcode = reader.read_u8()?;
    let index = reader.read_u16::<BigEndian>()?;
    Ok(match opcode {
        0x15 => ILoad(index),
        0x16 => LLoad(index),
        0x17 => FLoad(index),
        0x18 => DLoad(index),
        0x19 => ALoad(index),
        0x36 => IStore(index),
        0x37 => LStore(index),
        0x38 => FStore(index),
        0x39 => DStore(index),
        0x3a => AStore(index),
        0x84 => IInc(index, reader.read_i16::<BigEndian>()?),
        0xa9 => Ret(index),
        _ => return Err(Error::BadOpcode { opcode, offset }),
    })
}

fn decode_branch(
    reader: &mut Cursor<&[u8]>,
    opcode: u8,
    offset: Offset,
) -> Result<BranchInstruction<Offset>, Error> {
    use BranchInstruction::*;

    let narrow = |reader: &mut Cursor<&[u8]>| -> Result<Offset, Error> {
        jump_target(offset, reader.read_i16::<BigEndian>()? as i32)
    };

    let ord = |opcode: u8| match opcode {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    };

    Ok(match opcode {
        0x99..=0x9e => If(ord(opcode - 0x99), narrow(reader)?),
        0x9f..=0xa4 => IfICmp(ord(opcode - 0x9f), narrow(reader)?),
        0xa5 => IfACmp(EqComparison::EQ, narrow(reader)?),
        0xa6 => IfACmp(EqComparison::NE, narrow(reader)?),
        0xa7 => Goto(narrow(reader)?),
        0xa8 => Jsr(narrow(reader)?),
        0xaa => {
            skip_switch_padding(reader)?;
            let default = jump_target(offset, reader.read_i32::<BigEndian>()?)?;
            let low = reader.read_i32::<BigEndian>()?;
            let high = reader.read_i32::<BigEndian>()?;
            if high < low {
                return Err(Error::BadOpcode { opcode, offset });
            }
            let mut targets = vec![];
            for _ in low..=high {
                targets.push(jump_target(offset, reader.read_i32::<BigEndian>()?)?);
            }
            TableSwitch {
                default,
                low,
                targets,
            }
        }
        0xab => {
            skip_switch_padding(reader)?;
            let default = jump_target(offset, reader.read_i32::<BigEndian>()?)?;
            let npairs = reader.read_i32::<BigEndian>()?;
            if npairs < 0 {
                return Err(Error::BadOpcode { opcode, offset });
            }
            let mut targets = vec![];
            for _ in 0..npairs {
                let key = reader.read_i32::<BigEndian>()?;
                targets.push((key, jump_target(offset, reader.read_i32::<BigEndian>()?)?));
            }
            LookupSwitch { default, targets }
        }
        0xac => IReturn,
        0xad => LReturn,
        0xae => FReturn,
        0xaf => DReturn,
        0xb0 => AReturn,
        0xb1 => Return,
        0xbf => AThrow,
        0xc6 => IfNull(EqComparison::EQ, narrow(reader)?),
        0xc7 => IfNull(EqComparison::NE, narrow(reader)?),
        0xc8 => GotoW(jump_target(offset, reader.read_i32::<BigEndian>()?)?),
        0xc9 => JsrW(jump_target(offset, reader.read_i32::<BigEndian>()?)?),
        _ => return Err(Error::BadOpcode { opcode, offset }),
    })
}
