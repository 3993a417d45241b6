use super::{ConstantIndex, ConstantPoolOverflow, Offset};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Input ended in the middle of a structure
    Truncated,
    IoError(std::io::Error),

    /// Class file doesn't start with `0xCAFEBABE`
    BadMagic([u8; 4]),

    /// Bytes left over after the end of a class file or attribute body
    TrailingBytes(usize),

    BadConstantTag(u8),
    BadHandleKind(u8),

    /// Index is out of range, or points at the unusable second half of a `long`/`double`
    BadConstantIndex(ConstantIndex),

    /// Constant exists, but is not of the kind expected where it is used
    UnexpectedConstant {
        index: ConstantIndex,
        expected: &'static str,
    },

    BadDescriptor(String),
    BadOpcode {
        opcode: u8,
        offset: Offset,
    },

    /// Branch (or code offset in an attribute) doesn't land on an instruction boundary
    BadBranchTarget {
        offset: Offset,
        target: isize,
    },

    BadStackMapFrame(u8),
    BadVerificationType(u8),

    ConstantPoolOverflow(ConstantPoolOverflow),
    BootstrapMethodsOverflow,
    MethodCodeOverflow(Offset),

    /// A 16-bit branch can no longer reach its target after re-layout
    BranchOffsetOverflow {
        offset: Offset,
        delta: isize,
    },

    /// Stack depth analysis popped from an empty stack
    StackUnderflow(Offset),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::IoError(err)
        }
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(err: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated => f.write_str("unexpected end of input"),
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::BadMagic(magic) => write!(f, "bad class file magic {:02X?}", magic),
            Error::TrailingBytes(n) => write!(f, "{} unexpected trailing bytes", n),
            Error::BadConstantTag(tag) => write!(f, "unknown constant pool tag {}", tag),
            Error::BadHandleKind(kind) => write!(f, "unknown method handle kind {}", kind),
            Error::BadConstantIndex(idx) => write!(f, "invalid constant pool index {}", idx.0),
            Error::UnexpectedConstant { index, expected } => {
                write!(f, "constant #{} is not a {}", index.0, expected)
            }
            Error::BadDescriptor(msg) => write!(f, "bad descriptor: {}", msg),
            Error::BadOpcode { opcode, offset } => {
                write!(f, "unknown opcode 0x{:02x} at offset {}", opcode, offset.0)
            }
            Error::BadBranchTarget { offset, target } => {
                write!(f, "invalid code offset {} (from offset {})", target, offset.0)
            }
            Error::BadStackMapFrame(tag) => write!(f, "unknown stack map frame type {}", tag),
            Error::BadVerificationType(tag) => write!(f, "unknown verification type {}", tag),
            Error::ConstantPoolOverflow(overflow) => {
                write!(f, "constant pool is full at index {}", overflow.offset)
            }
            Error::BootstrapMethodsOverflow => f.write_str("too many bootstrap methods"),
            Error::MethodCodeOverflow(len) => {
                write!(f, "method code is {} bytes long (max 65535)", len.0)
            }
            Error::BranchOffsetOverflow { offset, delta } => write!(
                f,
                "branch at offset {} can't reach a target {} bytes away",
                offset.0, delta
            ),
            Error::StackUnderflow(offset) => write!(f, "operand stack underflow at {}", offset.0),
        }
    }
}

impl std::error::Error for Error {}
