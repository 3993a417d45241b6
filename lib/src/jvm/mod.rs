//! Read, inspect and write JVM classes
//!
//! The representation here is deliberately shallow: a [`ClassFile`](class_file::ClassFile) keeps
//! fields, methods and attributes as raw byte blobs, and only the parts that get rewritten are
//! decoded further (the [`Code`](class_file::Code) attribute of a method, its instructions, and
//! the class' `BootstrapMethods`). Anything left untouched round-trips byte-for-byte.
//!
//! ### Example
//!
//! ```
//! use addon_patcher::jvm::class_file::ClassFile;
//! use addon_patcher::jvm::code::decode_code;
//! use addon_patcher::jvm::Error;
//!
//! fn count_instructions(class_bytes: &[u8]) -> Result<usize, Error> {
//!     let class = ClassFile::parse(class_bytes)?;
//!     let mut count = 0;
//!     for method in &class.methods {
//!         if let Some(code) = method.code(&class.constants)? {
//!             count += decode_code(&code.code_array.0)?.len();
//!         }
//!     }
//!     Ok(count)
//! }
//! ```

mod access_flags;
mod binary_format;
pub mod class_file;
pub mod code;
mod descriptors;
mod errors;
mod names;

pub use access_flags::*;
pub use binary_format::*;
pub use class_file::{
    ClassConstantIndex, Constant, ConstantIndex, ConstantPoolOverflow, ConstantsPool,
    ConstantsWriter, FieldRefConstantIndex, HandleKind, InvokeDynamicConstantIndex,
    MethodRefConstantIndex, NameAndTypeConstantIndex, Utf8ConstantIndex,
};
pub use descriptors::*;
pub use errors::*;
pub use names::*;

pub use crate::util::Offset;
