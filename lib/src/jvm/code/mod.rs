//! Method bodies as instruction streams
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is arguably the most important part of the class file - it contains the actual
//! executable instructions. We split up the [list of bytecode instructions][0] into two groups:
//!
//!   - [`Instruction`] for straight-line instructions
//!   - [`BranchInstruction`] for instructions that may branch
//!
//! A method body is then a flat list of [`CodeItem`]s, each remembering where it was in the
//! original code array. Rewriting a body means splicing instructions in and out of that list.
//!
//! ### Writing bodies back out
//!
//! [`rewrite_code`] lays the instructions out again, re-targets branches, and moves everything
//! in the `Code` attribute that refers to code offsets (exception handlers, debug tables, stack
//! map frames). [`max_stack`] recomputes the operand stack size for bodies that grew.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod decode;
mod instruction;
mod layout;
mod stack;

pub use decode::*;
pub use instruction::*;
pub use layout::*;
pub use stack::*;
