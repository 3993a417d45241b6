//! Patch compiled Skript add-ons so they keep working against newer Skript versions
//!
//! Add-ons are distributed as jars full of JVM classes, some of which reach into Skript internals
//! that have since moved. Rather than waiting for every add-on to be recompiled, we rewrite the
//! offending instructions in place:
//!
//!   - [`jvm`] reads and writes class files and method bodies
//!   - [`patch`] knows which references are stale and what to replace them with
//!   - [`jar`] applies the patches to every class in a jar (or a directory of jars)

pub mod jar;
pub mod jvm;
pub mod patch;
mod util;

pub use patch::{patch_class, PatchedClass, Profile};
