//! Rewriting legacy Skript API usages in compiled add-on classes
//!
//! A [`Profile`] picks a fixed set of rules, which get interpreted by a [`RewriterChain`] of
//! stages. Each stage looks for one kind of legacy reference:
//!
//!   - [`FieldAccessRedirector`] for fields that now sit behind accessors
//!   - [`CallSiteAdapter`] for getters whose return type changed
//!   - [`ConstructorReorderer`] for constructors whose leading parameter changed
//!
//! Every replacement is straight-line code that leaves the operand stack exactly as the
//! instruction it replaces would have.

mod call_site;
mod constructor;
mod emit;
mod errors;
mod field_access;
mod members;
mod registry;
mod stage;

pub use call_site::*;
pub use constructor::*;
pub use emit::*;
pub use errors::*;
pub use field_access::*;
pub use members::*;
pub use registry::*;
pub use stage::*;

/// Patch a single class file
///
/// When `changed` is false in the output, the original bytes can be kept as they are.
pub fn patch_class(bytes: &[u8], profile: Profile) -> Result<PatchedClass, Error> {
    let patched = profile.chain().patch_class(bytes)?;
    if patched.changed {
        for (stage, count) in patched.substitutions.iter() {
            log::debug!("{} stage made {} substitutions", stage, count);
        }
    }
    Ok(patched)
}
