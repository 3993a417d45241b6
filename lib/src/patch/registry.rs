//! Rule tables for the supported Skript API migrations

use super::{
    CallSiteAdapter, CallSiteRecipe, CallSiteRule, ConstructorReorderer, ConstructorRule,
    Dispatch, FieldAccessRedirector, FieldRef, FieldRule, InstructionTransform, MethodRef,
    RewriterChain,
};
use crate::jvm::{BaseType, BinaryName, FieldType, UnqualifiedName};
use std::fmt;
use std::str::FromStr;

/// Which Skript API the add-ons get patched against
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Profile {
    /// Parallel script loading: `ScriptLoader` state moved behind accessors and `ParserInstance`
    /// now hands out scripts
    Parallel,

    /// Structure API: on top of the above, triggers belong to `Script`s instead of files
    Structure,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Parallel, Profile::Structure];

    pub fn name(self) -> &'static str {
        match self {
            Profile::Parallel => "parallel",
            Profile::Structure => "structure",
        }
    }

    /// Whether rewritten methods need their `max_stack` recomputed
    pub fn recompute_max_stack(self) -> bool {
        matches!(self, Profile::Structure)
    }

    /// Stages for this profile, in the order they run
    pub fn stages(self) -> Vec<Box<dyn InstructionTransform>> {
        match self {
            Profile::Parallel => vec![
                Box::new(FieldAccessRedirector::new(script_loader_fields())),
                Box::new(CallSiteAdapter::new(vec![CallSiteRule {
                    legacy: legacy_current_script(),
                    recipe: CallSiteRecipe::Chain(vec![current_script(), script_config()]),
                }])),
            ],
            Profile::Structure => vec![
                Box::new(FieldAccessRedirector::new(script_loader_fields())),
                Box::new(CallSiteAdapter::new(vec![
                    CallSiteRule {
                        legacy: legacy_current_script(),
                        recipe: CallSiteRecipe::NullSafe {
                            guard: Some(parser_is_active()),
                            hops: vec![current_script(), script_config()],
                        },
                    },
                    CallSiteRule {
                        legacy: legacy_trigger_script(),
                        recipe: CallSiteRecipe::Chain(vec![
                            trigger_script(),
                            script_config(),
                            config_file(),
                        ]),
                    },
                ])),
                Box::new(ConstructorReorderer::new(vec![trigger_constructor()])),
            ],
        }
    }

    pub fn chain(self) -> RewriterChain {
        RewriterChain::new(self.stages(), self.recompute_max_stack())
    }
}

#[cfg(feature = "structure-api")]
impl Default for Profile {
    fn default() -> Profile {
        Profile::Structure
    }
}

#[cfg(not(feature = "structure-api"))]
impl Default for Profile {
    fn default() -> Profile {
        Profile::Parallel
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Profile, String> {
        Profile::ALL
            .into_iter()
            .find(|profile| profile.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown profile '{}' (expected parallel or structure)", s))
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn object(class: BinaryName) -> FieldType<BinaryName> {
    FieldType::object(class)
}

/// `ScriptLoader` fields that became private
fn script_loader_fields() -> Vec<FieldRule> {
    let field = |name, field_type, accessor, mutator| FieldRule {
        field: FieldRef {
            class: BinaryName::SCRIPTLOADER,
            name,
            field_type,
        },
        accessor,
        mutator,
    };

    vec![
        field(
            UnqualifiedName::CURRENTSCRIPT,
            object(BinaryName::CONFIG),
            UnqualifiedName::GETCURRENTSCRIPT,
            UnqualifiedName::SETCURRENTSCRIPT,
        ),
        field(
            UnqualifiedName::CURRENTSECTIONS,
            object(BinaryName::LIST),
            UnqualifiedName::GETCURRENTSECTIONS,
            UnqualifiedName::SETCURRENTSECTIONS,
        ),
        field(
            UnqualifiedName::CURRENTLOOPS,
            object(BinaryName::LIST),
            UnqualifiedName::GETCURRENTLOOPS,
            UnqualifiedName::SETCURRENTLOOPS,
        ),
        field(
            UnqualifiedName::HASDELAYBEFORE,
            object(BinaryName::KLEENEAN),
            UnqualifiedName::GETHASDELAYBEFORE,
            UnqualifiedName::SETHASDELAYBEFORE,
        ),
    ]
}

/// `ParserInstance#getCurrentScript()Config`
fn legacy_current_script() -> MethodRef {
    MethodRef::new(
        BinaryName::PARSERINSTANCE,
        UnqualifiedName::GETCURRENTSCRIPT,
        vec![],
        Some(object(BinaryName::CONFIG)),
        Dispatch::Virtual,
    )
}

/// `ParserInstance#getCurrentScript()Script`
fn current_script() -> MethodRef {
    MethodRef::new(
        BinaryName::PARSERINSTANCE,
        UnqualifiedName::GETCURRENTSCRIPT,
        vec![],
        Some(object(BinaryName::SCRIPT)),
        Dispatch::Virtual,
    )
}

/// `ParserInstance#isActive()Z`
fn parser_is_active() -> MethodRef {
    MethodRef::new(
        BinaryName::PARSERINSTANCE,
        UnqualifiedName::ISACTIVE,
        vec![],
        Some(FieldType::Base(BaseType::Boolean)),
        Dispatch::Virtual,
    )
}

/// `Script#getConfig()Config`
fn script_config() -> MethodRef {
    MethodRef::new(
        BinaryName::SCRIPT,
        UnqualifiedName::GETCONFIG,
        vec![],
        Some(object(BinaryName::CONFIG)),
        Dispatch::Virtual,
    )
}

/// `Config#getFile()File`
fn config_file() -> MethodRef {
    MethodRef::new(
        BinaryName::CONFIG,
        UnqualifiedName::GETFILE,
        vec![],
        Some(object(BinaryName::FILE)),
        Dispatch::Virtual,
    )
}

/// `Trigger#getScript()File`
fn legacy_trigger_script() -> MethodRef {
    MethodRef::new(
        BinaryName::TRIGGER,
        UnqualifiedName::GETSCRIPT,
        vec![],
        Some(object(BinaryName::FILE)),
        Dispatch::Virtual,
    )
}

/// `Trigger#getScript()Script`
fn trigger_script() -> MethodRef {
    MethodRef::new(
        BinaryName::TRIGGER,
        UnqualifiedName::GETSCRIPT,
        vec![],
        Some(object(BinaryName::SCRIPT)),
        Dispatch::Virtual,
    )
}

/// `Trigger(File, String, SkriptEvent, List)` becomes `Trigger(Script, String, SkriptEvent, List)`
fn trigger_constructor() -> ConstructorRule {
    let constructor = |leading| {
        MethodRef::new(
            BinaryName::TRIGGER,
            UnqualifiedName::INIT,
            vec![
                object(leading),
                object(BinaryName::STRING),
                object(BinaryName::SKRIPTEVENT),
                object(BinaryName::LIST),
            ],
            None,
            Dispatch::Special,
        )
    };

    ConstructorRule {
        legacy: constructor(BinaryName::FILE),
        replacement: constructor(BinaryName::SCRIPT),
        convert_leading: MethodRef::new(
            BinaryName::SCRIPTLOADER,
            UnqualifiedName::GETSCRIPT,
            vec![object(BinaryName::FILE)],
            Some(object(BinaryName::SCRIPT)),
            Dispatch::Static,
        ),
    }
}
