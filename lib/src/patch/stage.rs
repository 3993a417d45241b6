use super::Error;
use crate::jvm;
use crate::jvm::class_file::{
    AttributeLike, BootstrapMethods, ClassFile, Code, ConstantsPool, Version,
};
use crate::jvm::code::{decode_code, max_stack, rewrite_code, CodeItem, Instruction, Op};
use crate::jvm::{Offset, Serialize};
use std::collections::BTreeMap;

/// Class-wide tables that replacement sequences may need to add entries to
pub struct RewriteContext<'a> {
    pub constants: &'a mut ConstantsPool,
    pub bootstrap_methods: &'a mut BootstrapMethods,
    pub version: Version,
}

/// One stage of the rewriter chain
///
/// A stage looks at the instructions of a method body one at a time and either keeps an
/// instruction or replaces it with a straight-line sequence. Stages don't keep state from one
/// method body to the next.
pub trait InstructionTransform {
    /// Short name, used in logs and substitution counts
    fn name(&self) -> &'static str;

    /// Replacement sequence for an instruction, or `None` to leave it alone
    fn rewrite(
        &self,
        instruction: &Instruction,
        ctx: &mut RewriteContext,
    ) -> Result<Option<Vec<Instruction>>, Error>;

    /// Run the stage over a whole method body, returning the new body and how many instructions
    /// got replaced
    ///
    /// The first instruction of a replacement inherits the original offset of the instruction it
    /// replaces, so anything that pointed at the old instruction now points at the start of its
    /// replacement.
    fn apply(
        &self,
        items: Vec<CodeItem>,
        ctx: &mut RewriteContext,
    ) -> Result<(Vec<CodeItem>, usize), Error> {
        let mut output = Vec::with_capacity(items.len());
        let mut substitutions = 0;

        for item in items {
            let replacement = match &item.op {
                Op::Plain(instruction) => self.rewrite(instruction, ctx)?,
                Op::Branch(_) => None,
            };
            let replacement = match replacement {
                None => {
                    output.push(item);
                    continue;
                }
                Some(replacement) => replacement,
            };

            log::debug!(
                "{}: replacing {:?} with {} instructions",
                self.name(),
                item.op,
                replacement.len()
            );
            substitutions += 1;
            let mut replacement = replacement.into_iter();
            output.push(CodeItem {
                origin: item.origin,
                op: Op::Plain(replacement.next().unwrap_or(Instruction::Nop)),
            });
            output.extend(replacement.map(CodeItem::inserted));
        }

        Ok((output, substitutions))
    }
}

/// Substitution counts, per stage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Substitutions {
    counts: BTreeMap<&'static str, usize>,
}

impl Substitutions {
    pub fn record(&mut self, stage: &'static str, count: usize) {
        if count > 0 {
            *self.counts.entry(stage).or_insert(0) += count;
        }
    }

    pub fn merge(&mut self, other: &Substitutions) {
        for (stage, count) in &other.counts {
            self.record(*stage, *count);
        }
    }

    /// Number of substitutions made by one stage
    pub fn count(&self, stage: &str) -> usize {
        self.counts.get(stage).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn changed(&self) -> bool {
        self.total() > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counts.iter().map(|(stage, count)| (*stage, *count))
    }
}

/// Result of running the rewriter chain over a class
#[derive(Debug)]
pub struct PatchedClass {
    /// Class file to use from now on (a copy of the input if nothing changed)
    pub bytes: Vec<u8>,
    pub changed: bool,
    pub substitutions: Substitutions,
}

/// Ordered list of stages, applied to every method body of a class
pub struct RewriterChain {
    stages: Vec<Box<dyn InstructionTransform>>,

    /// Recompute `max_stack` of rewritten methods (needed when replacements use extra stack)
    recompute_max_stack: bool,
}

impl RewriterChain {
    pub fn new(stages: Vec<Box<dyn InstructionTransform>>, recompute_max_stack: bool) -> Self {
        RewriterChain {
            stages,
            recompute_max_stack,
        }
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|stage| stage.name())
    }

    /// Feed a method body through every stage in order
    pub fn rewrite_body(
        &self,
        mut items: Vec<CodeItem>,
        ctx: &mut RewriteContext,
    ) -> Result<(Vec<CodeItem>, Substitutions), Error> {
        let mut substitutions = Substitutions::default();
        for stage in &self.stages {
            let (rewritten, count) = stage.apply(items, ctx)?;
            substitutions.record(stage.name(), count);
            items = rewritten;
        }
        Ok((items, substitutions))
    }

    /// Rewrite every method of a class
    ///
    /// The class is either patched as a whole or not at all: any error leaves the caller with
    /// nothing but the error.
    pub fn patch_class(&self, bytes: &[u8]) -> Result<PatchedClass, Error> {
        let mut class = ClassFile::parse(bytes)?;

        let mut bootstrap_attribute = None;
        for (idx, attribute) in class.attributes.iter().enumerate() {
            if attribute.is::<BootstrapMethods>(&class.constants)? {
                bootstrap_attribute = Some(idx);
                break;
            }
        }
        let mut bootstrap_methods: BootstrapMethods = match bootstrap_attribute {
            Some(idx) => class.attributes[idx].decode()?,
            None => BootstrapMethods::default(),
        };
        let original_bootstrap_count = bootstrap_methods.0.len();

        let mut substitutions = Substitutions::default();
        let ClassFile {
            constants,
            methods,
            version,
            ..
        } = &mut class;
        let mut ctx = RewriteContext {
            constants,
            bootstrap_methods: &mut bootstrap_methods,
            version: *version,
        };

        for method in methods.iter_mut() {
            let code_idx = match method.code_attribute_index(ctx.constants)? {
                Some(idx) => idx,
                None => continue,
            };
            let code: Code = method.attributes[code_idx].decode()?;
            let items = decode_code(&code.code_array.0)?;

            let (items, method_substitutions) = self.rewrite_body(items, &mut ctx)?;
            if !method_substitutions.changed() {
                continue;
            }

            let mut new_code = rewrite_code(&code, &items, ctx.constants)?;
            if self.recompute_max_stack {
                let handlers: Vec<Offset> = code
                    .exception_table
                    .iter()
                    .map(|handler| Offset(handler.handler_pc.0 as usize))
                    .collect();
                let computed = max_stack(&items, &handlers, ctx.constants)?;
                new_code.max_stack = new_code.max_stack.max(computed);
            }
            log::debug!(
                "Rewrote {} ({} substitutions, max stack {} -> {})",
                ctx.constants.utf8(method.name_index)?,
                method_substitutions.total(),
                code.max_stack,
                new_code.max_stack
            );

            let mut info = vec![];
            new_code.serialize(&mut info).map_err(jvm::Error::IoError)?;
            method.attributes[code_idx].info = info;
            substitutions.merge(&method_substitutions);
        }

        if !substitutions.changed() {
            return Ok(PatchedClass {
                bytes: bytes.to_vec(),
                changed: false,
                substitutions,
            });
        }

        if bootstrap_methods.0.len() != original_bootstrap_count {
            match bootstrap_attribute {
                Some(idx) => {
                    let mut info = vec![];
                    bootstrap_methods
                        .serialize(&mut info)
                        .map_err(jvm::Error::IoError)?;
                    class.attributes[idx].info = info;
                }
                None => {
                    let attribute = class.constants.get_attribute(&bootstrap_methods)?;
                    class.attributes.push(attribute);
                }
            }
            log::debug!(
                "{} now has {} {} entries",
                class.name()?,
                bootstrap_methods.0.len(),
                BootstrapMethods::NAME
            );
        }

        Ok(PatchedClass {
            bytes: class.to_bytes()?,
            changed: true,
            substitutions,
        })
    }
}
