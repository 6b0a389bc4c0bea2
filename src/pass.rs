//! Two-phase traversal engine over the metadata AST
//!
//! A pass sees the metadata once before the steps, then every step in
//! document order, then the metadata once more after all steps. Rules plug in
//! as passes, which decouples them from the parser: a rule never walks the
//! tree itself.

use thiserror::Error;

use crate::ast::{ActionMetadata, Step};
use crate::diagnostic::Diagnostic;
use crate::rule::Rule;

/// An internal failure raised by a pass hook. This is a programmer-level
/// error (an impossible lookup, a broken invariant), not a lint finding: it
/// aborts the whole traversal and surfaces to the caller instead of being
/// folded into the diagnostics.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("rule {rule:?}: {message}")]
    Internal { rule: &'static str, message: String },
}

impl PassError {
    pub fn internal(rule: &'static str, message: impl Into<String>) -> Self {
        Self::Internal {
            rule,
            message: message.into(),
        }
    }
}

/// Hooks of one traversal pass.
pub trait Pass {
    /// Called once, before any step is visited.
    fn visit_metadata_pre(&mut self, metadata: &ActionMetadata) -> Result<(), PassError>;
    /// Called once per step, in document order.
    fn visit_step(&mut self, step: &Step) -> Result<(), PassError>;
    /// Called once, after all steps were visited.
    fn visit_metadata_post(&mut self, metadata: &ActionMetadata) -> Result<(), PassError>;
}

/// Drives an ordered list of rules through one AST: every rule's pre-hook,
/// then for each step every rule's step-hook, then every rule's post-hook.
#[derive(Default)]
pub struct Visitor {
    rules: Vec<Box<dyn Rule>>,
}

impl Visitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Runs the traversal. The first hard failure aborts immediately; lint
    /// diagnostics accumulate on the rules and are collected afterwards with
    /// [`Visitor::take_diagnostics`].
    pub fn visit(&mut self, metadata: &ActionMetadata) -> Result<(), PassError> {
        for rule in &mut self.rules {
            rule.visit_metadata_pre(metadata)?;
        }

        if let Some(runs) = &metadata.runs {
            for step in &runs.steps {
                for rule in &mut self.rules {
                    rule.visit_step(step)?;
                }
            }
        }

        for rule in &mut self.rules {
            rule.visit_metadata_post(metadata)?;
        }
        Ok(())
    }

    /// Drains the diagnostics accumulated by all rules, in rule order.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for rule in &mut self.rules {
            diags.append(&mut rule.take_diagnostics());
        }
        diags
    }
}
