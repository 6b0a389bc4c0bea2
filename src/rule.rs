//! Rule abstraction on top of the pass engine

use crate::ast::Pos;
use crate::diagnostic::Diagnostic;
use crate::pass::Pass;

/// A lint rule: a traversal pass that accumulates diagnostics tagged with
/// its own name as their kind.
pub trait Rule: Pass {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Drains the diagnostics found so far.
    fn take_diagnostics(&mut self) -> Vec<Diagnostic>;
}

/// Common state shared by rule implementations.
pub struct RuleBase {
    name: &'static str,
    description: &'static str,
    diags: Vec<Diagnostic>,
}

impl RuleBase {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            diags: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.diags.push(Diagnostic::new(message, pos, self.name));
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_rule_name_as_kind() {
        let mut base = RuleBase::new("expression", "checks expressions");
        base.error(Pos::new(2, 4), "something is off");
        let diags = base.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, "expression");
        assert_eq!(diags[0].line, 2);
        assert_eq!(diags[0].col, 4);
        // draining empties the buffer
        assert!(base.take_diagnostics().is_empty());
    }
}
