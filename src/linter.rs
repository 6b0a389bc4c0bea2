//! Linting entry points tying the parser and the pass engine together

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::diagnostic::Diagnostic;
use crate::parse::parse_action;
use crate::pass::Visitor;
use crate::rule_expression::ExprRule;

/// Lints composite action metadata files and prints annotated diagnostics
/// to the given writer.
pub struct Linter<W: Write> {
    out: W,
}

impl Linter<io::Stdout> {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for Linter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Linter<W> {
    pub fn with_output(out: W) -> Self {
        Self { out }
    }

    /// Lints the given files in order. An unreadable file aborts the whole
    /// invocation rather than producing a diagnostic.
    pub fn lint_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<Vec<Diagnostic>> {
        let mut all = Vec::new();
        for path in paths {
            all.extend(self.lint_file(path.as_ref())?);
        }
        debug!(files = paths.len(), diagnostics = all.len(), "linting done");
        Ok(all)
    }

    pub fn lint_file(&mut self, path: &Path) -> Result<Vec<Diagnostic>> {
        let src = fs::read_to_string(path)
            .with_context(|| format!("could not read action metadata file {:?}", path.display()))?;
        let diags = self.check(&path.to_string_lossy(), &src)?;
        for diag in &diags {
            diag.pretty_print(&mut self.out, &src)
                .context("could not write diagnostic")?;
        }
        Ok(diags)
    }

    /// Checks one document and returns its diagnostics, sorted by position.
    /// Does not print anything.
    pub fn check(&mut self, path: &str, src: &str) -> Result<Vec<Diagnostic>> {
        debug!(path, "checking action metadata");
        let (metadata, mut diags) = parse_action(src);
        if let Some(metadata) = metadata {
            let mut visitor = Visitor::new();
            visitor.add_rule(Box::new(ExprRule::new()));
            visitor
                .visit(&metadata)
                .with_context(|| format!("fatal error while checking {path}"))?;
            diags.extend(visitor.take_diagnostics());
        }
        for diag in &mut diags {
            diag.path = path.to_string();
        }
        diags.sort();
        Ok(diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(src: &str) -> Vec<Diagnostic> {
        let mut linter = Linter::with_output(Vec::new());
        linter.check("action.yml", src).unwrap()
    }

    #[test]
    fn test_clean_action_has_no_diagnostics() {
        let src = "name: Greet\ndescription: says hello\nruns:\n  using: composite\n  steps:\n    - run: echo hello\n      shell: bash\n";
        assert!(check(src).is_empty());
    }

    #[test]
    fn test_diagnostics_carry_file_path() {
        let diags = check("name: Broken\n");
        assert!(!diags.is_empty());
        assert!(diags.iter().all(|d| d.path == "action.yml"));
    }

    #[test]
    fn test_diagnostics_are_sorted_by_position() {
        let src = "name: Test\ndescription: test\nruns:\n  using: composite\n  steps:\n    - run: echo ${{ inputs.b }}\n      shell: bash\n      if: ${{ github.sha }}\n    - run: echo ${{ inputs.a }}\n      shell: bash\n";
        let diags = check(src);
        assert!(diags.len() >= 2);
        let positions: Vec<(usize, usize)> = diags.iter().map(|d| (d.line, d.col)).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_parse_and_rule_diagnostics_are_merged() {
        // missing shell (parse-time) plus a bad expression (rule-time)
        let src = "name: Test\ndescription: test\nruns:\n  using: composite\n  steps:\n    - run: echo ${{ unknown_ctx }}\n";
        let diags = check(src);
        assert!(diags.iter().any(|d| d.kind == "syntax-check"), "{diags:?}");
        assert!(diags.iter().any(|d| d.kind == "expression"), "{diags:?}");
    }

    #[test]
    fn test_pretty_output_is_written() {
        let mut linter = Linter::with_output(Vec::new());
        let src = "name: Test\n";
        let diags = linter.check("a.yml", src).unwrap();
        for d in &diags {
            d.pretty_print(&mut linter.out, src).unwrap();
        }
        assert!(!linter.out.is_empty());
    }
}
