//! Linter for composite GitHub Actions metadata files
//!
//! Parses `action.yml` into a position-tracked AST with error recovery,
//! then drives lint rules over it in a single traversal. The main rule
//! type-checks every `${{ }}` expression the metadata embeds, with context
//! types that evolve as steps are visited.

pub mod ast;
pub mod diagnostic;
pub mod document;
pub mod expr;
pub mod linter;
pub mod parse;
pub mod pass;
pub mod rule;
pub mod rule_expression;

pub use diagnostic::Diagnostic;
pub use linter::Linter;
pub use parse::parse_action;
