//! Expression language engine for `${{ }}` templates
//!
//! This module is a self-contained collaborator: the linter core only uses
//! its public surface (parse an expression snippet, type-check the resulting
//! node against a context-availability set and evolving inputs/steps types,
//! the `assignable` predicate, and the well-known-action registry).

pub mod actions;
pub mod availability;
pub mod lexer;
pub mod parser;
pub mod semantics;
pub mod types;

pub use actions::{well_known_action, WellKnownAction};
pub use availability::availability;
pub use lexer::{ExprError, Lexer, Token, TokenKind};
pub use parser::{parse, ExprNode};
pub use semantics::SemanticsChecker;
pub use types::{ExprType, ObjectType};

/// 1-based position relative to the expression snippet being checked. The
/// caller rebases it onto the document position of the enclosing scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExprPos {
    pub line: usize,
    pub col: usize,
}

impl ExprPos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}
