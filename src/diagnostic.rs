//! Lint findings and their rendering
//!
//! A [`Diagnostic`] is a user-facing finding tied to a source position. It is
//! distinct from hard failures ([`crate::pass::PassError`], I/O errors):
//! diagnostics never abort a file's check and are rendered with a source-line
//! excerpt, while hard failures surface to the caller.

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use colored::Colorize;

use crate::ast::Pos;

/// Diagnostic kind for findings reported by the metadata parser.
pub const SYNTAX_CHECK_KIND: &str = "syntax-check";

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// Path of the checked file; filled in by the linter.
    pub path: String,
    /// 1-based line. 0 when the position is unknown (e.g. a decode failure
    /// whose error text exposed no line number).
    pub line: usize,
    /// 1-based column. 0 when unknown.
    pub col: usize,
    /// "syntax-check" for parser findings, or the reporting rule's name.
    pub kind: &'static str,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, pos: Pos, kind: &'static str) -> Self {
        Self {
            message: message.into(),
            path: String::new(),
            line: pos.line,
            col: pos.col,
            kind,
        }
    }

    /// Writes the one-line header plus a source excerpt with a column marker.
    pub fn pretty_print(&self, out: &mut impl Write, src: &str) -> io::Result<()> {
        writeln!(out, "{self}")?;
        if self.line == 0 {
            return Ok(());
        }
        let Some(line) = src.lines().nth(self.line - 1) else {
            return Ok(());
        };
        writeln!(out, "{line}")?;
        if self.col > 0 && self.col <= line.chars().count() + 1 {
            let pad: String = line
                .chars()
                .take(self.col - 1)
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect();
            writeln!(out, "{pad}{}", "^".red().bold())?;
        }
        Ok(())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{}]",
            self.path.bold(),
            self.line,
            self.col,
            self.message,
            self.kind.yellow(),
        )
    }
}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Diagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.path, self.line, self.col, &self.message).cmp(&(
            &other.path,
            other.line,
            other.col,
            &other.message,
        ))
    }
}
