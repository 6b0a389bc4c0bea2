//! Typed AST for action metadata files
//!
//! Every node carries a 1-based source position so rules can emit exact
//! diagnostics. The tree is built once by the parser and never mutated;
//! required fields that were missing in the document are `None` rather than
//! construction failures, so consumers must tolerate absent fields.

use std::collections::HashMap;
use std::fmt;

/// 1-based line/column position in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

impl Pos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line:{},col:{}", self.line, self.col)
    }
}

/// A scalar string value with its source position.
///
/// `quoted` records whether the scalar was single- or double-quoted in the
/// document; quoting shifts the column of the first content character by one,
/// which matters when reporting positions inside `${{ }}` spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Str {
    pub value: String,
    pub quoted: bool,
    pub pos: Pos,
}

impl Str {
    /// Whether the value contains at least one complete `${{ }}` span.
    pub fn contains_expression(&self) -> bool {
        match self.value.find("${{") {
            Some(i) => self.value[i..].contains("}}"),
            None => false,
        }
    }

    /// Whether the whole value is exactly one `${{ }}` span, i.e. the scalar
    /// is an expression rather than a template with embedded expressions.
    pub fn is_expression_assigned(&self) -> bool {
        self.value.starts_with("${{")
            && self.value.ends_with("}}")
            && self.value.matches("${{").count() == 1
    }
}

/// A boolean scalar: either a literal or a whole-value `${{ }}` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Bool {
    pub value: bool,
    pub expression: Option<Str>,
    pub pos: Pos,
}

/// An integer scalar: either a literal or a whole-value `${{ }}` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Int {
    pub value: i64,
    pub expression: Option<Str>,
    pub pos: Pos,
}

/// A float scalar: either a literal or a whole-value `${{ }}` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Float {
    pub value: f64,
    pub expression: Option<Str>,
    pub pos: Pos,
}

/// An environment variable entry of a step's `env:` section.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvVar {
    pub name: Str,
    pub value: Str,
}

/// An input passed to a nested action via the `with:` section of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInput {
    pub name: Str,
    pub value: Str,
}

/// A step that runs a shell command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecRun {
    pub run: Option<Str>,
    pub shell: Option<Str>,
    pub working_directory: Option<Str>,
}

/// A step that invokes another action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecAction {
    pub uses: Option<Str>,
    /// Inputs of the `with:` section, keyed by lowercased input name.
    pub inputs: HashMap<String, StepInput>,
}

/// What a step executes: exactly one of a shell command or an action
/// invocation. A step declaring markers for both (or neither) is a parse
/// error, but a best-effort variant is still constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Exec {
    Run(ExecRun),
    Action(ExecAction),
}

impl Exec {
    /// The `uses:` reference when this is an action step.
    pub fn uses(&self) -> Option<&Str> {
        match self {
            Exec::Action(a) => a.uses.as_ref(),
            Exec::Run(_) => None,
        }
    }
}

/// One step of a composite action's `runs.steps:` sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub if_cond: Option<Str>,
    pub id: Option<Str>,
    pub name: Option<Str>,
    /// Environment variables keyed by their name as written.
    pub env: HashMap<String, EnvVar>,
    pub exec: Exec,
    pub continue_on_error: Option<Bool>,
    pub pos: Pos,
}

/// The `runs:` section: the `using:` discriminator and, for composite
/// actions, the ordered step list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Runs {
    pub using: Option<Str>,
    pub steps: Vec<Step>,
}

impl Runs {
    /// Whether `using:` declares this a composite action.
    pub fn is_composite(&self) -> bool {
        self.using.as_ref().is_some_and(|u| u.value == "composite")
    }
}

/// A declared input of the action.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub id: Str,
    pub description: Option<Str>,
    pub required: Option<Bool>,
    pub default: Option<Str>,
    pub deprecation_message: Option<Str>,
    pub pos: Pos,
}

/// A declared output of the action. `value` is required only for composite
/// actions; other action kinds set outputs externally.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub id: Str,
    pub description: Option<Str>,
    pub value: Option<Str>,
}

/// The root of an action.yml / action.yaml document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionMetadata {
    pub name: Option<Str>,
    pub author: Option<Str>,
    pub description: Option<Str>,
    pub inputs: HashMap<String, Input>,
    pub outputs: HashMap<String, Output>,
    pub runs: Option<Runs>,
}

impl ActionMetadata {
    /// Whether the metadata declares a composite action.
    pub fn is_composite(&self) -> bool {
        self.runs.as_ref().is_some_and(Runs::is_composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Str {
        Str {
            value: value.to_string(),
            quoted: false,
            pos: Pos::new(1, 1),
        }
    }

    #[test]
    fn test_pos_display() {
        assert_eq!(format!("{}", Pos::new(3, 7)), "line:3,col:7");
    }

    #[test]
    fn test_contains_expression() {
        assert!(s("${{ inputs.x }}").contains_expression());
        assert!(s("prefix ${{ inputs.x }} suffix").contains_expression());
        assert!(!s("plain text").contains_expression());
        assert!(!s("${{ unterminated").contains_expression());
        assert!(!s("}} ${{").contains_expression());
    }

    #[test]
    fn test_is_expression_assigned() {
        assert!(s("${{ inputs.x }}").is_expression_assigned());
        assert!(!s("prefix ${{ inputs.x }}").is_expression_assigned());
        assert!(!s("${{ a }} ${{ b }}").is_expression_assigned());
        assert!(!s("${{ a }} tail").is_expression_assigned());
        assert!(!s("plain").is_expression_assigned());
    }

    #[test]
    fn test_runs_is_composite() {
        let mut runs = Runs::default();
        assert!(!runs.is_composite());
        runs.using = Some(s("composite"));
        assert!(runs.is_composite());
        runs.using = Some(s("node20"));
        assert!(!runs.is_composite());
    }

    #[test]
    fn test_exec_uses() {
        let run = Exec::Run(ExecRun::default());
        assert!(run.uses().is_none());
        let action = Exec::Action(ExecAction {
            uses: Some(s("actions/checkout@v4")),
            inputs: HashMap::new(),
        });
        assert_eq!(action.uses().unwrap().value, "actions/checkout@v4");
    }
}
