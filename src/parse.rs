//! Metadata parser: raw document tree → validated AST
//!
//! The parser never aborts on a single malformed subtree. It substitutes a
//! best-effort placeholder, records a diagnostic, and keeps parsing siblings
//! so one mistake does not mask others. Only a document that fails to decode
//! at all short-circuits without an AST.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{
    ActionMetadata, Bool, EnvVar, Exec, ExecAction, ExecRun, Float, Input, Int, Output, Pos, Runs,
    Step, StepInput, Str,
};
use crate::diagnostic::{Diagnostic, SYNTAX_CHECK_KIND};
use crate::document::{self, Node, NodeKind, ScanError, YamlTag};

const STEP_KEYS: &[&str] = &[
    "if",
    "id",
    "name",
    "continue-on-error",
    "env",
    "uses",
    "with",
    "run",
    "shell",
    "working-directory",
];

const METADATA_KEYS: &[&str] = &[
    "name",
    "author",
    "description",
    "inputs",
    "outputs",
    "runs",
    "branding",
];

// Keys of non-composite runs sections are recognized so that checking a
// javascript or docker action does not drown in unknown-key findings, but
// only "using" and "steps" are parsed.
const RUNS_KEYS: &[&str] = &[
    "using",
    "steps",
    "main",
    "pre",
    "pre-if",
    "post",
    "post-if",
    "image",
    "entrypoint",
    "args",
    "env",
];

/// Parses action metadata from YAML source. On a document-level decode
/// failure no AST is produced, only diagnostics derived from the failure.
pub fn parse_action(src: &str) -> (Option<ActionMetadata>, Vec<Diagnostic>) {
    match document::load(src) {
        Err(err) => (None, vec![decode_failure(&err)]),
        Ok(None) => {
            let diag = Diagnostic::new(
                "action metadata file is empty",
                Pos::new(1, 1),
                SYNTAX_CHECK_KIND,
            );
            (Some(ActionMetadata::default()), vec![diag])
        }
        Ok(Some(root)) => {
            let (metadata, diags) = parse(&root);
            (Some(metadata), diags)
        }
    }
}

/// Parses an already-decoded document tree. Diagnostics are collected, never
/// returned as errors; the metadata is best-effort complete.
pub fn parse(root: &Node) -> (ActionMetadata, Vec<Diagnostic>) {
    let mut parser = Parser::default();
    let metadata = parser.parse(root);
    (metadata, parser.diags)
}

static ERROR_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bline (\d+)").unwrap());

fn decode_failure(err: &ScanError) -> Diagnostic {
    let text = err.to_string();
    let line = ERROR_LINE_RE
        .captures(&text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);
    Diagnostic::new(
        format!("could not parse as YAML: {text}"),
        Pos::new(line, 0),
        SYNTAX_CHECK_KIND,
    )
}

#[derive(Default)]
struct Parser {
    diags: Vec<Diagnostic>,
}

impl Parser {
    fn error(&mut self, n: &Node, msg: impl Into<String>) {
        self.error_at(n.pos, msg);
    }

    fn error_at(&mut self, pos: Pos, msg: impl Into<String>) {
        self.diags.push(Diagnostic::new(msg, pos, SYNTAX_CHECK_KIND));
    }

    fn unexpected_key(&mut self, key: &Str, section: &str, expected: &[&str]) {
        let msg = match expected.len() {
            0 => format!("unexpected key {:?} for {:?} section", key.value, section),
            1 => format!(
                "expected {:?} key for {:?} section but got {:?}",
                expected[0], section, key.value
            ),
            _ => format!(
                "unexpected key {:?} for {:?} section. expected one of [{}]",
                key.value,
                section,
                expected.join(","),
            ),
        };
        self.error_at(key.pos, msg);
    }

    fn check_sequence(&mut self, section: &str, n: &Node, allow_empty: bool) -> bool {
        let NodeKind::Sequence(items) = &n.kind else {
            self.error(
                n,
                format!(
                    "{:?} section must be sequence node but got {} node with {:?} tag",
                    section,
                    n.kind_name(),
                    n.tag_name(),
                ),
            );
            return false;
        };
        if !allow_empty && items.is_empty() {
            self.error(n, format!("{section:?} section should not be empty"));
            return false;
        }
        true
    }

    fn check_string(&mut self, n: &Node, allow_empty: bool) -> bool {
        let Some((value, _, _)) = n.as_scalar() else {
            self.error(n, format!("expected string but found {:?} node", n.kind_name()));
            return false;
        };
        if !allow_empty && value.is_empty() {
            self.error(n, "string should not be empty");
            return false;
        }
        true
    }

    fn new_str(&self, n: &Node) -> Str {
        match n.as_scalar() {
            Some((value, _, quoted)) => Str {
                value: value.to_string(),
                quoted,
                pos: n.pos,
            },
            None => Str {
                value: String::new(),
                quoted: false,
                pos: n.pos,
            },
        }
    }

    fn parse_string(&mut self, n: &Node, allow_empty: bool) -> Str {
        if !self.check_string(n, allow_empty) {
            return Str {
                value: String::new(),
                quoted: false,
                pos: n.pos,
            };
        }
        self.new_str(n)
    }

    /// Parses a scalar that must be a single whole-value `${{ }}` expression.
    fn parse_expression(&mut self, n: &Node, expecting: &str) -> Option<Str> {
        let s = self.new_str(n);
        if !s.is_expression_assigned() {
            self.error(
                n,
                format!(
                    "expecting a single ${{{{...}}}} expression or {expecting}, but found plain text node"
                ),
            );
            return None;
        }
        Some(s)
    }

    fn parse_bool(&mut self, n: &Node) -> Option<Bool> {
        match n.as_scalar() {
            Some((value, YamlTag::Bool, _)) => Some(Bool {
                value: value.eq_ignore_ascii_case("true"),
                expression: None,
                pos: n.pos,
            }),
            Some((_, YamlTag::Str, _)) => {
                let e = self.parse_expression(n, "boolean literal \"true\" or \"false\"");
                Some(Bool {
                    value: false,
                    expression: e,
                    pos: n.pos,
                })
            }
            _ => {
                self.error(
                    n,
                    format!(
                        "expected bool value but found {} node with {:?} tag",
                        n.kind_name(),
                        n.tag_name(),
                    ),
                );
                None
            }
        }
    }

    // no metadata field is numeric today
    #[allow(dead_code)]
    fn parse_int(&mut self, n: &Node) -> Option<Int> {
        match n.as_scalar() {
            Some((_, YamlTag::Str, _)) => {
                let e = self.parse_expression(n, "integer literal")?;
                Some(Int {
                    value: 0,
                    expression: Some(e),
                    pos: n.pos,
                })
            }
            Some((value, YamlTag::Int, _)) => match value.parse::<i64>() {
                Ok(i) => Some(Int {
                    value: i,
                    expression: None,
                    pos: n.pos,
                }),
                Err(err) => {
                    self.error(n, format!("invalid integer value: {value:?}: {err}"));
                    None
                }
            },
            _ => {
                self.error(
                    n,
                    format!(
                        "expected scalar node for integer value but found {} node with {:?} tag",
                        n.kind_name(),
                        n.tag_name(),
                    ),
                );
                None
            }
        }
    }

    #[allow(dead_code)]
    fn parse_float(&mut self, n: &Node) -> Option<Float> {
        match n.as_scalar() {
            Some((_, YamlTag::Str, _)) => {
                let e = self.parse_expression(n, "float number literal")?;
                Some(Float {
                    value: 0.0,
                    expression: Some(e),
                    pos: n.pos,
                })
            }
            Some((value, YamlTag::Int | YamlTag::Float, _)) => match value.parse::<f64>() {
                Ok(f) if !f.is_nan() => Some(Float {
                    value: f,
                    expression: None,
                    pos: n.pos,
                }),
                _ => {
                    self.error(n, format!("invalid float value: {value:?}"));
                    None
                }
            },
            _ => {
                self.error(
                    n,
                    format!(
                        "expected scalar node for float value but found {} node with {:?} tag",
                        n.kind_name(),
                        n.tag_name(),
                    ),
                );
                None
            }
        }
    }

    /// Iterates the key/value pairs of a mapping node. Null mappings are
    /// rejected unless `allow_empty`; duplicate keys are reported at the
    /// duplicate with its original position and only the first entry is kept.
    fn parse_mapping<'a>(
        &mut self,
        what: &str,
        n: &'a Node,
        allow_empty: bool,
    ) -> Vec<(String, Str, &'a Node)> {
        let is_null = n.is_null();

        if !is_null && !matches!(n.kind, NodeKind::Mapping(_)) {
            self.error(
                n,
                format!(
                    "{what} is {} node but mapping node is expected",
                    n.kind_name()
                ),
            );
            return Vec::new();
        }

        if is_null {
            if !allow_empty {
                self.error(
                    n,
                    format!(
                        "{what} should not be empty. please remove this section if it's unnecessary"
                    ),
                );
            }
            return Vec::new();
        }

        let NodeKind::Mapping(pairs) = &n.kind else {
            return Vec::new();
        };

        let mut seen: HashMap<String, Pos> = HashMap::with_capacity(pairs.len());
        let mut entries = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            if !self.check_string(k, false) {
                continue;
            }
            let key = self.new_str(k);
            if let Some(prev) = seen.get(&key.value) {
                self.error_at(
                    key.pos,
                    format!(
                        "key {:?} is duplicated in {what}. previously defined at {prev}",
                        key.value
                    ),
                );
                continue;
            }
            seen.insert(key.value.clone(), key.pos);
            entries.push((key.value.clone(), key, v));
        }

        if !allow_empty && entries.is_empty() {
            self.error(
                n,
                format!(
                    "{what} should not be empty. please remove this section if it's unnecessary"
                ),
            );
        }

        entries
    }

    fn parse_env(&mut self, n: &Node) -> HashMap<String, EnvVar> {
        let entries = self.parse_mapping("env", n, false);
        let mut env = HashMap::with_capacity(entries.len());
        for (id, key, v) in entries {
            let value = self.parse_string(v, true);
            env.insert(id, EnvVar { name: key, value });
        }
        env
    }

    fn parse_with(&mut self, n: &Node) -> HashMap<String, StepInput> {
        let entries = self.parse_mapping("with", n, false);
        let mut inputs = HashMap::with_capacity(entries.len());
        for (id, key, v) in entries {
            let value = self.parse_string(v, true);
            // Input names of `with:` are case insensitive
            inputs.insert(id.to_lowercase(), StepInput { name: key, value });
        }
        inputs
    }

    fn parse_step(&mut self, n: &Node) -> Step {
        let mut step = Step {
            if_cond: None,
            id: None,
            name: None,
            env: HashMap::new(),
            exec: Exec::Run(ExecRun::default()),
            continue_on_error: None,
            pos: n.pos,
        };

        let mut run = ExecRun::default();
        let mut action = ExecAction::default();
        let mut action_key: Option<Str> = None;
        let mut run_key: Option<Str> = None;

        for (id, key, v) in self.parse_mapping("step", n, false) {
            match id.as_str() {
                "if" => step.if_cond = Some(self.parse_string(v, false)),
                "id" => step.id = Some(self.parse_string(v, false)),
                "name" => step.name = Some(self.parse_string(v, false)),
                "continue-on-error" => step.continue_on_error = self.parse_bool(v),
                "env" => step.env = self.parse_env(v),
                "uses" => {
                    action.uses = Some(self.parse_string(v, false));
                    action_key = Some(key);
                }
                "with" => {
                    action.inputs = self.parse_with(v);
                    if action_key.is_none() {
                        action_key = Some(key);
                    }
                }
                "run" => {
                    run.run = Some(self.parse_string(v, false));
                    run_key = Some(key);
                }
                "shell" => {
                    run.shell = Some(self.parse_string(v, false));
                    if run_key.is_none() {
                        run_key = Some(key);
                    }
                }
                "working-directory" => {
                    run.working_directory = Some(self.parse_string(v, false));
                }
                _ => self.unexpected_key(&key, "step", STEP_KEYS),
            }
        }

        step.exec = if let Some(action_key) = action_key {
            if let Some(run_key) = run_key {
                self.error(
                    n,
                    format!(
                        "step has both run and action keys, {:?} and {:?}",
                        run_key.value, action_key.value
                    ),
                );
            }
            if action.uses.is_none() {
                self.error(n, "\"uses\" is required for a step which runs an action");
            }
            Exec::Action(action)
        } else if run_key.is_some() {
            if run.run.is_none() {
                self.error(n, "\"run\" is required for a step which runs a shell command");
            }
            if run.shell.is_none() {
                self.error(n, "\"shell\" is required for a step which runs a shell command");
            }
            Exec::Run(run)
        } else {
            self.error(n, "step missing both \"run\" and \"uses\"");
            Exec::Run(run)
        };

        step
    }

    fn parse_steps(&mut self, n: &Node) -> Vec<Step> {
        if !self.check_sequence("steps", n, false) {
            return Vec::new();
        }
        let NodeKind::Sequence(items) = &n.kind else {
            return Vec::new();
        };

        let mut steps = Vec::with_capacity(items.len());
        let mut ids: HashMap<String, Pos> = HashMap::new();
        for item in items {
            let step = self.parse_step(item);
            if let Some(id) = &step.id {
                if !id.value.is_empty() && !id.contains_expression() {
                    let folded = id.value.to_lowercase();
                    if let Some(prev) = ids.get(&folded) {
                        self.error_at(
                            id.pos,
                            format!(
                                "step id {:?} is duplicated. previously defined at {prev}. \
                                 step ids are case insensitive",
                                id.value
                            ),
                        );
                    } else {
                        ids.insert(folded, id.pos);
                    }
                }
            }
            steps.push(step);
        }
        steps
    }

    fn parse_input(&mut self, id: Str, n: &Node) -> Input {
        let pos = id.pos;
        let mut input = Input {
            id,
            description: None,
            required: None,
            default: None,
            deprecation_message: None,
            pos,
        };
        for (key_id, key, v) in self.parse_mapping("input", n, false) {
            match key_id.as_str() {
                "description" => input.description = Some(self.parse_string(v, false)),
                "required" => input.required = self.parse_bool(v),
                "default" => input.default = Some(self.parse_string(v, true)),
                "deprecationMessage" => {
                    input.deprecation_message = Some(self.parse_string(v, false));
                }
                _ => self.unexpected_key(
                    &key,
                    "input",
                    &["description", "required", "default", "deprecationMessage"],
                ),
            }
        }
        if input.description.is_none() {
            self.error_at(
                input.pos,
                format!("\"description\" is required for input {:?}", input.id.value),
            );
        }
        input
    }

    fn parse_inputs(&mut self, n: &Node) -> HashMap<String, Input> {
        let entries = self.parse_mapping("inputs section", n, false);
        let mut inputs = HashMap::with_capacity(entries.len());
        for (id, key, v) in entries {
            inputs.insert(id, self.parse_input(key, v));
        }
        inputs
    }

    fn parse_output(&mut self, id: Str, n: &Node) -> Output {
        let mut output = Output {
            id,
            description: None,
            value: None,
        };
        for (key_id, key, v) in self.parse_mapping("output", n, false) {
            match key_id.as_str() {
                "description" => output.description = Some(self.parse_string(v, false)),
                "value" => output.value = Some(self.parse_string(v, false)),
                _ => self.unexpected_key(&key, "output", &["description", "value"]),
            }
        }
        if output.description.is_none() {
            self.error_at(
                output.id.pos,
                format!(
                    "\"description\" is required for output {:?}",
                    output.id.value
                ),
            );
        }
        output
    }

    fn parse_outputs(&mut self, n: &Node) -> HashMap<String, Output> {
        let entries = self.parse_mapping("outputs section", n, false);
        let mut outputs = HashMap::with_capacity(entries.len());
        for (id, key, v) in entries {
            outputs.insert(id, self.parse_output(key, v));
        }
        outputs
    }

    fn parse_runs(&mut self, key_pos: Pos, n: &Node) -> Runs {
        let mut runs = Runs::default();
        let mut steps_key: Option<Str> = None;

        for (id, key, v) in self.parse_mapping("runs section", n, false) {
            match id.as_str() {
                "using" => runs.using = Some(self.parse_string(v, false)),
                "steps" => {
                    runs.steps = self.parse_steps(v);
                    steps_key = Some(key);
                }
                other if RUNS_KEYS.contains(&other) => {
                    // Non-composite runs configuration is not linted
                }
                _ => self.unexpected_key(&key, "runs section", RUNS_KEYS),
            }
        }

        match &runs.using {
            None => self.error_at(key_pos, "\"using\" is missing from runs section"),
            Some(using) if using.value == "composite" => {
                if steps_key.is_none() {
                    self.error_at(key_pos, "\"steps\" section is missing for composite action");
                }
            }
            Some(_) => {
                if let Some(steps_key) = &steps_key {
                    self.error_at(
                        steps_key.pos,
                        "unexpected \"steps\" section for non-composite action",
                    );
                }
            }
        }

        runs
    }

    fn parse(&mut self, root: &Node) -> ActionMetadata {
        let mut metadata = ActionMetadata::default();

        for (id, key, v) in self.parse_mapping("action metadata", root, false) {
            match id.as_str() {
                "name" => metadata.name = Some(self.parse_string(v, false)),
                "author" => metadata.author = Some(self.parse_string(v, false)),
                "description" => metadata.description = Some(self.parse_string(v, false)),
                "inputs" => metadata.inputs = self.parse_inputs(v),
                "outputs" => metadata.outputs = self.parse_outputs(v),
                "runs" => metadata.runs = Some(self.parse_runs(key.pos, v)),
                "branding" => {
                    // Branding is not linted
                }
                _ => self.unexpected_key(&key, "action metadata", METADATA_KEYS),
            }
        }

        if metadata.name.is_none() {
            self.error(root, "\"name\" is missing in action metadata");
        }
        if metadata.description.is_none() {
            self.error(root, "\"description\" is missing in action metadata");
        }
        if metadata.runs.is_none() {
            self.error(root, "\"runs\" section is missing in action metadata");
        }

        // Outputs of non-composite actions are set externally, so the value
        // requirement can only be checked once "runs.using" is known.
        if metadata.is_composite() {
            let missing: Vec<(Pos, String)> = metadata
                .outputs
                .values()
                .filter(|o| o.value.is_none())
                .map(|o| (o.id.pos, o.id.value.clone()))
                .collect();
            for (pos, id) in missing {
                self.error_at(
                    pos,
                    format!("\"value\" is required for output {id:?} of composite action"),
                );
            }
        }

        metadata
    }
}
