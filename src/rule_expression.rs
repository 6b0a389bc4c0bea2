//! Rule checking syntax and semantics of `${{ }}` expressions
//!
//! This rule drives the expression engine over every scalar that may embed
//! a template span. The `inputs` context type is built once before steps
//! are visited; the `steps` context type grows one entry per visited step,
//! so an expression can only refer to steps that ran before it.

use crate::ast::{ActionMetadata, Bool, Exec, Pos, Step, Str};
use crate::expr::{
    availability, parse, well_known_action, ExprError, ExprType, ObjectType, SemanticsChecker,
};
use crate::pass::{Pass, PassError};
use crate::rule::{Rule, RuleBase};

const RULE_NAME: &str = "expression";

const SCRIPT_ACTION_PREFIX: &str = "actions/github-script@";

/// One checked `${{ }}` span with its resolved type and the document
/// position of its `${{` marker.
struct TypedExpr {
    ty: ExprType,
    pos: Pos,
}

pub struct ExprRule {
    base: RuleBase,
    inputs_ty: Option<ObjectType>,
    steps_ty: Option<ObjectType>,
}

impl ExprRule {
    pub fn new() -> Self {
        Self {
            base: RuleBase::new(
                RULE_NAME,
                "checks syntax and semantics of \"${{ }}\" expressions embedded in action metadata",
            ),
            inputs_ty: None,
            steps_ty: None,
        }
    }

    /// Every restricted key this rule scans must have an availability entry;
    /// a miss is a bug in the rule, not a lint finding. The empty key marks
    /// fields with no restriction at all.
    fn availability_of(
        key: &str,
    ) -> Result<Option<(&'static [&'static str], &'static [&'static str])>, PassError> {
        if key.is_empty() {
            return Ok(None);
        }
        availability(key)
            .map(Some)
            .ok_or_else(|| {
                PassError::internal(
                    RULE_NAME,
                    format!("availability of metadata key {key:?} is unknown"),
                )
            })
    }

    /// Converts a snippet-relative error position to a document position.
    /// Columns on continuation lines keep their snippet-relative value, the
    /// same approximation the template scanner makes for multi-line scalars.
    fn expr_error(&mut self, err: ExprError, line_base: usize, col_base: usize) {
        let pos = Pos::new(err.line - 1 + line_base, err.col - 1 + col_base);
        self.base.error(pos, err.message);
    }

    /// Parses and type-checks one expression snippet starting just after a
    /// `${{` marker. Returns the resolved type (`None` when parsing failed)
    /// and the byte offset just past the closing `}}`.
    fn check_semantics(
        &mut self,
        src: &str,
        line_base: usize,
        col_base: usize,
        key: &str,
    ) -> Result<(Option<ExprType>, usize), PassError> {
        let restriction = Self::availability_of(key)?;
        let (parsed, offset) = parse(src);
        let node = match parsed {
            Ok(node) => node,
            Err(err) => {
                self.expr_error(err, line_base, col_base);
                return Ok((None, offset));
            }
        };
        let (ty, errs) = {
            let mut checker = SemanticsChecker::new();
            if let Some((contexts, special_functions)) = restriction {
                checker.set_availability(contexts, special_functions);
            }
            if let Some(ty) = self.inputs_ty.as_ref() {
                checker.set_inputs_type(ty);
            }
            if let Some(ty) = self.steps_ty.as_ref() {
                checker.set_steps_type(ty);
            }
            checker.check(&node)
        };
        for err in errs {
            self.expr_error(err, line_base, col_base);
        }
        Ok((Some(ty), offset))
    }

    /// Scans a scalar for `${{ }}` spans and checks each of them. Yields
    /// `None` when a span failed to parse, which also stops the scan.
    fn check_exprs_in(
        &mut self,
        value: &str,
        pos: Pos,
        quoted: bool,
        key: &str,
    ) -> Result<Option<Vec<TypedExpr>>, PassError> {
        let line = pos.line;
        // a quote character sits between the position and the content
        let col = if quoted { pos.col + 1 } else { pos.col };
        let mut s = value;
        let mut offset = 0;
        let mut ts = Vec::new();
        while let Some(idx) = s.find("${{") {
            let start = idx + 3;
            s = &s[start..];
            offset += start;
            let (ty, after) = self.check_semantics(s, line, col + offset, key)?;
            let Some(ty) = ty else {
                return Ok(None);
            };
            ts.push(TypedExpr {
                ty,
                pos: Pos::new(line, col + offset - 3),
            });
            s = &s[after..];
            offset += after;
        }
        Ok(Some(ts))
    }

    fn check_string(
        &mut self,
        value: Option<&Str>,
        key: &str,
    ) -> Result<Option<Vec<TypedExpr>>, PassError> {
        let Some(value) = value else {
            return Ok(None);
        };
        if !value.contains_expression() {
            return Ok(Some(Vec::new()));
        }
        let Some(ts) = self.check_exprs_in(&value.value, value.pos, value.quoted, key)? else {
            return Ok(None);
        };
        if value.is_expression_assigned() {
            return Ok(Some(ts));
        }
        // interpolated spans are stringified, which only makes sense for
        // primitive values
        for t in &ts {
            match t.ty {
                ExprType::Object(_) | ExprType::Array(_) | ExprType::Null => {
                    self.base.error(
                        t.pos,
                        format!(
                            "object, array, and null values should not be evaluated in template with ${{{{ }}}} but evaluating the value of type \"{}\"",
                            t.ty
                        ),
                    );
                }
                _ => {}
            }
        }
        Ok(Some(ts))
    }

    /// Like `check_string` but without the interpolation restriction: the
    /// value is program text, not a template result.
    fn check_script_string(&mut self, value: Option<&Str>, key: &str) -> Result<(), PassError> {
        let Some(value) = value else {
            return Ok(());
        };
        if value.contains_expression() {
            self.check_exprs_in(&value.value, value.pos, value.quoted, key)?;
        }
        Ok(())
    }

    fn check_bool(&mut self, value: Option<&Bool>, key: &str) -> Result<(), PassError> {
        let Some(expr) = value.and_then(|b| b.expression.as_ref()) else {
            return Ok(());
        };
        let Some(ts) = self.check_exprs_in(&expr.value, expr.pos, expr.quoted, key)? else {
            return Ok(());
        };
        if let [t] = ts.as_slice() {
            if !ExprType::Bool.assignable(&t.ty) {
                self.base.error(
                    expr.pos,
                    format!("type of expression must be bool but found type \"{}\"", t.ty),
                );
            }
        }
        Ok(())
    }

    fn check_if_condition(&mut self, cond: Option<&Str>, key: &str) -> Result<(), PassError> {
        let Some(cond) = cond else {
            return Ok(());
        };
        let mut cond_ty = None;
        if cond.contains_expression() {
            if let Some(ts) = self.check_string(Some(cond), key)? {
                if ts.len() == 1 && cond.is_expression_assigned() {
                    cond_ty = Some(ts.into_iter().next().map(|t| t.ty).unwrap_or_default());
                }
            }
        } else {
            // a bare condition is an expression without the markers; the
            // checker still needs the terminator
            let src = format!("{}}}}}", cond.value);
            let (ty, _) = self.check_semantics(&src, cond.pos.line, cond.pos.col, key)?;
            cond_ty = ty;
        }
        if let Some(ty) = cond_ty {
            if !ExprType::Bool.assignable(&ty) {
                self.base.error(
                    cond.pos,
                    format!(
                        "\"if\" condition should be type \"bool\" but got type \"{ty}\""
                    ),
                );
            }
        }
        Ok(())
    }

    fn outputs_type_of(exec: &Exec) -> ObjectType {
        match exec {
            // run steps can write arbitrary outputs to GITHUB_OUTPUT
            Exec::Run(_) => ObjectType::map(ExprType::String),
            Exec::Action(action) => {
                let Some(uses) = action.uses.as_ref() else {
                    return ObjectType::map(ExprType::String);
                };
                match well_known_action(&uses.value) {
                    Some(known) if known.skip_outputs => ObjectType::open(),
                    Some(known) => ObjectType::with_props(
                        known.outputs.keys().map(|name| (name.clone(), ExprType::String)),
                    ),
                    None => ObjectType::map(ExprType::String),
                }
            }
        }
    }

    fn record_step(&mut self, step: &Step) -> Result<(), PassError> {
        let steps_ty = self
            .steps_ty
            .as_mut()
            .ok_or_else(|| PassError::internal(RULE_NAME, "steps context type was not prepared"))?;
        let Some(id) = step.id.as_ref() else {
            return Ok(());
        };
        if id.contains_expression() {
            // the id is unknown statically, so any step id must be accepted
            // from here on
            steps_ty.loosen();
            return Ok(());
        }
        let entry = ExprType::Object(ObjectType::with_props([
            (
                "outputs".to_string(),
                ExprType::Object(Self::outputs_type_of(&step.exec)),
            ),
            ("conclusion".to_string(), ExprType::String),
            ("outcome".to_string(), ExprType::String),
        ]));
        steps_ty.props.entry(id.value.to_lowercase()).or_insert(entry);
        Ok(())
    }
}

impl Default for ExprRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ExprRule {
    fn visit_metadata_pre(&mut self, metadata: &ActionMetadata) -> Result<(), PassError> {
        self.check_string(metadata.name.as_ref(), "")?;
        self.check_string(metadata.author.as_ref(), "")?;
        self.check_string(metadata.description.as_ref(), "")?;
        self.inputs_ty = Some(ObjectType::with_props(
            metadata.inputs.keys().map(|id| (id.clone(), ExprType::Any)),
        ));
        self.steps_ty = Some(ObjectType::strict());
        for input in metadata.inputs.values() {
            self.check_string(input.description.as_ref(), "")?;
            self.check_bool(input.required.as_ref(), "")?;
            self.check_string(input.default.as_ref(), "inputs.<input_id>.default")?;
            self.check_string(input.deprecation_message.as_ref(), "")?;
        }
        Ok(())
    }

    fn visit_step(&mut self, step: &Step) -> Result<(), PassError> {
        if self.steps_ty.is_none() {
            return Err(PassError::internal(
                RULE_NAME,
                "steps context type was not prepared",
            ));
        }
        self.check_string(step.name.as_ref(), "runs.steps.name")?;
        self.check_if_condition(step.if_cond.as_ref(), "runs.steps.if")?;
        for env in step.env.values() {
            self.check_string(Some(&env.name), "runs.steps.env")?;
            self.check_string(Some(&env.value), "runs.steps.env")?;
        }
        match &step.exec {
            Exec::Run(run) => {
                self.check_string(run.run.as_ref(), "runs.steps.run")?;
                self.check_string(run.shell.as_ref(), "runs.steps.shell")?;
                self.check_string(
                    run.working_directory.as_ref(),
                    "runs.steps.working-directory",
                )?;
            }
            Exec::Action(action) => {
                self.check_string(action.uses.as_ref(), "")?;
                let is_script = action
                    .uses
                    .as_ref()
                    .is_some_and(|u| u.value.starts_with(SCRIPT_ACTION_PREFIX));
                for input in action.inputs.values() {
                    if is_script && input.name.value.eq_ignore_ascii_case("script") {
                        self.check_script_string(Some(&input.value), "runs.steps.with")?;
                    } else {
                        self.check_string(Some(&input.value), "runs.steps.with")?;
                    }
                }
            }
        }
        self.check_bool(
            step.continue_on_error.as_ref(),
            "runs.steps.continue-on-error",
        )?;
        self.record_step(step)
    }

    fn visit_metadata_post(&mut self, metadata: &ActionMetadata) -> Result<(), PassError> {
        for output in metadata.outputs.values() {
            self.check_string(output.value.as_ref(), "outputs.<output_id>")?;
        }
        Ok(())
    }
}

impl Rule for ExprRule {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn description(&self) -> &'static str {
        self.base.description()
    }

    fn take_diagnostics(&mut self) -> Vec<crate::diagnostic::Diagnostic> {
        self.base.take_diagnostics()
    }
}
