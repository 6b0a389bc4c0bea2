//! Type checking of parsed expressions
//!
//! Checking never aborts on the first problem: every node yields a type
//! (falling back to `Any` after an error) and the checker accumulates all
//! errors it finds so a single pass reports everything.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::lexer::ExprError;
use super::parser::{ExprNode, LogicalOp};
use super::types::{ExprType, ObjectType};
use super::ExprPos;

struct FuncSig {
    /// Human readable signature quoted in error messages.
    display: &'static str,
    params: Vec<ExprType>,
    /// Repeats the last parameter type for any further arguments.
    variadic: bool,
    min_args: usize,
    ret: ExprType,
    /// Status functions and `hashFiles` are only available at specific
    /// metadata keys.
    special: bool,
}

static FUNCTIONS: Lazy<HashMap<&'static str, FuncSig>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "contains",
        FuncSig {
            display: "contains(search, item)",
            params: vec![ExprType::Any, ExprType::Any],
            variadic: false,
            min_args: 2,
            ret: ExprType::Bool,
            special: false,
        },
    );
    m.insert(
        "startswith",
        FuncSig {
            display: "startsWith(searchString, searchValue)",
            params: vec![ExprType::String, ExprType::String],
            variadic: false,
            min_args: 2,
            ret: ExprType::Bool,
            special: false,
        },
    );
    m.insert(
        "endswith",
        FuncSig {
            display: "endsWith(searchString, searchValue)",
            params: vec![ExprType::String, ExprType::String],
            variadic: false,
            min_args: 2,
            ret: ExprType::Bool,
            special: false,
        },
    );
    m.insert(
        "format",
        FuncSig {
            display: "format(format, values...)",
            params: vec![ExprType::String, ExprType::Any],
            variadic: true,
            min_args: 1,
            ret: ExprType::String,
            special: false,
        },
    );
    m.insert(
        "join",
        FuncSig {
            display: "join(array, separator?)",
            params: vec![ExprType::Any, ExprType::String],
            variadic: false,
            min_args: 1,
            ret: ExprType::String,
            special: false,
        },
    );
    m.insert(
        "tojson",
        FuncSig {
            display: "toJSON(value)",
            params: vec![ExprType::Any],
            variadic: false,
            min_args: 1,
            ret: ExprType::String,
            special: false,
        },
    );
    m.insert(
        "fromjson",
        FuncSig {
            display: "fromJSON(value)",
            params: vec![ExprType::String],
            variadic: false,
            min_args: 1,
            ret: ExprType::Any,
            special: false,
        },
    );
    m.insert(
        "hashfiles",
        FuncSig {
            display: "hashFiles(path...)",
            params: vec![ExprType::String],
            variadic: true,
            min_args: 1,
            ret: ExprType::String,
            special: true,
        },
    );
    for name in ["success", "always", "cancelled", "failure"] {
        m.insert(
            name,
            FuncSig {
                display: match name {
                    "success" => "success()",
                    "always" => "always()",
                    "cancelled" => "cancelled()",
                    _ => "failure()",
                },
                params: vec![],
                variadic: false,
                min_args: 0,
                ret: ExprType::Bool,
                special: true,
            },
        );
    }
    m
});

static GITHUB_CONTEXT: Lazy<ObjectType> = Lazy::new(|| {
    let s = || ExprType::String;
    ObjectType::with_props([
        ("action", s()),
        ("action_path", s()),
        ("action_ref", s()),
        ("action_repository", s()),
        ("action_status", s()),
        ("actor", s()),
        ("actor_id", s()),
        ("api_url", s()),
        ("base_ref", s()),
        ("env", s()),
        ("event", ExprType::Object(ObjectType::open())),
        ("event_name", s()),
        ("event_path", s()),
        ("graphql_url", s()),
        ("head_ref", s()),
        ("job", s()),
        ("path", s()),
        ("ref", s()),
        ("ref_name", s()),
        ("ref_protected", ExprType::Bool),
        ("ref_type", s()),
        ("repository", s()),
        ("repository_id", s()),
        ("repository_owner", s()),
        ("repository_owner_id", s()),
        ("retention_days", ExprType::Number),
        ("run_attempt", s()),
        ("run_id", s()),
        ("run_number", s()),
        ("secret_source", s()),
        ("server_url", s()),
        ("sha", s()),
        ("token", s()),
        ("triggering_actor", s()),
        ("workflow", s()),
        ("workflow_ref", s()),
        ("workflow_sha", s()),
        ("workspace", s()),
    ])
});

static RUNNER_CONTEXT: Lazy<ObjectType> = Lazy::new(|| {
    let s = || ExprType::String;
    ObjectType::with_props([
        ("arch", s()),
        ("debug", s()),
        ("environment", s()),
        ("name", s()),
        ("os", s()),
        ("temp", s()),
        ("tool_cache", s()),
    ])
});

static JOB_CONTEXT: Lazy<ObjectType> = Lazy::new(|| {
    ObjectType::with_props([
        (
            "container",
            ExprType::Object(ObjectType::with_props([
                ("id", ExprType::String),
                ("network", ExprType::String),
            ])),
        ),
        (
            "services",
            ExprType::Object(ObjectType::map(ExprType::Object(ObjectType::open()))),
        ),
        ("status", ExprType::String),
    ])
});

/// Type checker for one expression. Context and special-function
/// availability comes from the metadata key the expression appears at; the
/// `inputs` and `steps` context types come from the enclosing document and
/// evolve as steps are visited, so the checker only borrows them.
#[derive(Default)]
pub struct SemanticsChecker<'a> {
    contexts: Option<&'a [&'static str]>,
    special_functions: Option<&'a [&'static str]>,
    inputs_ty: Option<&'a ObjectType>,
    steps_ty: Option<&'a ObjectType>,
    errors: Vec<ExprError>,
}

impl<'a> SemanticsChecker<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts which context names and special functions may appear.
    pub fn set_availability(
        &mut self,
        contexts: &'a [&'static str],
        special_functions: &'a [&'static str],
    ) {
        self.contexts = Some(contexts);
        self.special_functions = Some(special_functions);
    }

    pub fn set_inputs_type(&mut self, ty: &'a ObjectType) {
        self.inputs_ty = Some(ty);
    }

    pub fn set_steps_type(&mut self, ty: &'a ObjectType) {
        self.steps_ty = Some(ty);
    }

    /// Checks the expression and returns its type along with every problem
    /// found, in source order.
    pub fn check(mut self, expr: &ExprNode) -> (ExprType, Vec<ExprError>) {
        let ty = self.check_node(expr);
        self.errors.sort_by_key(|e| (e.line, e.col));
        (ty, self.errors)
    }

    fn error(&mut self, message: String, pos: ExprPos) {
        self.errors.push(ExprError::new(message, pos.line, pos.col));
    }

    fn check_node(&mut self, expr: &ExprNode) -> ExprType {
        match expr {
            ExprNode::Variable { name, pos } => self.check_variable(name, *pos),
            ExprNode::StrLit { .. } => ExprType::String,
            ExprNode::NumLit { .. } => ExprType::Number,
            ExprNode::BoolLit { .. } => ExprType::Bool,
            ExprNode::NullLit { .. } => ExprType::Null,
            ExprNode::Not { operand, pos } => {
                let ty = self.check_node(operand);
                if !ExprType::Bool.assignable(&ty) {
                    self.error(
                        format!(
                            "type of operand of ! operator \"{ty}\" is not assignable to type \"bool\""
                        ),
                        *pos,
                    );
                }
                ExprType::Bool
            }
            ExprNode::Compare { left, right, .. } => {
                // Comparison coerces both sides, so any operand types are fine
                self.check_node(left);
                self.check_node(right);
                ExprType::Bool
            }
            ExprNode::Logical {
                op, left, right, ..
            } => {
                let op_str = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                for operand in [left, right] {
                    let ty = self.check_node(operand);
                    if !ExprType::Bool.assignable(&ty) {
                        self.error(
                            format!(
                                "type of operand of {op_str} operator \"{ty}\" is not assignable to type \"bool\""
                            ),
                            operand.pos(),
                        );
                    }
                }
                ExprType::Bool
            }
            ExprNode::FuncCall { name, args, pos } => self.check_call(name, args, *pos),
            ExprNode::PropDeref {
                receiver,
                property,
                pos,
            } => {
                let ty = self.check_node(receiver);
                self.check_prop(&ty, property, *pos)
            }
            ExprNode::FilterDeref { receiver, pos } => {
                let ty = self.check_node(receiver);
                self.check_filter(&ty, *pos)
            }
            ExprNode::Index {
                receiver,
                index,
                pos,
            } => {
                let recv_ty = self.check_node(receiver);
                self.check_index(&recv_ty, index, *pos)
            }
        }
    }

    fn check_variable(&mut self, name: &str, pos: ExprPos) -> ExprType {
        let folded = name.to_lowercase();
        if let Some(contexts) = self.contexts {
            if !contexts.iter().any(|c| *c == folded) {
                self.error(
                    format!(
                        "context {name:?} is not allowed here. available contexts are {}",
                        quote_list(contexts)
                    ),
                    pos,
                );
                return ExprType::Any;
            }
        }
        match folded.as_str() {
            "github" => ExprType::Object(GITHUB_CONTEXT.clone()),
            "runner" => ExprType::Object(RUNNER_CONTEXT.clone()),
            "job" => ExprType::Object(JOB_CONTEXT.clone()),
            "env" | "vars" | "secrets" => ExprType::Object(ObjectType::map(ExprType::String)),
            "inputs" => match self.inputs_ty {
                Some(ty) => ExprType::Object(ty.clone()),
                None => ExprType::Object(ObjectType::open()),
            },
            "steps" => match self.steps_ty {
                Some(ty) => ExprType::Object(ty.clone()),
                None => ExprType::Object(ObjectType::open()),
            },
            _ => {
                self.error(
                    format!(
                        "undefined variable {name:?}. available variables are {}",
                        quote_list(&["env", "github", "inputs", "job", "runner", "secrets", "steps", "vars"])
                    ),
                    pos,
                );
                ExprType::Any
            }
        }
    }

    fn check_call(&mut self, name: &str, args: &[ExprNode], pos: ExprPos) -> ExprType {
        let folded = name.to_lowercase();
        let Some(sig) = FUNCTIONS.get(folded.as_str()) else {
            let mut names: Vec<&&str> = FUNCTIONS.keys().collect();
            names.sort();
            self.error(
                format!(
                    "undefined function {name:?}. available functions are {}",
                    names
                        .iter()
                        .map(|n| format!("\"{n}\""))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                pos,
            );
            for arg in args {
                self.check_node(arg);
            }
            return ExprType::Any;
        };
        if sig.special {
            if let Some(allowed) = self.special_functions {
                if !allowed.iter().any(|f| *f == folded) {
                    self.error(
                        format!(
                            "calling function {name:?} is not allowed here. available special functions are {}",
                            quote_list(allowed)
                        ),
                        pos,
                    );
                }
            }
        }
        let too_many = !sig.variadic && args.len() > sig.params.len();
        if args.len() < sig.min_args || too_many {
            let takes = if sig.variadic || sig.min_args != sig.params.len() {
                format!("takes at least {} parameters", sig.min_args)
            } else {
                format!("takes {} parameters", sig.params.len())
            };
            self.error(
                format!(
                    "number of arguments is wrong. function \"{}\" {takes} but {} arguments are given",
                    sig.display,
                    args.len()
                ),
                pos,
            );
        }
        for (i, arg) in args.iter().enumerate() {
            let ty = self.check_node(arg);
            let expected = if i < sig.params.len() {
                &sig.params[i]
            } else if sig.variadic {
                sig.params.last().unwrap_or(&ExprType::Any)
            } else {
                continue;
            };
            if !expected.assignable(&ty) {
                self.error(
                    format!(
                        "{} argument of function call is not assignable. \"{ty}\" cannot be assigned to \"{expected}\". called function type is \"{}\"",
                        ordinal(i + 1),
                        sig.display
                    ),
                    arg.pos(),
                );
            }
        }
        sig.ret.clone()
    }

    fn check_prop(&mut self, receiver: &ExprType, property: &str, pos: ExprPos) -> ExprType {
        match receiver {
            ExprType::Any => ExprType::Any,
            ExprType::Object(obj) => match obj.prop(property) {
                Some(ty) => ty,
                None => {
                    self.error(
                        format!(
                            "property {property:?} is not defined in object type {obj}"
                        ),
                        pos,
                    );
                    ExprType::Any
                }
            },
            ExprType::Array(elem) => match elem.as_ref() {
                ExprType::Any => ExprType::Array(Box::new(ExprType::Any)),
                ExprType::Object(obj) => match obj.prop(property) {
                    Some(ty) => ExprType::Array(Box::new(ty)),
                    None => {
                        self.error(
                            format!(
                                "property {property:?} is not defined in object type {obj}"
                            ),
                            pos,
                        );
                        ExprType::Array(Box::new(ExprType::Any))
                    }
                },
                other => {
                    self.error(
                        format!(
                            "receiver of object dereference {property:?} must be type of object but got \"array<{other}>\""
                        ),
                        pos,
                    );
                    ExprType::Any
                }
            },
            other => {
                self.error(
                    format!(
                        "receiver of object dereference {property:?} must be type of object but got \"{other}\""
                    ),
                    pos,
                );
                ExprType::Any
            }
        }
    }

    fn check_filter(&mut self, receiver: &ExprType, pos: ExprPos) -> ExprType {
        match receiver {
            ExprType::Any => ExprType::Array(Box::new(ExprType::Any)),
            ExprType::Array(elem) => ExprType::Array(elem.clone()),
            ExprType::Object(obj) => ExprType::Array(Box::new(obj.elem())),
            other => {
                self.error(
                    format!(
                        "receiver of object filtering `.*` must be type of array or object but got \"{other}\""
                    ),
                    pos,
                );
                ExprType::Any
            }
        }
    }

    fn check_index(&mut self, receiver: &ExprType, index: &ExprNode, pos: ExprPos) -> ExprType {
        match receiver {
            ExprType::Any => {
                self.check_node(index);
                ExprType::Any
            }
            ExprType::Array(elem) => {
                let idx_ty = self.check_node(index);
                if !ExprType::Number.assignable(&idx_ty) {
                    self.error(
                        format!(
                            "index access of array must be type of number but got \"{idx_ty}\""
                        ),
                        index.pos(),
                    );
                }
                (**elem).clone()
            }
            ExprType::Object(obj) => {
                // A literal key on a strict object behaves like a property
                // access so typos are still caught
                if let ExprNode::StrLit { value, .. } = index {
                    if obj.is_strict() {
                        return self.check_prop(receiver, &value.to_lowercase(), pos);
                    }
                }
                let idx_ty = self.check_node(index);
                if !ExprType::String.assignable(&idx_ty) {
                    self.error(
                        format!(
                            "index access of object must be type of string but got \"{idx_ty}\""
                        ),
                        index.pos(),
                    );
                }
                obj.elem()
            }
            other => {
                self.check_node(index);
                self.error(
                    format!(
                        "receiver of index access must be type of object or array but got \"{other}\""
                    ),
                    pos,
                );
                ExprType::Any
            }
        }
    }
}

fn quote_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("\"{n}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;

    fn check(src: &str) -> (ExprType, Vec<ExprError>) {
        let (node, _) = parse(src);
        SemanticsChecker::new().check(&node.unwrap())
    }

    #[test]
    fn test_github_context_props() {
        let (ty, errs) = check("github.sha }}");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(ty, ExprType::String);

        let (ty, errs) = check("github.ref_protected }}");
        assert!(errs.is_empty());
        assert_eq!(ty, ExprType::Bool);
    }

    #[test]
    fn test_unknown_github_prop() {
        let (_, errs) = check("github.unknown_prop }}");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("\"unknown_prop\" is not defined"));
    }

    #[test]
    fn test_undefined_variable() {
        let (_, errs) = check("matrix.os }}");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("undefined variable \"matrix\""));
    }

    #[test]
    fn test_context_availability() {
        let (node, _) = parse("secrets.token }}");
        let node = node.unwrap();
        let mut checker = SemanticsChecker::new();
        checker.set_availability(&["github", "inputs"], &[]);
        let (_, errs) = checker.check(&node);
        assert_eq!(errs.len(), 1);
        assert!(errs[0]
            .message
            .contains("context \"secrets\" is not allowed here"));
    }

    #[test]
    fn test_special_function_availability() {
        let (node, _) = parse("success() }}");
        let node = node.unwrap();
        let mut checker = SemanticsChecker::new();
        checker.set_availability(&["github"], &["hashfiles"]);
        let (_, errs) = checker.check(&node);
        assert_eq!(errs.len(), 1);
        assert!(errs[0]
            .message
            .contains("calling function \"success\" is not allowed here"));
    }

    #[test]
    fn test_function_arg_count() {
        let (_, errs) = check("startsWith(github.ref) }}");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("number of arguments is wrong"));
    }

    #[test]
    fn test_function_arg_type() {
        let (_, errs) = check("startsWith(github.ref, null) }}");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("2nd argument"), "{}", errs[0].message);
    }

    #[test]
    fn test_function_case_insensitive() {
        let (ty, errs) = check("toJson(github) }}");
        assert!(errs.is_empty());
        assert_eq!(ty, ExprType::String);
    }

    #[test]
    fn test_undefined_function() {
        let (_, errs) = check("concatenate('a', 'b') }}");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("undefined function \"concatenate\""));
    }

    #[test]
    fn test_steps_type_from_caller() {
        let steps = ObjectType::with_props([(
            "build",
            ExprType::Object(ObjectType::with_props([
                (
                    "outputs",
                    ExprType::Object(ObjectType::map(ExprType::String)),
                ),
                ("conclusion", ExprType::String),
                ("outcome", ExprType::String),
            ])),
        )]);
        let (node, _) = parse("steps.build.outputs.path }}");
        let node = node.unwrap();
        let mut checker = SemanticsChecker::new();
        checker.set_steps_type(&steps);
        let (ty, errs) = checker.check(&node);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(ty, ExprType::String);

        let (node, _) = parse("steps.deploy.outcome }}");
        let node = node.unwrap();
        let mut checker = SemanticsChecker::new();
        checker.set_steps_type(&steps);
        let (_, errs) = checker.check(&node);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("\"deploy\" is not defined"));
    }

    #[test]
    fn test_not_operand_must_be_bool() {
        let (_, errs) = check("!github.sha }}");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("! operator"));
    }

    #[test]
    fn test_logical_and_comparison() {
        let (ty, errs) = check("github.ref == 'refs/heads/main' && github.ref_protected }}");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(ty, ExprType::Bool);
    }

    #[test]
    fn test_env_is_string_map() {
        let (ty, errs) = check("env.ANYTHING_GOES }}");
        assert!(errs.is_empty());
        assert_eq!(ty, ExprType::String);
    }

    #[test]
    fn test_index_access() {
        let (ty, errs) = check("fromJSON(inputs.list)[0] }}");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(ty, ExprType::Any);

        let (_, errs) = check("github['sha'] }}");
        assert!(errs.is_empty(), "{errs:?}");

        let (_, errs) = check("github['shaa'] }}");
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_filter_deref() {
        let (ty, errs) = check("env.* }}");
        assert!(errs.is_empty());
        assert_eq!(ty, ExprType::Array(Box::new(ExprType::String)));
    }
}
