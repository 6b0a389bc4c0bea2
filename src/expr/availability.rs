//! Context and special-function availability per metadata key
//!
//! GitHub restricts which contexts and which status functions may appear in
//! a given metadata field. The keys here follow the schema-path convention:
//! `runs.steps.if`, `runs.steps.run`, `outputs.<output_id>`, and so on, with
//! concrete step indices and ids elided.

const STEP_CONTEXTS: &[&str] = &["env", "github", "inputs", "job", "runner", "steps", "vars"];

/// Input defaults are evaluated before any step runs.
const INPUT_CONTEXTS: &[&str] = &["env", "github", "inputs", "job", "runner", "vars"];

const IF_SPECIAL_FUNCTIONS: &[&str] = &["always", "cancelled", "failure", "hashfiles", "success"];

const STEP_SPECIAL_FUNCTIONS: &[&str] = &["hashfiles"];

/// Availability for expressions under the given metadata key: the allowed
/// context names and allowed special functions, all lowercase. `None` means
/// the key is not known to embed expressions at all; callers that pass a key
/// they expect to be listed must treat `None` as a programming error.
pub fn availability(key: &str) -> Option<(&'static [&'static str], &'static [&'static str])> {
    match key {
        "runs.steps.if" => Some((STEP_CONTEXTS, IF_SPECIAL_FUNCTIONS)),
        "runs.steps.continue-on-error"
        | "runs.steps.env"
        | "runs.steps.name"
        | "runs.steps.run"
        | "runs.steps.shell"
        | "runs.steps.with"
        | "runs.steps.working-directory" => Some((STEP_CONTEXTS, STEP_SPECIAL_FUNCTIONS)),
        "inputs.<input_id>.default" => Some((INPUT_CONTEXTS, &[])),
        "outputs.<output_id>" => Some((STEP_CONTEXTS, &[])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_allows_status_functions() {
        let (contexts, funcs) = availability("runs.steps.if").unwrap();
        assert!(contexts.contains(&"steps"));
        assert!(funcs.contains(&"success"));
        assert!(funcs.contains(&"hashfiles"));
    }

    #[test]
    fn test_run_allows_only_hashfiles() {
        let (contexts, funcs) = availability("runs.steps.run").unwrap();
        assert!(contexts.contains(&"inputs"));
        assert_eq!(funcs, &["hashfiles"]);
    }

    #[test]
    fn test_output_value_allows_no_special_functions() {
        let (contexts, funcs) = availability("outputs.<output_id>").unwrap();
        assert!(contexts.contains(&"steps"));
        assert!(funcs.is_empty());
    }

    #[test]
    fn test_input_default_excludes_steps() {
        let (contexts, funcs) = availability("inputs.<input_id>.default").unwrap();
        assert!(!contexts.contains(&"steps"));
        assert!(contexts.contains(&"github"));
        assert!(funcs.is_empty());
    }

    #[test]
    fn test_unknown_key_has_no_entry() {
        assert!(availability("description").is_none());
    }
}
