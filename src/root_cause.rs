//! Root-cause analysis: which failing leaves actually need fixing.
//!
//! The tree is walked breadth-first from the root. At each failing node an
//! analyzer may narrow down which children matter: under `allOf` every
//! failing branch does, under `anyOf` fixing one branch is enough, so only
//! the most promising one is followed. Analysis reads the finished tree and
//! never re-evaluates anything.

use std::collections::VecDeque;

use crate::error::SchemaError;
use crate::output::EvaluationResults;

/// What an analyzer concluded about a failing node.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis<'r> {
    /// Each listed child must be fixed.
    AllRequired(Vec<&'r EvaluationResults>),
    /// Fixing any one listed child fixes the node.
    AnyOneFixes(Vec<&'r EvaluationResults>),
    /// The node itself is the cause; its children do not explain it.
    Terminal,
}

type Analyzer = for<'r> fn(&'r EvaluationResults) -> Option<Analysis<'r>>;

const ANALYZERS: &[Analyzer] = &[all_of, any_of, terminal];

/// Keywords whose success on a branch says the branch was meant for the
/// value.
const GATES: &[&str] = &["type", "const", "enum"];

fn failing(node: &EvaluationResults) -> Vec<&EvaluationResults> {
    node.details.iter().filter(|child| !child.valid).collect()
}

fn all_of(node: &EvaluationResults) -> Option<Analysis<'_>> {
    (node.keyword.as_deref() == Some("allOf")).then(|| Analysis::AllRequired(failing(node)))
}

/// `anyOf`, and `oneOf` when no branch matched.
fn any_of(node: &EvaluationResults) -> Option<Analysis<'_>> {
    match node.keyword.as_deref() {
        Some("anyOf") => {}
        Some("oneOf") if node.details.iter().all(|child| !child.valid) => {}
        _ => return None,
    }
    let best = failing(node)
        .into_iter()
        .enumerate()
        .min_by_key(|(index, branch)| (!gate_passed(branch), failing_leaves(branch), *index))
        .map(|(_, branch)| branch)?;
    Some(Analysis::AnyOneFixes(vec![best]))
}

/// `contains` failing means no item matched, and `oneOf` with a matching
/// branch failed because too many matched. No single child is to blame.
fn terminal(node: &EvaluationResults) -> Option<Analysis<'_>> {
    let blameless = match node.keyword.as_deref() {
        Some("contains") => true,
        Some("oneOf") => node.details.iter().any(|child| child.valid),
        _ => false,
    };
    blameless.then_some(Analysis::Terminal)
}

/// Whether a branch checks the value's shape and that check passed.
fn gate_passed(branch: &EvaluationResults) -> bool {
    let mut gates = branch
        .details
        .iter()
        .filter(|result| GATES.contains(&result.keyword.as_deref().unwrap_or_default()))
        .peekable();
    gates.peek().is_some() && gates.all(|gate| gate.valid)
}

fn failing_leaves(node: &EvaluationResults) -> usize {
    node.errors().count()
}

/// The failing leaves (or terminal nodes) that explain why `results` is
/// invalid, in breadth-first order. Empty when `results` is valid.
pub fn root_causes(results: &EvaluationResults) -> Vec<&EvaluationResults> {
    let mut causes = Vec::new();
    let mut queue = VecDeque::from([results]);

    while let Some(node) = queue.pop_front() {
        if node.valid {
            continue;
        }
        let children = failing(node);
        if children.is_empty() {
            causes.push(node);
            continue;
        }
        match ANALYZERS.iter().find_map(|analyze| analyze(node)) {
            Some(Analysis::AllRequired(children)) | Some(Analysis::AnyOneFixes(children)) => {
                queue.extend(children)
            }
            Some(Analysis::Terminal) => causes.push(node),
            None => queue.extend(children),
        }
    }
    causes
}

/// The root causes as flat errors: instance path, evaluation path, message.
pub fn root_cause_errors(results: &EvaluationResults) -> Vec<SchemaError> {
    root_causes(results)
        .into_iter()
        .map(|cause| SchemaError {
            path: cause.instance_location.to_string(),
            schema_path: cause.evaluation_path.to_string(),
            message: cause
                .error
                .clone()
                .unwrap_or_else(|| "value does not match the schema".to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::JsonPointer;

    fn node(valid: bool, keyword: Option<&str>, details: Vec<EvaluationResults>) -> EvaluationResults {
        EvaluationResults {
            valid,
            keyword: keyword.map(str::to_string),
            evaluation_path: JsonPointer::root(),
            schema_location: "json-schema:///#".to_string(),
            instance_location: JsonPointer::root(),
            error: None,
            annotation: None,
            details,
        }
    }

    #[test]
    fn valid_tree_has_no_causes() {
        assert!(root_causes(&node(true, None, vec![])).is_empty());
    }

    #[test]
    fn any_of_follows_branch_whose_type_matched() {
        let wrong_type = node(false, None, vec![node(false, Some("type"), vec![])]);
        let right_type = node(
            false,
            None,
            vec![
                node(true, Some("type"), vec![]),
                node(false, Some("minLength"), vec![]),
                node(false, Some("pattern"), vec![]),
            ],
        );
        let tree = node(
            false,
            None,
            vec![node(false, Some("anyOf"), vec![wrong_type, right_type])],
        );
        let causes: Vec<_> = root_causes(&tree)
            .into_iter()
            .map(|cause| cause.keyword.clone().unwrap_or_default())
            .collect();
        assert_eq!(causes, ["minLength", "pattern"]);
    }

    #[test]
    fn any_of_prefers_fewest_failures_then_order() {
        let two = node(
            false,
            None,
            vec![node(false, Some("minimum"), vec![]), node(false, Some("maximum"), vec![])],
        );
        let one = node(false, None, vec![node(false, Some("multipleOf"), vec![])]);
        let tree = node(false, Some("anyOf"), vec![two, one]);
        let causes = root_causes(&tree);
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0].keyword.as_deref(), Some("multipleOf"));
    }

    #[test]
    fn node_with_only_valid_children_is_the_cause() {
        let tree = node(false, Some("not"), vec![node(true, None, vec![])]);
        let causes = root_causes(&tree);
        assert_eq!(causes, vec![&tree]);
    }

    #[test]
    fn failed_contains_is_terminal() {
        let tree = node(
            false,
            Some("contains"),
            vec![node(false, None, vec![]), node(false, None, vec![])],
        );
        assert_eq!(root_causes(&tree), vec![&tree]);
    }

    #[test]
    fn analysis_is_idempotent() {
        let tree = node(
            false,
            Some("allOf"),
            vec![
                node(false, None, vec![node(false, Some("type"), vec![])]),
                node(true, None, vec![]),
                node(false, None, vec![node(false, Some("required"), vec![])]),
            ],
        );
        assert_eq!(root_causes(&tree), root_causes(&tree));
        assert_eq!(root_causes(&tree).len(), 2);
    }
}
