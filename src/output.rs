//! The evaluation result tree and its output formats.

use serde::Serialize;
use serde_json::Value;

use crate::pointer::JsonPointer;
use crate::types::OutputFormat;

/// One node of the result tree.
///
/// Subschema nodes have no `keyword`; keyword nodes name the keyword that
/// produced them. A keyword that only annotates is valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResults {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub evaluation_path: JsonPointer,
    /// Absolute location: `<base-uri>#<pointer>`.
    pub schema_location: String,
    pub instance_location: JsonPointer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<EvaluationResults>,
}

impl EvaluationResults {
    /// Whether this node has children worth inspecting. Atomic keyword
    /// outcomes are leaves.
    pub fn has_details(&self) -> bool {
        !self.details.is_empty()
    }

    /// Every node, depth-first, parents before children.
    pub fn iter(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Every leaf, depth-first.
    pub fn leaves(&self) -> impl Iterator<Item = &EvaluationResults> {
        self.iter().filter(|node| !node.has_details())
    }

    /// Failing leaves carrying an error message.
    pub fn errors(&self) -> impl Iterator<Item = &EvaluationResults> {
        self.leaves().filter(|node| !node.valid)
    }

    /// Project the tree into one of the output formats.
    ///
    /// `include_valid` makes the basic format list every unit rather than
    /// only the failing ones.
    pub fn project(&self, format: OutputFormat, include_valid: bool) -> Output {
        match format {
            OutputFormat::Flag => Output::Flag { valid: self.valid },
            OutputFormat::Basic => Output::Basic {
                valid: self.valid,
                details: self
                    .iter()
                    .filter(|node| include_valid || !node.valid)
                    .map(OutputUnit::from)
                    .collect(),
            },
            OutputFormat::Hierarchical => Output::Hierarchical(self.clone()),
        }
    }
}

/// Depth-first iterator over a result tree.
#[derive(Debug)]
pub struct Preorder<'r> {
    stack: Vec<&'r EvaluationResults>,
}

impl<'r> Iterator for Preorder<'r> {
    type Item = &'r EvaluationResults;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.details.iter().rev());
        Some(node)
    }
}

/// A result node without its children, as listed by the basic format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputUnit {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub evaluation_path: JsonPointer,
    pub schema_location: String,
    pub instance_location: JsonPointer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Value>,
}

impl From<&EvaluationResults> for OutputUnit {
    fn from(node: &EvaluationResults) -> Self {
        Self {
            valid: node.valid,
            keyword: node.keyword.clone(),
            evaluation_path: node.evaluation_path.clone(),
            schema_location: node.schema_location.clone(),
            instance_location: node.instance_location.clone(),
            error: node.error.clone(),
            annotation: node.annotation.clone(),
        }
    }
}

/// A projected result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Flag { valid: bool },
    Basic { valid: bool, details: Vec<OutputUnit> },
    Hierarchical(EvaluationResults),
}

impl Output {
    pub fn valid(&self) -> bool {
        match self {
            Output::Flag { valid } | Output::Basic { valid, .. } => *valid,
            Output::Hierarchical(results) => results.valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(valid: bool, path: &str, details: Vec<EvaluationResults>) -> EvaluationResults {
        let evaluation_path = JsonPointer::parse(path).unwrap();
        EvaluationResults {
            valid,
            keyword: evaluation_path.last().map(str::to_string),
            schema_location: format!("json-schema:///#{}", evaluation_path),
            evaluation_path,
            instance_location: JsonPointer::root(),
            error: (!valid).then(|| "failed".to_string()),
            annotation: None,
            details,
        }
    }

    fn sample() -> EvaluationResults {
        node(
            false,
            "",
            vec![
                node(false, "/allOf", vec![node(false, "/allOf/0/type", vec![])]),
                node(true, "/title", vec![]),
            ],
        )
    }

    #[test]
    fn preorder_visits_parents_first() {
        let tree = sample();
        let paths: Vec<String> = tree.iter().map(|n| n.evaluation_path.to_string()).collect();
        assert_eq!(paths, ["", "/allOf", "/allOf/0/type", "/title"]);
        assert_eq!(tree.leaves().count(), 2);
        assert_eq!(tree.errors().count(), 1);
    }

    #[test]
    fn flag_and_basic_projection() {
        let tree = sample();
        assert_eq!(tree.project(OutputFormat::Flag, false), Output::Flag { valid: false });

        let Output::Basic { valid, details } = tree.project(OutputFormat::Basic, false) else {
            panic!("expected basic output");
        };
        assert!(!valid);
        assert_eq!(details.len(), 3);
        assert!(details.iter().all(|unit| !unit.valid));

        let Output::Basic { details, .. } = tree.project(OutputFormat::Basic, true) else {
            panic!("expected basic output");
        };
        assert_eq!(details.len(), 4);
    }

    #[test]
    fn serializes_camel_case_without_empty_fields() {
        let leaf = node(true, "/title", vec![]);
        let json = serde_json::to_value(&leaf).unwrap();
        assert_eq!(
            json,
            json!({
                "valid": true,
                "keyword": "title",
                "evaluationPath": "/title",
                "schemaLocation": "json-schema:///#/title",
                "instanceLocation": ""
            })
        );
        let flag = serde_json::to_value(Output::Flag { valid: true }).unwrap();
        assert_eq!(flag, json!({ "valid": true }));
    }
}
