//! `unevaluatedProperties` and `unevaluatedItems`.
//!
//! Both look at what the rest of the schema object already covered: the
//! annotations of sibling keywords, and of subschemas applied in place (via
//! `allOf`, `$ref`, `if`, ...) that passed. Annotations of failed subschemas
//! are dropped, as are those under `not`.

use std::collections::HashSet;

use serde_json::Value;

use crate::evaluator::KeywordContext;
use crate::output::EvaluationResults;
use crate::pointer::JsonPointer;

use super::{ITEM_ANNOTATIONS, PROPERTY_ANNOTATIONS};

/// Keywords whose subschemas are never searched for annotations.
const OPAQUE: &[&str] = &["not", "propertyNames"];

/// Walk the in-place part of a result subtree, handing each keyword result
/// at `location` to `visit`.
fn visit_in_place<'r>(
    results: &'r [EvaluationResults],
    location: &JsonPointer,
    visit: &mut dyn FnMut(&'r EvaluationResults),
) {
    for result in results {
        if result.instance_location != *location {
            continue;
        }
        match result.keyword.as_deref() {
            Some(keyword) if OPAQUE.contains(&keyword) => {}
            Some(_) => {
                visit(result);
                visit_in_place(&result.details, location, visit);
            }
            None if result.valid => visit_in_place(&result.details, location, visit),
            None => {}
        }
    }
}

pub(super) fn unevaluated_properties(ctx: &mut KeywordContext<'_, '_>) {
    let Some(object) = ctx.instance().as_object() else {
        return;
    };
    let mut covered: HashSet<&str> = HashSet::new();
    visit_in_place(ctx.sibling_results(), ctx.instance_location(), &mut |result| {
        let Some(keyword) = result.keyword.as_deref() else {
            return;
        };
        if !PROPERTY_ANNOTATIONS.contains(&keyword) {
            return;
        }
        if let Some(Value::Array(names)) = &result.annotation {
            covered.extend(names.iter().filter_map(Value::as_str));
        }
    });

    let remaining: Vec<(&String, &Value)> = object
        .iter()
        .filter(|(name, _)| !covered.contains(name.as_str()))
        .collect();
    if remaining.is_empty() {
        return;
    }

    let schema = ctx.data();
    let names = || {
        remaining
            .iter()
            .map(|(name, _)| format!("\"{}\"", name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if schema == &Value::Bool(false) {
        let message = format!("unevaluated properties are not allowed ({} unexpected)", names());
        ctx.fail(message);
        return;
    }

    let mut failed = Vec::new();
    for &(name, value) in &remaining {
        if !ctx.descend(None, schema, Some(name.as_str()), value) {
            failed.push(name.as_str());
            if ctx.short_circuit() {
                break;
            }
        }
    }
    ctx.annotate(Value::Array(
        remaining
            .iter()
            .map(|(name, _)| Value::from(name.as_str()))
            .collect(),
    ));
    ctx.conclude(failed.is_empty(), || {
        format!("unevaluated properties {} do not match the schema", failed.join(", "))
    });
}

/// What earlier keywords covered of an array.
#[derive(Default)]
struct CoveredItems {
    all: bool,
    prefix: usize,
    indices: HashSet<usize>,
}

impl CoveredItems {
    fn record(&mut self, keyword: &str, annotation: &Value) {
        match (keyword, annotation) {
            (_, Value::Bool(true)) => self.all = true,
            ("contains", Value::Array(indices)) => self.indices.extend(
                indices
                    .iter()
                    .filter_map(Value::as_u64)
                    .map(|index| index as usize),
            ),
            (_, Value::Number(last)) => {
                if let Some(last) = last.as_u64() {
                    self.prefix = self.prefix.max(last as usize + 1);
                }
            }
            _ => {}
        }
    }

    fn contains(&self, index: usize) -> bool {
        self.all || index < self.prefix || self.indices.contains(&index)
    }
}

pub(super) fn unevaluated_items(ctx: &mut KeywordContext<'_, '_>) {
    let Some(items) = ctx.instance().as_array() else {
        return;
    };
    let mut covered = CoveredItems::default();
    visit_in_place(ctx.sibling_results(), ctx.instance_location(), &mut |result| {
        if let (Some(keyword), Some(annotation)) = (result.keyword.as_deref(), &result.annotation) {
            if ITEM_ANNOTATIONS.contains(&keyword) {
                covered.record(keyword, annotation);
            }
        }
    });

    let remaining: Vec<usize> = (0..items.len())
        .filter(|index| !covered.contains(*index))
        .collect();
    if remaining.is_empty() {
        return;
    }

    let schema = ctx.data();
    if schema == &Value::Bool(false) {
        let message = format!(
            "unevaluated items are not allowed (at {})",
            remaining
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        ctx.fail(message);
        return;
    }

    let mut failed = Vec::new();
    for &index in &remaining {
        if !ctx.descend(None, schema, Some(index.to_string().as_str()), &items[index]) {
            failed.push(index.to_string());
            if ctx.short_circuit() {
                break;
            }
        }
    }
    ctx.annotate(Value::Bool(true));
    ctx.conclude(failed.is_empty(), || {
        format!("unevaluated items at {} do not match the schema", failed.join(", "))
    });
}
