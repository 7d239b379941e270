//! Keywords that apply subschemas to the value or to parts of it.

use std::fmt::Display;

use serde_json::Value;

use crate::evaluator::KeywordContext;
use crate::types::Draft;

use super::describe;

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn quoted<'s>(names: impl IntoIterator<Item = &'s str>) -> String {
    join(names.into_iter().map(|name| format!("\"{}\"", name)))
}

/// The annotation for array keywords: `true` when every item was covered,
/// otherwise the largest index covered.
fn items_annotation(covered: usize, len: usize) -> Option<Value> {
    match covered {
        0 => None,
        n if n >= len => Some(Value::Bool(true)),
        n => Some(Value::from(n - 1)),
    }
}

pub(super) fn all_of(ctx: &mut KeywordContext<'_, '_>) {
    let Some(schemas) = ctx.data().as_array() else {
        return;
    };
    let instance = ctx.instance();
    let mut failed = Vec::new();
    for (index, schema) in schemas.iter().enumerate() {
        if !ctx.descend(Some(index.to_string().as_str()), schema, None, instance) {
            failed.push(index);
            if ctx.short_circuit() {
                break;
            }
        }
    }
    ctx.conclude(failed.is_empty(), || {
        format!(
            "{} does not match every subschema (failed: {})",
            describe(instance),
            join(&failed)
        )
    });
}

pub(super) fn any_of(ctx: &mut KeywordContext<'_, '_>) {
    let Some(schemas) = ctx.data().as_array() else {
        return;
    };
    let instance = ctx.instance();
    let mut matched = false;
    for (index, schema) in schemas.iter().enumerate() {
        matched |= ctx.descend(Some(index.to_string().as_str()), schema, None, instance);
    }
    ctx.conclude(matched, || {
        format!("{} does not match any of the subschemas", describe(instance))
    });
}

pub(super) fn one_of(ctx: &mut KeywordContext<'_, '_>) {
    let Some(schemas) = ctx.data().as_array() else {
        return;
    };
    let instance = ctx.instance();
    let mut matched = Vec::new();
    for (index, schema) in schemas.iter().enumerate() {
        if ctx.descend(Some(index.to_string().as_str()), schema, None, instance) {
            matched.push(index);
        }
    }
    ctx.conclude(matched.len() == 1, || {
        if matched.is_empty() {
            format!("{} does not match any of the subschemas", describe(instance))
        } else {
            format!(
                "{} matches more than one subschema (matched: {})",
                describe(instance),
                join(&matched)
            )
        }
    });
}

pub(super) fn not(ctx: &mut KeywordContext<'_, '_>) {
    let schema = ctx.data();
    let instance = ctx.instance();
    let matched = ctx.descend(None, schema, None, instance);
    ctx.conclude(!matched, || {
        format!("{} should not match {}", describe(instance), schema)
    });
}

/// `if` never fails; it tells `then`/`else` which way to go.
pub(super) fn if_(ctx: &mut KeywordContext<'_, '_>) {
    let schema = ctx.data();
    let instance = ctx.instance();
    let matched = ctx.descend(None, schema, None, instance);
    ctx.annotate(Value::Bool(matched));
}

pub(super) fn then_else(ctx: &mut KeywordContext<'_, '_>, then: bool) {
    let Some(&Value::Bool(condition)) = ctx.sibling_annotation("if") else {
        return;
    };
    if condition != then {
        return;
    }
    let schema = ctx.data();
    let instance = ctx.instance();
    let valid = ctx.descend(None, schema, None, instance);
    let branch = if then { "then" } else { "else" };
    ctx.conclude(valid, || {
        format!("{} does not match the \"{}\" branch", describe(instance), branch)
    });
}

pub(super) fn dependent_schemas(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(schemas), Some(object)) = (ctx.data().as_object(), ctx.instance().as_object()) else {
        return;
    };
    let instance = ctx.instance();
    let mut failed = Vec::new();
    for (property, schema) in schemas {
        if !object.contains_key(property) {
            continue;
        }
        if !ctx.descend(Some(property.as_str()), schema, None, instance) {
            failed.push(property.as_str());
            if ctx.short_circuit() {
                break;
            }
        }
    }
    ctx.conclude(failed.is_empty(), || {
        format!("{} does not match the schemas required by {}", describe(instance), quoted(failed))
    });
}

/// Draft 4-7 `dependencies`: each entry is either a list of properties that
/// must also be present, or a schema the whole object must match.
pub(super) fn dependencies(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(entries), Some(object)) = (ctx.data().as_object(), ctx.instance().as_object()) else {
        return;
    };
    let instance = ctx.instance();
    let mut errors = Vec::new();
    for (property, dependency) in entries {
        if !object.contains_key(property) {
            continue;
        }
        match dependency {
            Value::Array(required) => {
                let missing: Vec<&str> = required
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|name| !object.contains_key(*name))
                    .collect();
                if !missing.is_empty() {
                    errors.push(format!(
                        "{} required by \"{}\"",
                        quoted(missing),
                        property
                    ));
                }
            }
            schema => {
                if !ctx.descend(Some(property.as_str()), schema, None, instance) {
                    errors.push(format!("schema for \"{}\" not matched", property));
                }
            }
        }
        if !errors.is_empty() && ctx.short_circuit() {
            break;
        }
    }
    ctx.conclude(errors.is_empty(), || errors.join("; "));
}

/// Apply `schemas[i]` to `items[i]` for the overlapping prefix. Returns the
/// number of items covered and whether all of them passed.
fn apply_tuple(ctx: &mut KeywordContext<'_, '_>, schemas: &[Value], items: &[Value]) -> (usize, bool) {
    let mut covered = 0;
    let mut valid = true;
    for (index, (schema, item)) in schemas.iter().zip(items).enumerate() {
        let token = index.to_string();
        covered += 1;
        if !ctx.descend(Some(token.as_str()), schema, Some(token.as_str()), item) {
            valid = false;
            if ctx.short_circuit() {
                break;
            }
        }
    }
    (covered, valid)
}

/// Apply one schema to every item from `start` on.
fn apply_rest(ctx: &mut KeywordContext<'_, '_>, schema: &Value, items: &[Value], start: usize) -> Vec<usize> {
    let mut failed = Vec::new();
    for (index, item) in items.iter().enumerate().skip(start) {
        if !ctx.descend(None, schema, Some(index.to_string().as_str()), item) {
            failed.push(index);
            if ctx.short_circuit() {
                break;
            }
        }
    }
    failed
}

pub(super) fn prefix_items(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(schemas), Some(items)) = (ctx.data().as_array(), ctx.instance().as_array()) else {
        return;
    };
    let (covered, valid) = apply_tuple(ctx, schemas, items);
    if let Some(annotation) = items_annotation(covered, items.len()) {
        ctx.annotate(annotation);
    }
    ctx.conclude(valid, || "items do not match their positional schemas".to_string());
}

/// `items` in either form: a schema for the remaining items (after any
/// `prefixItems`), or, as in drafts up to 2019-09, an array of positional
/// schemas.
pub(super) fn items(ctx: &mut KeywordContext<'_, '_>) {
    let Some(items) = ctx.instance().as_array() else {
        return;
    };
    let data = ctx.data();
    if let Value::Array(schemas) = data {
        let (covered, valid) = apply_tuple(ctx, schemas, items);
        if let Some(annotation) = items_annotation(covered, items.len()) {
            ctx.annotate(annotation);
        }
        ctx.conclude(valid, || "items do not match their positional schemas".to_string());
        return;
    }

    let start = match ctx.sibling_annotation("prefixItems") {
        Some(Value::Bool(true)) => items.len(),
        Some(Value::Number(last)) => last.as_u64().map_or(0, |last| last as usize + 1),
        _ => 0,
    };
    if start >= items.len() {
        return;
    }
    if data == &Value::Bool(false) {
        ctx.fail(format!(
            "{} unexpected item(s) from index {}",
            items.len() - start,
            start
        ));
        return;
    }
    let failed = apply_rest(ctx, data, items, start);
    ctx.annotate(Value::Bool(true));
    ctx.conclude(failed.is_empty(), || {
        format!("items at {} do not match the schema", join(&failed))
    });
}

/// Drafts up to 2019-09: the schema for items past a positional `items`.
pub(super) fn additional_items(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(Value::Array(positional)), Some(items)) =
        (ctx.schema_value("items"), ctx.instance().as_array())
    else {
        return;
    };
    let start = positional.len();
    if start >= items.len() {
        return;
    }
    let data = ctx.data();
    if data == &Value::Bool(false) {
        ctx.fail(format!(
            "additional items are not allowed ({} unexpected)",
            items.len() - start
        ));
        return;
    }
    let failed = apply_rest(ctx, data, items, start);
    ctx.annotate(Value::Bool(true));
    ctx.conclude(failed.is_empty(), || {
        format!("items at {} do not match the schema", join(&failed))
    });
}

/// Annotates the indices of matching items. With `minContains: 0` an array
/// without matches is still valid.
pub(super) fn contains(ctx: &mut KeywordContext<'_, '_>) {
    let Some(items) = ctx.instance().as_array() else {
        return;
    };
    let schema = ctx.data();
    let mut matched = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if ctx.descend(None, schema, Some(index.to_string().as_str()), item) {
            matched.push(Value::from(index));
        }
    }
    let optional = ctx.dialect().draft.map_or(true, |d| d >= Draft::Draft201909)
        && ctx
            .schema_value("minContains")
            .and_then(Value::as_f64)
            .map_or(false, |min| min == 0.0);
    let valid = !matched.is_empty() || optional;
    ctx.annotate(Value::Array(matched));
    let instance = ctx.instance();
    ctx.conclude(valid, || {
        format!("{} does not contain items matching the schema", describe(instance))
    });
}

pub(super) fn properties(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(schemas), Some(object)) = (ctx.data().as_object(), ctx.instance().as_object()) else {
        return;
    };
    let mut evaluated = Vec::new();
    let mut failed = Vec::new();
    for (name, schema) in schemas {
        let Some(value) = object.get(name) else {
            continue;
        };
        evaluated.push(Value::String(name.clone()));
        if !ctx.descend(Some(name.as_str()), schema, Some(name.as_str()), value) {
            failed.push(name.as_str());
            if ctx.short_circuit() {
                break;
            }
        }
    }
    if !evaluated.is_empty() {
        ctx.annotate(Value::Array(evaluated));
    }
    ctx.conclude(failed.is_empty(), || {
        format!("properties {} do not match their schemas", quoted(failed))
    });
}

pub(super) fn pattern_properties(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(schemas), Some(object)) = (ctx.data().as_object(), ctx.instance().as_object()) else {
        return;
    };
    let mut evaluated: Vec<&str> = Vec::new();
    let mut failed: Vec<&str> = Vec::new();
    for (pattern, schema) in schemas {
        let regex = match ctx.regex(pattern) {
            Ok(regex) => regex,
            Err(err) => {
                ctx.fail(format!("invalid pattern \"{}\": {}", pattern, err));
                return;
            }
        };
        for (name, value) in object {
            match regex.is_match(name) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    ctx.fail(format!("matching \"{}\" failed: {}", pattern, err));
                    return;
                }
            }
            if !evaluated.contains(&name.as_str()) {
                evaluated.push(name.as_str());
            }
            if !ctx.descend(Some(pattern.as_str()), schema, Some(name.as_str()), value) {
                failed.push(name.as_str());
            }
        }
        if !failed.is_empty() && ctx.short_circuit() {
            break;
        }
    }
    if !evaluated.is_empty() {
        ctx.annotate(Value::Array(
            evaluated.iter().map(|name| Value::from(*name)).collect(),
        ));
    }
    ctx.conclude(failed.is_empty(), || {
        format!("properties {} do not match their pattern schemas", quoted(failed))
    });
}

fn annotated_names<'v>(annotation: Option<&'v Value>) -> impl Iterator<Item = &'v str> {
    annotation
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Properties not covered by `properties` or `patternProperties`, read from
/// their annotations.
pub(super) fn additional_properties(ctx: &mut KeywordContext<'_, '_>) {
    let Some(object) = ctx.instance().as_object() else {
        return;
    };
    let covered: Vec<&str> = annotated_names(ctx.sibling_annotation("properties"))
        .chain(annotated_names(ctx.sibling_annotation("patternProperties")))
        .collect();
    let extra: Vec<(&String, &Value)> = object
        .iter()
        .filter(|(name, _)| !covered.contains(&name.as_str()))
        .collect();
    if extra.is_empty() {
        return;
    }

    let schema = ctx.data();
    if schema == &Value::Bool(false) {
        ctx.fail(format!(
            "additional properties are not allowed ({} unexpected)",
            quoted(extra.iter().map(|(name, _)| name.as_str()))
        ));
        return;
    }
    let mut failed = Vec::new();
    for &(name, value) in &extra {
        if !ctx.descend(None, schema, Some(name.as_str()), value) {
            failed.push(name.as_str());
            if ctx.short_circuit() {
                break;
            }
        }
    }
    ctx.annotate(Value::Array(
        extra.iter().map(|(name, _)| Value::from(name.as_str())).collect(),
    ));
    ctx.conclude(failed.is_empty(), || {
        format!("additional properties {} do not match the schema", quoted(failed))
    });
}

/// Property names are checked as string values at the object's location.
pub(super) fn property_names(ctx: &mut KeywordContext<'_, '_>) {
    let Some(object) = ctx.instance().as_object() else {
        return;
    };
    let schema = ctx.data();
    let mut failed = Vec::new();
    for name in object.keys() {
        let value = Value::String(name.clone());
        if !ctx.descend(None, schema, None, &value) {
            failed.push(name.as_str());
            if ctx.short_circuit() {
                break;
            }
        }
    }
    if object.is_empty() {
        return;
    }
    ctx.conclude(failed.is_empty(), || {
        format!("property names {} do not match the schema", quoted(failed))
    });
}
