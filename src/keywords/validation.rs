//! Assertions on a single value.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::evaluator::KeywordContext;
use crate::types::{json_type_name, Draft};

use super::describe;

/// JSON equality: numbers compare by value, so `1` equals `1.0`.
pub(crate) fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => compare(a, b) == Some(Ordering::Equal),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).map_or(false, |other| equal(value, other)))
        }
        (a, b) => a == b,
    }
}

fn compare(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// A non-negative integer keyword value. `2.0` counts as `2`.
fn limit(data: &Value) -> Option<u64> {
    data.as_u64().or_else(|| {
        data.as_f64()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64)
    })
}

fn is_integer(number: &Number, draft: Option<Draft>) -> bool {
    if number.is_i64() || number.is_u64() {
        return true;
    }
    // Draft 4 only accepts integers without a fractional part in the text.
    draft != Some(Draft::Draft4) && number.as_f64().map_or(false, |n| n.fract() == 0.0)
}

fn has_type(instance: &Value, name: &str, draft: Option<Draft>) -> bool {
    match (name, instance) {
        ("integer", Value::Number(n)) => is_integer(n, draft),
        ("number", Value::Number(_)) => true,
        (name, instance) => json_type_name(instance) == name,
    }
}

pub(super) fn type_(ctx: &mut KeywordContext<'_, '_>) {
    let instance = ctx.instance();
    let draft = ctx.dialect().draft;
    let data = ctx.data();
    let valid = match data {
        Value::String(name) => has_type(instance, name, draft),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| has_type(instance, name, draft)),
        _ => return,
    };
    ctx.conclude(valid, || {
        format!("{} is not of type {}", describe(instance), data)
    });
}

pub(super) fn enum_(ctx: &mut KeywordContext<'_, '_>) {
    let Some(options) = ctx.data().as_array() else {
        return;
    };
    let instance = ctx.instance();
    let valid = options.iter().any(|option| equal(option, instance));
    let data = ctx.data();
    ctx.conclude(valid, || format!("{} is not one of {}", describe(instance), data));
}

pub(super) fn const_(ctx: &mut KeywordContext<'_, '_>) {
    let expected = ctx.data();
    let instance = ctx.instance();
    ctx.conclude(equal(expected, instance), || {
        format!("{} was expected", expected)
    });
}

pub(super) fn multiple_of(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(divisor), Some(value)) = (ctx.data().as_number(), ctx.instance().as_number()) else {
        return;
    };
    if !divisor.as_f64().is_some_and(|d| d > 0.0) {
        ctx.fail(format!("multipleOf must be greater than 0, found {}", divisor));
        return;
    }
    let exact = match (value.as_i64(), divisor.as_i64()) {
        (Some(value), Some(divisor)) => value.checked_rem(divisor).map(|rem| rem == 0),
        _ => None,
    };
    let valid = match exact {
        Some(valid) => valid,
        None => match (value.as_f64(), divisor.as_f64()) {
            (Some(value), Some(divisor)) => {
                let quotient = value / divisor;
                quotient.is_finite()
                    && (quotient - quotient.round()).abs() <= 1e-9 * quotient.abs().max(1.0)
            }
            _ => return,
        },
    };
    ctx.conclude(valid, || format!("{} is not a multiple of {}", value, divisor));
}

/// Draft 4 spells exclusive bounds as a boolean next to the bound.
fn exclusive_flag(ctx: &KeywordContext<'_, '_>, keyword: &str) -> bool {
    ctx.schema_value(keyword) == Some(&Value::Bool(true))
}

fn bound(
    ctx: &mut KeywordContext<'_, '_>,
    accept: fn(Ordering, bool) -> bool,
    strict: bool,
    relation: &str,
) {
    let (Some(limit), Some(value)) = (ctx.data().as_number(), ctx.instance().as_number()) else {
        return;
    };
    let Some(ordering) = compare(value, limit) else {
        return;
    };
    ctx.conclude(accept(ordering, strict), || {
        format!("{} is {} {}", value, relation, limit)
    });
}

pub(super) fn maximum(ctx: &mut KeywordContext<'_, '_>) {
    let strict = exclusive_flag(ctx, "exclusiveMaximum");
    let relation = if strict {
        "greater than or equal to the maximum of"
    } else {
        "greater than the maximum of"
    };
    bound(ctx, |ordering, strict| match ordering {
        Ordering::Less => true,
        Ordering::Equal => !strict,
        Ordering::Greater => false,
    }, strict, relation);
}

pub(super) fn exclusive_maximum(ctx: &mut KeywordContext<'_, '_>) {
    bound(
        ctx,
        |ordering, _| ordering == Ordering::Less,
        true,
        "greater than or equal to the maximum of",
    );
}

pub(super) fn minimum(ctx: &mut KeywordContext<'_, '_>) {
    let strict = exclusive_flag(ctx, "exclusiveMinimum");
    let relation = if strict {
        "less than or equal to the minimum of"
    } else {
        "less than the minimum of"
    };
    bound(ctx, |ordering, strict| match ordering {
        Ordering::Greater => true,
        Ordering::Equal => !strict,
        Ordering::Less => false,
    }, strict, relation);
}

pub(super) fn exclusive_minimum(ctx: &mut KeywordContext<'_, '_>) {
    bound(
        ctx,
        |ordering, _| ordering == Ordering::Greater,
        true,
        "less than or equal to the minimum of",
    );
}

/// Shared shape of the size keywords: `measure` the value, compare it
/// against the keyword's limit.
fn size(
    ctx: &mut KeywordContext<'_, '_>,
    measure: fn(&Value) -> Option<usize>,
    at_most: bool,
    what: &str,
) {
    let (Some(expected), Some(actual)) = (limit(ctx.data()), measure(ctx.instance())) else {
        return;
    };
    let actual = actual as u64;
    let valid = if at_most { actual <= expected } else { actual >= expected };
    let instance = ctx.instance();
    ctx.conclude(valid, || {
        let relation = if at_most { "more" } else { "fewer" };
        format!(
            "{} has {} than {} {}",
            describe(instance),
            relation,
            expected,
            what
        )
    });
}

fn string_length(value: &Value) -> Option<usize> {
    value.as_str().map(|s| s.chars().count())
}

fn array_length(value: &Value) -> Option<usize> {
    value.as_array().map(Vec::len)
}

fn object_size(value: &Value) -> Option<usize> {
    value.as_object().map(|object| object.len())
}

pub(super) fn max_length(ctx: &mut KeywordContext<'_, '_>) {
    size(ctx, string_length, true, "characters");
}

pub(super) fn min_length(ctx: &mut KeywordContext<'_, '_>) {
    size(ctx, string_length, false, "characters");
}

pub(super) fn max_items(ctx: &mut KeywordContext<'_, '_>) {
    size(ctx, array_length, true, "items");
}

pub(super) fn min_items(ctx: &mut KeywordContext<'_, '_>) {
    size(ctx, array_length, false, "items");
}

pub(super) fn max_properties(ctx: &mut KeywordContext<'_, '_>) {
    size(ctx, object_size, true, "properties");
}

pub(super) fn min_properties(ctx: &mut KeywordContext<'_, '_>) {
    size(ctx, object_size, false, "properties");
}

pub(super) fn pattern(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(pattern), Some(text)) = (ctx.data().as_str(), ctx.instance().as_str()) else {
        return;
    };
    match ctx.regex(pattern) {
        Ok(regex) => match regex.is_match(text) {
            Ok(valid) => {
                ctx.conclude(valid, || format!("\"{}\" does not match \"{}\"", text, pattern));
            }
            Err(err) => ctx.fail(format!("matching \"{}\" failed: {}", pattern, err)),
        },
        Err(err) => ctx.fail(format!("invalid pattern \"{}\": {}", pattern, err)),
    }
}

pub(super) fn unique_items(ctx: &mut KeywordContext<'_, '_>) {
    if ctx.data() != &Value::Bool(true) {
        return;
    }
    let Some(items) = ctx.instance().as_array() else {
        return;
    };
    let duplicate = items
        .iter()
        .enumerate()
        .find_map(|(i, a)| items[i + 1..].iter().any(|b| equal(a, b)).then_some(i));
    let instance = ctx.instance();
    ctx.conclude(duplicate.is_none(), || {
        format!("{} has non-unique elements", describe(instance))
    });
}

/// Number of items `contains` matched, read from its annotation.
fn contains_count(ctx: &KeywordContext<'_, '_>) -> Option<u64> {
    ctx.sibling_annotation("contains")
        .and_then(Value::as_array)
        .map(|matched| matched.len() as u64)
}

pub(super) fn max_contains(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(max), Some(count)) = (limit(ctx.data()), contains_count(ctx)) else {
        return;
    };
    ctx.conclude(count <= max, || {
        format!("{} items match \"contains\", at most {} allowed", count, max)
    });
}

pub(super) fn min_contains(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(min), Some(count)) = (limit(ctx.data()), contains_count(ctx)) else {
        return;
    };
    ctx.conclude(count >= min, || {
        format!("{} items match \"contains\", at least {} required", count, min)
    });
}

fn missing_message(missing: &[&str]) -> String {
    match missing {
        [one] => format!("\"{}\" is a required property", one),
        many => format!(
            "{} are required properties",
            many.iter()
                .map(|name| format!("\"{}\"", name))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

pub(super) fn required(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(names), Some(object)) = (ctx.data().as_array(), ctx.instance().as_object()) else {
        return;
    };
    let missing: Vec<&str> = names
        .iter()
        .filter_map(Value::as_str)
        .filter(|name| !object.contains_key(*name))
        .collect();
    ctx.conclude(missing.is_empty(), || missing_message(&missing));
}

pub(super) fn dependent_required(ctx: &mut KeywordContext<'_, '_>) {
    let (Some(entries), Some(object)) = (ctx.data().as_object(), ctx.instance().as_object()) else {
        return;
    };
    let mut errors = Vec::new();
    for (property, names) in entries {
        if !object.contains_key(property) {
            continue;
        }
        let missing: Vec<&str> = names
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|name| !object.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            errors.push(format!(
                "{} when \"{}\" is present",
                missing_message(&missing),
                property
            ));
        }
    }
    ctx.conclude(errors.is_empty(), || errors.join("; "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_value() {
        assert!(equal(&json!(1), &json!(1.0)));
        assert!(equal(&json!([1, {"a": 2.0}]), &json!([1.0, {"a": 2}])));
        assert!(!equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn integer_type_depends_on_draft() {
        let one = json!(1.0);
        assert!(has_type(&one, "integer", Some(Draft::Draft202012)));
        assert!(has_type(&one, "integer", None));
        assert!(!has_type(&one, "integer", Some(Draft::Draft4)));
        assert!(has_type(&json!(3), "number", Some(Draft::Draft4)));
        assert!(!has_type(&json!(1.5), "integer", None));
    }

    #[test]
    fn limits_accept_integral_floats() {
        assert_eq!(limit(&json!(2)), Some(2));
        assert_eq!(limit(&json!(2.0)), Some(2));
        assert_eq!(limit(&json!(2.5)), None);
        assert_eq!(limit(&json!(-1)), None);
    }
}
