//! Built-in keywords.
//!
//! The built-in set is closed: [`Builtin`] is matched directly by the
//! evaluator. Keywords from outside the crate go through
//! [`crate::CustomKeyword`] instead.

mod annotation;
mod applicator;
mod reference;
mod unevaluated;
mod validation;

use serde_json::Value;

use crate::catalog::KeywordDescriptor;
use crate::evaluator::KeywordContext;
use crate::types::{Draft, Drafts, Vocabulary};

/// Keywords whose annotations name evaluated object properties.
pub(crate) const PROPERTY_ANNOTATIONS: &[&str] = &[
    "properties",
    "patternProperties",
    "additionalProperties",
    "unevaluatedProperties",
];

/// Keywords whose annotations describe evaluated array items.
pub(crate) const ITEM_ANNOTATIONS: &[&str] = &[
    "prefixItems",
    "items",
    "additionalItems",
    "contains",
    "unevaluatedItems",
];

const IN_PLACE_APPLICATORS: &[&str] = &[
    "$ref",
    "$dynamicRef",
    "$recursiveRef",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "if",
    "then",
    "else",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // core
    Ref,
    DynamicRef,
    RecursiveRef,
    Definitions,
    // applicator
    AllOf,
    AnyOf,
    OneOf,
    Not,
    If,
    Then,
    Else,
    DependentSchemas,
    Dependencies,
    PrefixItems,
    Items,
    AdditionalItems,
    Contains,
    Properties,
    PatternProperties,
    AdditionalProperties,
    PropertyNames,
    // unevaluated
    UnevaluatedItems,
    UnevaluatedProperties,
    // validation
    Type,
    Enum,
    Const,
    MultipleOf,
    Maximum,
    ExclusiveMaximum,
    Minimum,
    ExclusiveMinimum,
    MaxLength,
    MinLength,
    Pattern,
    MaxItems,
    MinItems,
    UniqueItems,
    MaxContains,
    MinContains,
    MaxProperties,
    MinProperties,
    Required,
    DependentRequired,
    // format, content, meta-data
    Format,
    /// Annotates only, but its subschema may declare identifiers.
    ContentSchema,
    Annotation,
}

impl Builtin {
    pub(crate) fn validate(self, ctx: &mut KeywordContext<'_, '_>) {
        match self {
            Builtin::Ref => reference::reference(ctx),
            Builtin::DynamicRef => reference::dynamic_reference(ctx),
            Builtin::RecursiveRef => reference::recursive_reference(ctx),
            Builtin::Definitions => {}
            Builtin::AllOf => applicator::all_of(ctx),
            Builtin::AnyOf => applicator::any_of(ctx),
            Builtin::OneOf => applicator::one_of(ctx),
            Builtin::Not => applicator::not(ctx),
            Builtin::If => applicator::if_(ctx),
            Builtin::Then => applicator::then_else(ctx, true),
            Builtin::Else => applicator::then_else(ctx, false),
            Builtin::DependentSchemas => applicator::dependent_schemas(ctx),
            Builtin::Dependencies => applicator::dependencies(ctx),
            Builtin::PrefixItems => applicator::prefix_items(ctx),
            Builtin::Items => applicator::items(ctx),
            Builtin::AdditionalItems => applicator::additional_items(ctx),
            Builtin::Contains => applicator::contains(ctx),
            Builtin::Properties => applicator::properties(ctx),
            Builtin::PatternProperties => applicator::pattern_properties(ctx),
            Builtin::AdditionalProperties => applicator::additional_properties(ctx),
            Builtin::PropertyNames => applicator::property_names(ctx),
            Builtin::UnevaluatedItems => unevaluated::unevaluated_items(ctx),
            Builtin::UnevaluatedProperties => unevaluated::unevaluated_properties(ctx),
            Builtin::Type => validation::type_(ctx),
            Builtin::Enum => validation::enum_(ctx),
            Builtin::Const => validation::const_(ctx),
            Builtin::MultipleOf => validation::multiple_of(ctx),
            Builtin::Maximum => validation::maximum(ctx),
            Builtin::ExclusiveMaximum => validation::exclusive_maximum(ctx),
            Builtin::Minimum => validation::minimum(ctx),
            Builtin::ExclusiveMinimum => validation::exclusive_minimum(ctx),
            Builtin::MaxLength => validation::max_length(ctx),
            Builtin::MinLength => validation::min_length(ctx),
            Builtin::Pattern => validation::pattern(ctx),
            Builtin::MaxItems => validation::max_items(ctx),
            Builtin::MinItems => validation::min_items(ctx),
            Builtin::UniqueItems => validation::unique_items(ctx),
            Builtin::MaxContains => validation::max_contains(ctx),
            Builtin::MinContains => validation::min_contains(ctx),
            Builtin::MaxProperties => validation::max_properties(ctx),
            Builtin::MinProperties => validation::min_properties(ctx),
            Builtin::Required => validation::required(ctx),
            Builtin::DependentRequired => validation::dependent_required(ctx),
            Builtin::Format => annotation::format(ctx),
            Builtin::ContentSchema | Builtin::Annotation => annotation::annotate(ctx),
        }
    }

    pub(crate) fn subschemas(self, data: &Value) -> Vec<(Option<String>, &Value)> {
        match self {
            Builtin::Not
            | Builtin::If
            | Builtin::Then
            | Builtin::Else
            | Builtin::AdditionalItems
            | Builtin::Contains
            | Builtin::AdditionalProperties
            | Builtin::PropertyNames
            | Builtin::ContentSchema
            | Builtin::UnevaluatedItems
            | Builtin::UnevaluatedProperties => single(data),
            Builtin::AllOf | Builtin::AnyOf | Builtin::OneOf | Builtin::PrefixItems => {
                indexed(data)
            }
            Builtin::Items => match data {
                Value::Array(_) => indexed(data),
                _ => single(data),
            },
            Builtin::Definitions
            | Builtin::DependentSchemas
            | Builtin::Dependencies
            | Builtin::Properties
            | Builtin::PatternProperties => keyed(data),
            _ => Vec::new(),
        }
    }
}

/// A value as it appears in error messages; long strings are shortened.
pub(crate) fn describe(value: &Value) -> String {
    const LIMIT: usize = 40;
    match value {
        Value::String(s) if s.chars().count() > LIMIT => {
            let head: String = s.chars().take(LIMIT).collect();
            format!("\"{}...\"", head)
        }
        other => other.to_string(),
    }
}

fn is_schema(value: &Value) -> bool {
    value.is_object() || value.is_boolean()
}

fn single(data: &Value) -> Vec<(Option<String>, &Value)> {
    if is_schema(data) {
        vec![(None, data)]
    } else {
        Vec::new()
    }
}

fn indexed(data: &Value) -> Vec<(Option<String>, &Value)> {
    data.as_array()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter(|(_, item)| is_schema(item))
                .map(|(index, item)| (Some(index.to_string()), item))
                .collect()
        })
        .unwrap_or_default()
}

fn keyed(data: &Value) -> Vec<(Option<String>, &Value)> {
    data.as_object()
        .map(|map| {
            map.iter()
                .filter(|(_, value)| is_schema(value))
                .map(|(key, value)| (Some(key.clone()), value))
                .collect()
        })
        .unwrap_or_default()
}

/// The built-in keyword table, in declaration order.
pub(crate) fn builtin_descriptors() -> Vec<KeywordDescriptor> {
    use Builtin as B;
    use Vocabulary as V;

    let all = Drafts::ALL;
    let since6 = Drafts::since(Draft::Draft6);
    let since7 = Drafts::since(Draft::Draft7);
    let since2019 = Drafts::since(Draft::Draft201909);
    let until7 = Drafts::until(Draft::Draft7);
    let until2019 = Drafts::until(Draft::Draft201909);
    let d = KeywordDescriptor::builtin;

    let unevaluated_items_inputs: Vec<&str> = IN_PLACE_APPLICATORS
        .iter()
        .chain(&["prefixItems", "items", "additionalItems", "contains"])
        .copied()
        .collect();
    let unevaluated_properties_inputs: Vec<&str> = IN_PLACE_APPLICATORS
        .iter()
        .chain(&[
            "properties",
            "patternProperties",
            "additionalProperties",
            "dependentSchemas",
            "dependencies",
        ])
        .copied()
        .collect();

    vec![
        d("$ref", B::Ref, all, V::Core),
        d("$dynamicRef", B::DynamicRef, Drafts::only(Draft::Draft202012), V::Core),
        d("$recursiveRef", B::RecursiveRef, Drafts::only(Draft::Draft201909), V::Core),
        d("$defs", B::Definitions, since2019, V::Core),
        d("definitions", B::Definitions, until7, V::Core),
        d("type", B::Type, all, V::Validation).priority(10),
        d("enum", B::Enum, all, V::Validation),
        d("const", B::Const, since6, V::Validation),
        d("allOf", B::AllOf, all, V::Applicator),
        d("anyOf", B::AnyOf, all, V::Applicator),
        d("oneOf", B::OneOf, all, V::Applicator),
        d("not", B::Not, all, V::Applicator),
        d("if", B::If, since7, V::Applicator),
        d("then", B::Then, since7, V::Applicator).depends_on(&["if"]),
        d("else", B::Else, since7, V::Applicator).depends_on(&["if"]),
        d("dependentSchemas", B::DependentSchemas, since2019, V::Applicator),
        d("dependencies", B::Dependencies, until7, V::Applicator),
        d("prefixItems", B::PrefixItems, Drafts::only(Draft::Draft202012), V::Applicator),
        d("items", B::Items, all, V::Applicator).depends_on(&["prefixItems"]),
        d("additionalItems", B::AdditionalItems, until2019, V::Applicator).depends_on(&["items"]),
        d("contains", B::Contains, since6, V::Applicator),
        d("properties", B::Properties, all, V::Applicator),
        d("patternProperties", B::PatternProperties, all, V::Applicator),
        d("additionalProperties", B::AdditionalProperties, all, V::Applicator)
            .depends_on(&["properties", "patternProperties"]),
        d("propertyNames", B::PropertyNames, since6, V::Applicator),
        d("multipleOf", B::MultipleOf, all, V::Validation),
        d("maximum", B::Maximum, all, V::Validation),
        d("exclusiveMaximum", B::ExclusiveMaximum, all, V::Validation),
        d("minimum", B::Minimum, all, V::Validation),
        d("exclusiveMinimum", B::ExclusiveMinimum, all, V::Validation),
        d("maxLength", B::MaxLength, all, V::Validation),
        d("minLength", B::MinLength, all, V::Validation),
        d("pattern", B::Pattern, all, V::Validation),
        d("maxItems", B::MaxItems, all, V::Validation),
        d("minItems", B::MinItems, all, V::Validation),
        d("uniqueItems", B::UniqueItems, all, V::Validation),
        d("maxContains", B::MaxContains, since2019, V::Validation).depends_on(&["contains"]),
        d("minContains", B::MinContains, since2019, V::Validation).depends_on(&["contains"]),
        d("maxProperties", B::MaxProperties, all, V::Validation),
        d("minProperties", B::MinProperties, all, V::Validation),
        d("required", B::Required, all, V::Validation),
        d("dependentRequired", B::DependentRequired, since2019, V::Validation),
        d("format", B::Format, all, V::FormatAnnotation),
        d("contentEncoding", B::Annotation, since7, V::Content),
        d("contentMediaType", B::Annotation, since7, V::Content),
        d("contentSchema", B::ContentSchema, since2019, V::Content).depends_on(&["contentMediaType"]),
        d("title", B::Annotation, all, V::MetaData),
        d("description", B::Annotation, all, V::MetaData),
        d("default", B::Annotation, all, V::MetaData),
        d("deprecated", B::Annotation, since2019, V::MetaData),
        d("readOnly", B::Annotation, since7, V::MetaData),
        d("writeOnly", B::Annotation, since7, V::MetaData),
        d("examples", B::Annotation, since6, V::MetaData),
        d("unevaluatedItems", B::UnevaluatedItems, since2019, V::Unevaluated)
            .priority(-100)
            .depends_on(&unevaluated_items_inputs),
        d("unevaluatedProperties", B::UnevaluatedProperties, since2019, V::Unevaluated)
            .priority(-100)
            .depends_on(&unevaluated_properties_inputs),
    ]
}
