//! Keyword metadata and dependency-ordered keyword selection.
//!
//! Every keyword the evaluator knows is described by a [`KeywordDescriptor`]:
//! its name, the drafts and vocabulary it belongs to, a numeric priority, and
//! the keywords whose annotations it consumes. The [`KeywordCatalog`] checks
//! the table once, computes a global evaluation order, and answers "which
//! keywords of this schema object run, and in what order".

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::CatalogError;
use crate::evaluator::KeywordContext;
use crate::keywords::{self, Builtin};
use crate::types::{Dialect, Draft, Drafts, Vocabulary};

/// A keyword supplied from outside the built-in catalog.
pub trait CustomKeyword: Send + Sync {
    /// Judge the current value. Implementations set validity, an error
    /// message and/or an annotation on `ctx`, and may descend into
    /// subschemas with [`KeywordContext::descend`].
    fn validate(&self, ctx: &mut KeywordContext<'_, '_>);

    /// Subschemas carried by the keyword's data, keyed by the pointer token
    /// below the keyword (`None` when the data itself is the subschema).
    ///
    /// Registration walks these to find nested identifiers and anchors.
    fn subschemas<'s>(&self, _data: &'s Value) -> Vec<(Option<String>, &'s Value)> {
        Vec::new()
    }
}

/// How a keyword is evaluated.
#[derive(Clone)]
pub enum KeywordKind {
    Builtin(Builtin),
    Custom(Arc<dyn CustomKeyword>),
}

impl fmt::Debug for KeywordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordKind::Builtin(builtin) => f.debug_tuple("Builtin").field(builtin).finish(),
            KeywordKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Static metadata for one keyword.
#[derive(Debug, Clone)]
pub struct KeywordDescriptor {
    name: String,
    kind: KeywordKind,
    drafts: Drafts,
    vocabulary: Option<Vocabulary>,
    priority: i32,
    depends_on: Vec<String>,
}

impl KeywordDescriptor {
    pub(crate) fn builtin(
        name: &str,
        builtin: Builtin,
        drafts: Drafts,
        vocabulary: Vocabulary,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: KeywordKind::Builtin(builtin),
            drafts,
            vocabulary: Some(vocabulary),
            priority: 0,
            depends_on: Vec::new(),
        }
    }

    /// Describe a custom keyword. It applies to every draft, belongs to no
    /// vocabulary and has priority zero until configured otherwise.
    pub fn custom(name: impl Into<String>, keyword: impl CustomKeyword + 'static) -> Self {
        Self {
            name: name.into(),
            kind: KeywordKind::Custom(Arc::new(keyword)),
            drafts: Drafts::ALL,
            vocabulary: None,
            priority: 0,
            depends_on: Vec::new(),
        }
    }

    pub fn drafts(mut self, drafts: Drafts) -> Self {
        self.drafts = drafts;
        self
    }

    pub fn vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Higher priorities run earlier, subject to dependencies.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Keywords whose annotations this keyword reads. They always run first.
    pub fn depends_on(mut self, keywords: &[&str]) -> Self {
        self.depends_on
            .extend(keywords.iter().map(|name| name.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &KeywordKind {
        &self.kind
    }

    pub fn declared_drafts(&self) -> Drafts {
        self.drafts
    }

    pub fn declared_vocabulary(&self) -> Option<Vocabulary> {
        self.vocabulary
    }

    pub fn declared_priority(&self) -> i32 {
        self.priority
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    /// Whether this keyword is active under `dialect`.
    pub fn applies(&self, dialect: &Dialect) -> bool {
        self.drafts.applies_to(dialect.draft)
            && self
                .vocabulary
                .map_or(true, |vocabulary| dialect.vocabularies.contains(vocabulary))
    }

    pub(crate) fn validate(&self, ctx: &mut KeywordContext<'_, '_>) {
        match &self.kind {
            KeywordKind::Builtin(builtin) => builtin.validate(ctx),
            KeywordKind::Custom(keyword) => keyword.validate(ctx),
        }
    }

    /// Subschemas held by `data` when it is this keyword's value.
    pub fn subschemas<'s>(&self, data: &'s Value) -> Vec<(Option<String>, &'s Value)> {
        match &self.kind {
            KeywordKind::Builtin(builtin) => builtin.subschemas(data),
            KeywordKind::Custom(keyword) => keyword.subschemas(data),
        }
    }
}

/// Collects descriptors before the catalog is checked and ordered.
#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    descriptors: Vec<KeywordDescriptor>,
}

impl CatalogBuilder {
    /// An empty builder with no keywords at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A builder pre-loaded with the built-in keywords.
    pub fn with_builtins() -> Self {
        Self {
            descriptors: keywords::builtin_descriptors(),
        }
    }

    pub fn keyword(mut self, descriptor: KeywordDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Check the table and fix the global evaluation order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for empty or duplicate names, dependencies on
    /// unknown keywords, and dependency cycles.
    pub fn build(self) -> Result<KeywordCatalog, CatalogError> {
        KeywordCatalog::new(self.descriptors)
    }
}

/// A checked, ordered keyword table.
#[derive(Debug, Clone)]
pub struct KeywordCatalog {
    descriptors: Vec<KeywordDescriptor>,
    by_name: HashMap<String, usize>,
    /// Position of each descriptor in the global evaluation order.
    rank: Vec<usize>,
}

impl KeywordCatalog {
    /// The built-in keywords.
    pub fn builtin() -> Result<Self, CatalogError> {
        CatalogBuilder::with_builtins().build()
    }

    /// A builder starting from the built-in keywords.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::with_builtins()
    }

    fn new(descriptors: Vec<KeywordDescriptor>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::with_capacity(descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.name.is_empty() {
                return Err(CatalogError::EmptyName);
            }
            if by_name.insert(descriptor.name.clone(), index).is_some() {
                return Err(CatalogError::DuplicateKeyword {
                    name: descriptor.name.clone(),
                });
            }
        }

        let order = evaluation_order(&descriptors, &by_name)?;
        let mut rank = vec![0; descriptors.len()];
        for (position, index) in order.into_iter().enumerate() {
            rank[index] = position;
        }
        tracing::debug!(keywords = descriptors.len(), "keyword catalog built");

        Ok(Self {
            descriptors,
            by_name,
            rank,
        })
    }

    pub fn get(&self, name: &str) -> Option<&KeywordDescriptor> {
        self.by_name.get(name).map(|&index| &self.descriptors[index])
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// All descriptors in global evaluation order.
    pub fn ordered(&self) -> Vec<&KeywordDescriptor> {
        let mut indices: Vec<usize> = (0..self.descriptors.len()).collect();
        indices.sort_by_key(|&index| self.rank[index]);
        indices
            .into_iter()
            .map(|index| &self.descriptors[index])
            .collect()
    }

    /// The keywords of `schema` that apply under `dialect`, in evaluation
    /// order.
    pub fn applicable(&self, schema: &Map<String, Value>, dialect: &Dialect) -> Vec<&KeywordDescriptor> {
        self.plan(schema, dialect)
            .into_iter()
            .map(|index| &self.descriptors[index])
            .collect()
    }

    pub(crate) fn descriptor(&self, index: usize) -> &KeywordDescriptor {
        &self.descriptors[index]
    }

    /// Indices of the applicable descriptors, sorted by rank.
    pub(crate) fn plan(&self, schema: &Map<String, Value>, dialect: &Dialect) -> Vec<usize> {
        // Up to draft 7, `$ref` hides its siblings.
        if dialect.is_at_most(Draft::Draft7) && schema.contains_key("$ref") {
            return self
                .by_name
                .get("$ref")
                .copied()
                .filter(|&index| self.descriptors[index].applies(dialect))
                .into_iter()
                .collect();
        }

        let mut plan: Vec<usize> = schema
            .keys()
            .filter_map(|name| self.by_name.get(name).copied())
            .filter(|&index| self.descriptors[index].applies(dialect))
            .collect();
        plan.sort_by_key(|&index| self.rank[index]);
        plan
    }
}

/// Kahn's algorithm over "depends on" edges. Among keywords whose
/// dependencies have all been placed, the highest priority goes first, then
/// the earliest declared.
fn evaluation_order(
    descriptors: &[KeywordDescriptor],
    by_name: &HashMap<String, usize>,
) -> Result<Vec<usize>, CatalogError> {
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); descriptors.len()];
    let mut pending = vec![0usize; descriptors.len()];

    for (index, descriptor) in descriptors.iter().enumerate() {
        for dependency in &descriptor.depends_on {
            let Some(&target) = by_name.get(dependency) else {
                return Err(CatalogError::UnknownDependency {
                    keyword: descriptor.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            dependents[target].push(index);
            pending[index] += 1;
        }
    }

    let mut ready: BinaryHeap<(i32, Reverse<usize>)> = pending
        .iter()
        .enumerate()
        .filter(|(_, &count)| count == 0)
        .map(|(index, _)| (descriptors[index].priority, Reverse(index)))
        .collect();

    let mut order = Vec::with_capacity(descriptors.len());
    while let Some((_, Reverse(index))) = ready.pop() {
        order.push(index);
        for &dependent in &dependents[index] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.push((descriptors[dependent].priority, Reverse(dependent)));
            }
        }
    }

    if order.len() < descriptors.len() {
        return Err(CatalogError::DependencyCycle {
            keywords: find_cycle(descriptors, by_name, &pending),
        });
    }
    Ok(order)
}

/// Every keyword left unplaced waits on another unplaced keyword, so
/// following unplaced dependencies from any of them must revisit a keyword.
fn find_cycle(
    descriptors: &[KeywordDescriptor],
    by_name: &HashMap<String, usize>,
    pending: &[usize],
) -> Vec<String> {
    let Some(start) = pending.iter().position(|&count| count > 0) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    loop {
        let next = descriptors[current]
            .depends_on
            .iter()
            .filter_map(|name| by_name.get(name).copied())
            .find(|&index| pending[index] > 0);
        let Some(next) = next else {
            break;
        };
        if let Some(position) = path.iter().position(|&index| index == next) {
            let mut cycle: Vec<String> = path[position..]
                .iter()
                .map(|&index| descriptors[index].name.clone())
                .collect();
            cycle.push(descriptors[next].name.clone());
            return cycle;
        }
        path.push(next);
        current = next;
    }
    path.into_iter()
        .map(|index| descriptors[index].name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VocabularySet;
    use serde_json::json;

    struct Noop;

    impl CustomKeyword for Noop {
        fn validate(&self, _ctx: &mut KeywordContext<'_, '_>) {}
    }

    fn names(descriptors: Vec<&KeywordDescriptor>) -> Vec<&str> {
        descriptors.into_iter().map(|d| d.name()).collect()
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn builtin_catalog_is_consistent() {
        let catalog = KeywordCatalog::builtin().unwrap();
        assert!(catalog.get("$ref").is_some());
        assert!(catalog.get("unevaluatedProperties").is_some());
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn dependencies_run_first() {
        let catalog = KeywordCatalog::builtin().unwrap();
        let schema = object(json!({
            "additionalProperties": false,
            "unevaluatedProperties": false,
            "properties": {},
            "patternProperties": {},
            "allOf": []
        }));
        let order = names(catalog.applicable(&schema, &Dialect::default()));
        let position = |name| order.iter().position(|n| *n == name).unwrap();
        assert!(position("properties") < position("additionalProperties"));
        assert!(position("patternProperties") < position("additionalProperties"));
        assert!(position("allOf") < position("unevaluatedProperties"));
        assert_eq!(*order.last().unwrap(), "unevaluatedProperties");
    }

    #[test]
    fn then_and_else_follow_if() {
        let catalog = KeywordCatalog::builtin().unwrap();
        let schema = object(json!({ "else": true, "then": true, "if": true }));
        assert_eq!(
            names(catalog.applicable(&schema, &Dialect::default())),
            ["if", "then", "else"]
        );
    }

    #[test]
    fn priority_then_declaration_order() {
        let catalog = CatalogBuilder::empty()
            .keyword(KeywordDescriptor::custom("low", Noop))
            .keyword(KeywordDescriptor::custom("high", Noop).priority(10))
            .keyword(KeywordDescriptor::custom("also-low", Noop))
            .build()
            .unwrap();
        assert_eq!(names(catalog.ordered()), ["high", "low", "also-low"]);
    }

    #[test]
    fn dependency_beats_priority() {
        let catalog = CatalogBuilder::empty()
            .keyword(KeywordDescriptor::custom("producer", Noop))
            .keyword(
                KeywordDescriptor::custom("consumer", Noop)
                    .priority(100)
                    .depends_on(&["producer"]),
            )
            .build()
            .unwrap();
        assert_eq!(names(catalog.ordered()), ["producer", "consumer"]);
    }

    #[test]
    fn cycle_is_a_configuration_error() {
        let err = CatalogBuilder::empty()
            .keyword(KeywordDescriptor::custom("a", Noop).depends_on(&["b"]))
            .keyword(KeywordDescriptor::custom("b", Noop).depends_on(&["a"]))
            .build()
            .unwrap_err();
        match err {
            CatalogError::DependencyCycle { keywords } => {
                assert_eq!(keywords.first(), keywords.last());
                assert!(keywords.contains(&"a".to_string()));
                assert!(keywords.contains(&"b".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_and_duplicates_are_rejected() {
        let err = CatalogBuilder::empty()
            .keyword(KeywordDescriptor::custom("a", Noop).depends_on(&["missing"]))
            .build()
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownDependency { .. }));

        let err = KeywordCatalog::builder()
            .keyword(KeywordDescriptor::custom("minLength", Noop))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateKeyword {
                name: "minLength".into()
            }
        );

        let err = CatalogBuilder::empty()
            .keyword(KeywordDescriptor::custom("", Noop))
            .build()
            .unwrap_err();
        assert_eq!(err, CatalogError::EmptyName);
    }

    #[test]
    fn draft_filtering() {
        let catalog = KeywordCatalog::builtin().unwrap();
        let schema = object(json!({ "prefixItems": [], "additionalItems": true, "items": true }));

        let draft7 = Dialect::new(Some(Draft::Draft7), VocabularySet::standard());
        assert_eq!(names(catalog.applicable(&schema, &draft7)), ["items", "additionalItems"]);

        let draft2020 = Dialect::new(Some(Draft::Draft202012), VocabularySet::standard());
        assert_eq!(names(catalog.applicable(&schema, &draft2020)), ["prefixItems", "items"]);
    }

    #[test]
    fn ref_hides_siblings_up_to_draft7() {
        let catalog = KeywordCatalog::builtin().unwrap();
        let schema = object(json!({ "$ref": "#", "type": "string" }));

        let draft7 = Dialect::new(Some(Draft::Draft7), VocabularySet::standard());
        assert_eq!(names(catalog.applicable(&schema, &draft7)), ["$ref"]);

        let modern = Dialect::new(Some(Draft::Draft202012), VocabularySet::standard());
        assert_eq!(catalog.applicable(&schema, &modern).len(), 2);
    }

    #[test]
    fn vocabulary_filtering() {
        let catalog = KeywordCatalog::builtin().unwrap();
        let schema = object(json!({ "minLength": 1, "allOf": [] }));
        let applicator_only = Dialect::new(
            Some(Draft::Draft202012),
            VocabularySet::empty()
                .with(Vocabulary::Core)
                .with(Vocabulary::Applicator),
        );
        assert_eq!(names(catalog.applicable(&schema, &applicator_only)), ["allOf"]);
    }
}
