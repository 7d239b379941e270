//! Schema identity and reference resolution.
//!
//! Registration is a build phase: [`SchemaRegistryBuilder::register`] walks a
//! schema document once, assigning base URIs (`$id`, or `id` in draft 4) and
//! collecting anchors and dynamic anchors. [`SchemaRegistryBuilder::seal`]
//! freezes everything into a [`SealedRegistry`], the read-only handle the
//! evaluator resolves references through. A sealed registry can be shared
//! across threads; its only mutable state is a memo of resolved references.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use url::Url;

use crate::catalog::KeywordCatalog;
use crate::error::ResolveError;
use crate::pointer::{percent_decode, JsonPointer};
use crate::scope::DynamicScope;
use crate::types::{Dialect, Draft, Vocabulary, VocabularySet};

/// A place inside a registered document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Location {
    document: Url,
    pointer: JsonPointer,
}

#[derive(Debug, Clone)]
struct Resource {
    location: Location,
    draft: Option<Draft>,
    meta_schema: Option<Url>,
}

/// A subschema found by resolution, with the resource it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema<'r> {
    pub value: &'r Value,
    /// Base URI of the innermost resource containing `value`.
    pub base: Url,
    /// Location of `value` inside that resource.
    pub pointer: JsonPointer,
}

/// The `$id` of a schema object, if it introduces a new resource.
///
/// Draft 4 spells it `id`. Fragment-only ids are anchors (drafts 6/7) or
/// invalid, and up to draft 7 an id next to `$ref` is ignored.
pub(crate) fn schema_id<'v>(schema: &'v Value, dialect: &Dialect) -> Option<&'v str> {
    id_for(schema, dialect.draft)
}

fn id_for(schema: &Value, draft: Option<Draft>) -> Option<&str> {
    let map = schema.as_object()?;
    if matches!(draft, Some(d) if d <= Draft::Draft7) && map.contains_key("$ref") {
        return None;
    }
    let key = if draft == Some(Draft::Draft4) { "id" } else { "$id" };
    let id = map.get(key)?.as_str()?;
    if id.starts_with('#') {
        return None;
    }
    Some(id)
}

/// Anchors declared by a schema object: `(name, dynamic)`.
///
/// `$dynamicAnchor` is also a plain anchor. `$recursiveAnchor: true` is a
/// dynamic anchor with the empty name.
fn anchors_for(schema: &Value, draft: Option<Draft>) -> Vec<(String, bool)> {
    let Some(map) = schema.as_object() else {
        return Vec::new();
    };
    let mut anchors = Vec::new();
    let modern = draft.map_or(true, |d| d >= Draft::Draft201909);

    if modern {
        if let Some(name) = map.get("$anchor").and_then(Value::as_str) {
            anchors.push((name.to_string(), false));
        }
    }
    if draft.map_or(true, |d| d == Draft::Draft202012) {
        if let Some(name) = map.get("$dynamicAnchor").and_then(Value::as_str) {
            anchors.push((name.to_string(), true));
        }
    }
    if draft.map_or(true, |d| d == Draft::Draft201909)
        && map.get("$recursiveAnchor").and_then(Value::as_bool) == Some(true)
    {
        anchors.push((String::new(), true));
    }
    if draft.map_or(true, |d| d <= Draft::Draft7) {
        let key = if draft == Some(Draft::Draft4) { "id" } else { "$id" };
        if let Some(name) = map
            .get(key)
            .and_then(Value::as_str)
            .and_then(|id| id.strip_prefix('#'))
            .filter(|name| !name.is_empty())
        {
            anchors.push((name.to_string(), false));
        }
    }
    anchors
}

fn without_fragment(mut uri: Url) -> Url {
    uri.set_fragment(None);
    uri
}

/// Everything one `register` call found, committed only if the walk
/// succeeds.
#[derive(Default)]
struct Staged {
    resources: HashMap<Url, Resource>,
    resource_at: HashMap<Location, Url>,
    anchors: HashMap<(Url, String), Location>,
    dynamic_anchors: HashMap<(Url, String), Location>,
    references: Vec<Url>,
}

impl Staged {
    fn add_resource(
        &mut self,
        existing: &HashMap<Url, Resource>,
        uri: Url,
        resource: Resource,
    ) -> Result<(), ResolveError> {
        let clash = existing.contains_key(&uri)
            || self
                .resources
                .get(&uri)
                .map_or(false, |staged| staged.location != resource.location);
        if clash {
            return Err(ResolveError::DuplicateResource {
                uri: uri.to_string(),
            });
        }
        self.resource_at
            .insert(resource.location.clone(), uri.clone());
        self.resources.insert(uri, resource);
        Ok(())
    }

    fn add_anchor(
        &mut self,
        builder: &SchemaRegistryBuilder,
        base: &Url,
        name: String,
        location: &Location,
        dynamic: bool,
    ) -> Result<(), ResolveError> {
        let key = (base.clone(), name);
        let duplicate = |committed: &HashMap<(Url, String), Location>,
                         staged: &HashMap<(Url, String), Location>| {
            committed
                .get(&key)
                .or_else(|| staged.get(&key))
                .map_or(false, |found| found != location)
        };

        let plain = !key.1.is_empty();
        if (plain && duplicate(&builder.anchors, &self.anchors))
            || (dynamic && duplicate(&builder.dynamic_anchors, &self.dynamic_anchors))
        {
            return Err(ResolveError::DuplicateAnchor {
                base: base.to_string(),
                anchor: key.1,
            });
        }
        if plain {
            self.anchors.insert(key.clone(), location.clone());
        }
        if dynamic {
            self.dynamic_anchors.insert(key, location.clone());
        }
        Ok(())
    }
}

/// Mutable registry used while schemas are being added.
#[derive(Debug)]
pub struct SchemaRegistryBuilder {
    catalog: Arc<KeywordCatalog>,
    draft: Option<Draft>,
    documents: HashMap<Url, Arc<Value>>,
    resources: HashMap<Url, Resource>,
    resource_at: HashMap<Location, Url>,
    anchors: HashMap<(Url, String), Location>,
    dynamic_anchors: HashMap<(Url, String), Location>,
    references: Vec<Url>,
    failures: HashMap<Url, String>,
}

impl SchemaRegistryBuilder {
    /// The catalog tells registration which keywords hold subschemas.
    pub fn new(catalog: Arc<KeywordCatalog>) -> Self {
        Self {
            catalog,
            draft: None,
            documents: HashMap::new(),
            resources: HashMap::new(),
            resource_at: HashMap::new(),
            anchors: HashMap::new(),
            dynamic_anchors: HashMap::new(),
            references: Vec::new(),
            failures: HashMap::new(),
        }
    }

    /// Evaluate every resource under `draft` instead of its `$schema`.
    pub fn draft(mut self, draft: Option<Draft>) -> Self {
        self.draft = draft;
        self
    }

    /// Register a schema document under `base_uri`.
    ///
    /// Returns the canonical URI of the document's root resource (its `$id`
    /// when it has one).
    ///
    /// # Errors
    ///
    /// `DuplicateResource` if a resource URI is already taken,
    /// `DuplicateAnchor` if an anchor name appears at two locations within
    /// one resource, `InvalidReference` for an unparsable `$id`. On error
    /// nothing from this document is kept.
    pub fn register(&mut self, schema: Value, base_uri: &Url) -> Result<Url, ResolveError> {
        let document = without_fragment(base_uri.clone());
        if self.documents.contains_key(&document) || self.resources.contains_key(&document) {
            return Err(ResolveError::DuplicateResource {
                uri: document.to_string(),
            });
        }

        let mut staged = Staged::default();
        let root = Location {
            document: document.clone(),
            pointer: JsonPointer::root(),
        };
        let (draft, meta_schema) = self.dialect_hints(&schema, None);
        staged.add_resource(
            &self.resources,
            document.clone(),
            Resource {
                location: root.clone(),
                draft,
                meta_schema,
            },
        )?;
        self.walk(&schema, root, &document, None, &mut staged)?;

        let canonical = staged
            .resource_at
            .get(&Location {
                document: document.clone(),
                pointer: JsonPointer::root(),
            })
            .cloned()
            .unwrap_or_else(|| document.clone());

        tracing::debug!(
            document = %document,
            resources = staged.resources.len(),
            anchors = staged.anchors.len(),
            dynamic_anchors = staged.dynamic_anchors.len(),
            "registered schema document"
        );
        self.documents.insert(document.clone(), Arc::new(schema));
        self.resources.extend(staged.resources);
        self.resource_at.extend(staged.resource_at);
        self.anchors.extend(staged.anchors);
        self.dynamic_anchors.extend(staged.dynamic_anchors);
        self.references.extend(staged.references);
        self.failures.remove(&document);
        Ok(canonical)
    }

    /// Whether a resource with this URI (fragment ignored) is registered.
    pub fn contains(&self, uri: &Url) -> bool {
        self.resources.contains_key(&without_fragment(uri.clone()))
    }

    /// Documents referenced by registered schemas that are neither
    /// registered nor known to have failed retrieval.
    pub fn missing(&self) -> Vec<Url> {
        let mut missing: Vec<Url> = Vec::new();
        for uri in &self.references {
            if !self.resources.contains_key(uri)
                && !self.failures.contains_key(uri)
                && !missing.contains(uri)
            {
                missing.push(uri.clone());
            }
        }
        missing
    }

    /// Remember that `uri` could not be retrieved. References to it resolve
    /// to `ResolveError::Retrieval` carrying `message`.
    pub fn record_failure(&mut self, uri: Url, message: impl Into<String>) {
        self.failures
            .insert(without_fragment(uri), message.into());
    }

    /// Freeze the registry.
    pub fn seal(self) -> SealedRegistry {
        let dialects: HashMap<Url, Dialect> = self
            .resources
            .iter()
            .map(|(uri, resource)| (uri.clone(), self.dialect_of(resource)))
            .collect();
        tracing::debug!(
            documents = self.documents.len(),
            resources = self.resources.len(),
            anchors = self.anchors.len(),
            dynamic_anchors = self.dynamic_anchors.len(),
            failures = self.failures.len(),
            "registry sealed"
        );
        SealedRegistry {
            default_dialect: Dialect::new(self.draft, VocabularySet::standard()),
            documents: self.documents,
            resources: self
                .resources
                .into_iter()
                .map(|(uri, resource)| (uri, resource.location))
                .collect(),
            dialects,
            resource_at: self.resource_at,
            anchors: self.anchors,
            dynamic_anchors: self.dynamic_anchors,
            failures: self.failures,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Draft and meta-schema declared by a schema object's `$schema`.
    fn dialect_hints(&self, schema: &Value, inherited: Option<Draft>) -> (Option<Draft>, Option<Url>) {
        let declared = schema.get("$schema").and_then(Value::as_str);
        let draft = match (self.draft, declared) {
            (Some(forced), _) => Some(forced),
            (None, Some(uri)) => Draft::from_meta_schema_uri(uri).or(inherited),
            (None, None) => inherited,
        };
        let meta_schema = declared
            .and_then(|uri| Url::parse(uri).ok())
            .map(without_fragment);
        (draft, meta_schema)
    }

    fn walk(
        &self,
        schema: &Value,
        location: Location,
        base: &Url,
        inherited: Option<Draft>,
        staged: &mut Staged,
    ) -> Result<(), ResolveError> {
        let Some(map) = schema.as_object() else {
            return Ok(());
        };
        let (draft, meta_schema) = self.dialect_hints(schema, inherited);

        let mut base = base.clone();
        if let Some(id) = id_for(schema, draft) {
            let resource = base
                .join(id)
                .map(without_fragment)
                .map_err(|e| ResolveError::InvalidReference {
                    base: base.to_string(),
                    reference: id.to_string(),
                    message: e.to_string(),
                })?;
            if resource != base || !location.pointer.is_empty() {
                staged.add_resource(
                    &self.resources,
                    resource.clone(),
                    Resource {
                        location: location.clone(),
                        draft,
                        meta_schema: meta_schema.clone(),
                    },
                )?;
            } else {
                staged.resource_at.insert(location.clone(), resource.clone());
            }
            base = resource;
        }

        if let Some(meta) = &meta_schema {
            if Draft::from_meta_schema_uri(meta.as_str()).is_none() {
                staged.references.push(meta.clone());
            }
        }

        for (name, dynamic) in anchors_for(schema, draft) {
            staged.add_anchor(self, &base, name, &location, dynamic)?;
        }

        for keyword in ["$ref", "$dynamicRef", "$recursiveRef"] {
            if let Some(reference) = map.get(keyword).and_then(Value::as_str) {
                if let Ok(target) = base.join(reference) {
                    staged.references.push(without_fragment(target));
                }
            }
        }

        for (keyword, data) in map {
            let Some(descriptor) = self.catalog.get(keyword) else {
                continue;
            };
            for (token, subschema) in descriptor.subschemas(data) {
                let mut pointer = location.pointer.join(keyword.as_str());
                if let Some(token) = token {
                    pointer.push(token);
                }
                let child = Location {
                    document: location.document.clone(),
                    pointer,
                };
                self.walk(subschema, child, &base, draft, staged)?;
            }
        }
        Ok(())
    }

    fn dialect_of(&self, resource: &Resource) -> Dialect {
        let draft = self.draft.or(resource.draft);
        let vocabularies = match (&resource.meta_schema, draft) {
            (Some(meta), draft) if draft.map_or(true, |d| d >= Draft::Draft201909) => self
                .declared_vocabularies(meta)
                .unwrap_or_else(VocabularySet::standard),
            _ => VocabularySet::standard(),
        };
        Dialect::new(draft, vocabularies)
    }

    /// Vocabularies a registered meta-schema enables through `$vocabulary`.
    fn declared_vocabularies(&self, meta_schema: &Url) -> Option<VocabularySet> {
        let resource = self.resources.get(meta_schema)?;
        let document = self.documents.get(&resource.location.document)?;
        let root = resource.location.pointer.navigate(document)?;
        let declared = root.get("$vocabulary")?.as_object()?;
        Some(
            declared
                .keys()
                .filter_map(|uri| Vocabulary::from_uri(uri))
                .fold(VocabularySet::empty().with(Vocabulary::Core), VocabularySet::union),
        )
    }
}

/// Frozen registry shared by all evaluations.
#[derive(Debug)]
pub struct SealedRegistry {
    default_dialect: Dialect,
    documents: HashMap<Url, Arc<Value>>,
    resources: HashMap<Url, Location>,
    dialects: HashMap<Url, Dialect>,
    resource_at: HashMap<Location, Url>,
    anchors: HashMap<(Url, String), Location>,
    dynamic_anchors: HashMap<(Url, String), Location>,
    failures: HashMap<Url, String>,
    memo: RwLock<HashMap<(String, String), Location>>,
}

impl SealedRegistry {
    pub fn contains(&self, uri: &Url) -> bool {
        self.resources.contains_key(&without_fragment(uri.clone()))
    }

    /// Number of registered schema resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The dialect a resource is evaluated under.
    pub fn dialect(&self, uri: &Url) -> Dialect {
        self.dialects
            .get(uri)
            .copied()
            .unwrap_or(self.default_dialect)
    }

    /// The root schema of a registered resource.
    pub fn resource(&self, uri: &Url) -> Result<ResolvedSchema<'_>, ResolveError> {
        self.resolve_ref(uri, "")
    }

    /// Resolve a `$ref` against `base`.
    ///
    /// The fragment is empty (the resource root), a JSON pointer, or an
    /// anchor name. Results are memoized per `(base, reference)`.
    pub fn resolve_ref(&self, base: &Url, reference: &str) -> Result<ResolvedSchema<'_>, ResolveError> {
        let location = self.locate(base, reference)?;
        self.materialize(&location)
    }

    /// Find the schema a dynamic anchor names, given the current scope.
    ///
    /// The scope is searched outermost first, so an enclosing resource that
    /// declares the anchor wins over nearer ones. With no match the anchor is
    /// resolved statically against the innermost base URI.
    pub fn resolve_dynamic_anchor(
        &self,
        scope: &DynamicScope,
        anchor: &str,
    ) -> Result<ResolvedSchema<'_>, ResolveError> {
        for uri in scope.outermost_first() {
            if let Some(location) = self.dynamic_anchors.get(&(uri.clone(), anchor.to_string())) {
                tracing::trace!(anchor, resource = %uri, "dynamic anchor found in scope");
                return self.materialize(location);
            }
        }
        let current = match scope.current() {
            Some(current) if !anchor.is_empty() => current,
            _ => {
                return Err(ResolveError::UnknownDynamicAnchor {
                    anchor: anchor.to_string(),
                })
            }
        };
        self.resolve_ref(current, &format!("#{}", anchor))
            .map_err(ResolveError::into_dynamic)
    }

    /// Resolve a `$dynamicRef`.
    ///
    /// The reference is first resolved statically. Only when its fragment
    /// names an anchor and the static target is a dynamic anchor of that name
    /// (or nothing was found statically) does the dynamic scope decide;
    /// otherwise it behaves exactly like `$ref`.
    pub fn resolve_dynamic_ref(
        &self,
        base: &Url,
        scope: &DynamicScope,
        reference: &str,
    ) -> Result<ResolvedSchema<'_>, ResolveError> {
        let anchor = reference
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .filter(|fragment| !fragment.is_empty() && !fragment.starts_with('/'))
            .map(percent_decode);
        let initial = self.locate(base, reference);

        let Some(anchor) = anchor else {
            return initial
                .and_then(|location| self.materialize(&location))
                .map_err(ResolveError::into_dynamic);
        };
        match initial {
            Ok(location) if !self.is_dynamic_anchor(&location, &anchor) => {
                self.materialize(&location)
            }
            Ok(location) => self
                .resolve_dynamic_anchor(scope, &anchor)
                .or_else(|_| self.materialize(&location)),
            Err(err) => self
                .resolve_dynamic_anchor(scope, &anchor)
                .map_err(|_| err.into_dynamic()),
        }
    }

    /// Resolve a 2019-09 `$recursiveRef`.
    ///
    /// If the static target sets `$recursiveAnchor: true`, the outermost
    /// resource in scope that also sets it is used instead.
    pub fn resolve_recursive_ref(
        &self,
        base: &Url,
        scope: &DynamicScope,
        reference: &str,
    ) -> Result<ResolvedSchema<'_>, ResolveError> {
        let initial = self
            .resolve_ref(base, reference)
            .map_err(ResolveError::into_dynamic)?;
        let recursive = initial
            .value
            .get("$recursiveAnchor")
            .and_then(Value::as_bool)
            == Some(true);
        if !recursive {
            return Ok(initial);
        }
        for uri in scope.outermost_first() {
            if let Some(location) = self.dynamic_anchors.get(&(uri.clone(), String::new())) {
                return self.materialize(location);
            }
        }
        Ok(initial)
    }

    fn is_dynamic_anchor(&self, location: &Location, anchor: &str) -> bool {
        let (base, _) = self.resource_of(location);
        self.dynamic_anchors.get(&(base, anchor.to_string())) == Some(location)
    }

    fn locate(&self, base: &Url, reference: &str) -> Result<Location, ResolveError> {
        let key = (base.as_str().to_string(), reference.to_string());
        if let Some(location) = self
            .memo
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(location.clone());
        }

        let location = self.locate_uncached(base, reference)?;
        tracing::trace!(base = %base, reference, pointer = %location.pointer, "resolved reference");
        self.memo
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, location.clone());
        Ok(location)
    }

    fn locate_uncached(&self, base: &Url, reference: &str) -> Result<Location, ResolveError> {
        let target = base
            .join(reference)
            .map_err(|e| ResolveError::InvalidReference {
                base: base.to_string(),
                reference: reference.to_string(),
                message: e.to_string(),
            })?;
        let fragment = target.fragment().unwrap_or("").to_string();
        let uri = without_fragment(target);

        let Some(resource) = self.resources.get(&uri) else {
            return Err(match self.failures.get(&uri) {
                Some(message) => ResolveError::Retrieval {
                    uri: uri.to_string(),
                    message: message.clone(),
                },
                None => ResolveError::UnknownResource {
                    uri: uri.to_string(),
                    dynamic: false,
                },
            });
        };

        if fragment.is_empty() {
            return Ok(resource.clone());
        }

        if fragment.starts_with('/') {
            let not_found = || ResolveError::UnknownPointer {
                base: uri.to_string(),
                pointer: fragment.clone(),
                dynamic: false,
            };
            let pointer = JsonPointer::from_fragment(&fragment).ok_or_else(not_found)?;
            let location = Location {
                document: resource.document.clone(),
                pointer: resource.pointer.concat(&pointer),
            };
            let document = self.documents.get(&location.document).ok_or_else(not_found)?;
            location.pointer.navigate(document).ok_or_else(not_found)?;
            return Ok(location);
        }

        let anchor = percent_decode(&fragment);
        self.anchors
            .get(&(uri.clone(), anchor.clone()))
            .cloned()
            .ok_or(ResolveError::UnknownAnchor {
                base: uri.to_string(),
                anchor,
                dynamic: false,
            })
    }

    fn materialize(&self, location: &Location) -> Result<ResolvedSchema<'_>, ResolveError> {
        let value = self
            .documents
            .get(&location.document)
            .and_then(|document| location.pointer.navigate(document))
            .ok_or_else(|| ResolveError::UnknownPointer {
                base: location.document.to_string(),
                pointer: location.pointer.to_string(),
                dynamic: false,
            })?;
        let (base, pointer) = self.resource_of(location);
        Ok(ResolvedSchema {
            value,
            base,
            pointer,
        })
    }

    /// The innermost resource enclosing `location`.
    fn resource_of(&self, location: &Location) -> (Url, JsonPointer) {
        for len in (0..=location.pointer.len()).rev() {
            let prefix = Location {
                document: location.document.clone(),
                pointer: location.pointer.prefix(len),
            };
            if let Some(uri) = self.resource_at.get(&prefix) {
                let relative = location
                    .pointer
                    .strip_prefix(&prefix.pointer)
                    .unwrap_or_default();
                return (uri.clone(), relative);
            }
        }
        (location.document.clone(), location.pointer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new(Arc::new(KeywordCatalog::builtin().unwrap()))
    }

    #[test]
    fn resolves_pointers_and_anchors() {
        let mut registry = builder();
        let root = registry
            .register(
                json!({
                    "$id": "https://example.com/root.json",
                    "$defs": {
                        "name": { "$anchor": "name", "type": "string" },
                        "a b": { "type": "integer" }
                    }
                }),
                &uri("https://example.com/root.json"),
            )
            .unwrap();
        let registry = registry.seal();

        let by_pointer = registry.resolve_ref(&root, "#/$defs/name").unwrap();
        assert_eq!(by_pointer.value["type"], "string");
        assert_eq!(by_pointer.pointer.to_string(), "/$defs/name");

        let by_anchor = registry.resolve_ref(&root, "#name").unwrap();
        assert_eq!(by_anchor, by_pointer);

        let escaped = registry.resolve_ref(&root, "#/$defs/a%20b").unwrap();
        assert_eq!(escaped.value["type"], "integer");
    }

    #[test]
    fn embedded_resources_get_their_own_base() {
        let mut registry = builder();
        registry
            .register(
                json!({
                    "$id": "https://example.com/root.json",
                    "$defs": {
                        "item": {
                            "$id": "item.json",
                            "$anchor": "it",
                            "properties": { "x": { "type": "string" } }
                        }
                    }
                }),
                &uri("https://example.com/root.json"),
            )
            .unwrap();
        let registry = registry.seal();

        let item = registry
            .resolve_ref(&uri("https://example.com/root.json"), "item.json")
            .unwrap();
        assert_eq!(item.base.as_str(), "https://example.com/item.json");
        assert!(item.pointer.is_empty());

        // A pointer through the embedded resource takes on its base.
        let deep = registry
            .resolve_ref(
                &uri("https://example.com/root.json"),
                "#/$defs/item/properties/x",
            )
            .unwrap();
        assert_eq!(deep.base.as_str(), "https://example.com/item.json");
        assert_eq!(deep.pointer.to_string(), "/properties/x");

        // Anchors are scoped to the resource that declares them.
        assert!(registry
            .resolve_ref(&uri("https://example.com/item.json"), "#it")
            .is_ok());
        assert!(matches!(
            registry.resolve_ref(&uri("https://example.com/root.json"), "#it"),
            Err(ResolveError::UnknownAnchor { .. })
        ));
    }

    #[test]
    fn not_found_errors_are_distinct() {
        let mut registry = builder();
        let root = registry
            .register(json!({ "type": "object" }), &uri("https://example.com/s.json"))
            .unwrap();
        let registry = registry.seal();

        assert!(matches!(
            registry.resolve_ref(&root, "other.json"),
            Err(ResolveError::UnknownResource { dynamic: false, .. })
        ));
        assert!(matches!(
            registry.resolve_ref(&root, "#/properties/x"),
            Err(ResolveError::UnknownPointer { .. })
        ));
        assert!(matches!(
            registry.resolve_ref(&root, "#missing"),
            Err(ResolveError::UnknownAnchor { .. })
        ));
    }

    #[test]
    fn duplicate_anchor_rejects_whole_document() {
        let mut registry = builder();
        let base = uri("https://example.com/dup.json");
        let err = registry
            .register(
                json!({
                    "$defs": {
                        "a": { "$anchor": "dup" },
                        "b": { "$anchor": "dup" }
                    }
                }),
                &base,
            )
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::DuplicateAnchor {
                base: "https://example.com/dup.json".into(),
                anchor: "dup".into(),
            }
        );
        assert!(!registry.contains(&base));
        let registry = registry.seal();
        assert!(registry.resolve_ref(&base, "#dup").is_err());
    }

    #[test]
    fn duplicate_resource_is_rejected() {
        let mut registry = builder();
        let base = uri("https://example.com/a.json");
        registry.register(json!({}), &base).unwrap();
        assert!(matches!(
            registry.register(json!({}), &base),
            Err(ResolveError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn dynamic_anchor_prefers_outermost_scope() {
        let mut registry = builder();
        registry
            .register(
                json!({ "$id": "https://example.com/a", "$dynamicAnchor": "X" }),
                &uri("https://example.com/a"),
            )
            .unwrap();
        registry
            .register(
                json!({ "$id": "https://example.com/b", "$dynamicAnchor": "X", "title": "b" }),
                &uri("https://example.com/b"),
            )
            .unwrap();
        let registry = registry.seal();

        let scope = DynamicScope::new()
            .append(uri("https://example.com/a"))
            .append(uri("https://example.com/b"));
        let target = registry
            .resolve_dynamic_ref(&uri("https://example.com/b"), &scope, "#X")
            .unwrap();
        assert_eq!(target.base.as_str(), "https://example.com/a");

        // Without the outer frame, the nearer anchor is used.
        let inner_only = DynamicScope::new().append(uri("https://example.com/b"));
        let target = registry
            .resolve_dynamic_ref(&uri("https://example.com/b"), &inner_only, "#X")
            .unwrap();
        assert_eq!(target.base.as_str(), "https://example.com/b");
    }

    #[test]
    fn dynamic_ref_to_plain_anchor_is_static() {
        let mut registry = builder();
        registry
            .register(
                json!({ "$id": "https://example.com/a", "$dynamicAnchor": "X" }),
                &uri("https://example.com/a"),
            )
            .unwrap();
        registry
            .register(
                json!({ "$id": "https://example.com/b", "$anchor": "X" }),
                &uri("https://example.com/b"),
            )
            .unwrap();
        let registry = registry.seal();

        let scope = DynamicScope::new()
            .append(uri("https://example.com/a"))
            .append(uri("https://example.com/b"));
        let target = registry
            .resolve_dynamic_ref(&uri("https://example.com/b"), &scope, "#X")
            .unwrap();
        assert_eq!(target.base.as_str(), "https://example.com/b");
    }

    #[test]
    fn dynamic_anchor_without_match_fails_explicitly() {
        let registry = builder().seal();
        let scope = DynamicScope::new().append(uri("https://example.com/none"));
        let err = registry.resolve_dynamic_anchor(&scope, "X").unwrap_err();
        assert!(err.is_dynamic());
    }

    #[test]
    fn legacy_identifiers() {
        let mut registry = builder().draft(Some(Draft::Draft4));
        registry
            .register(
                json!({
                    "id": "https://example.com/d4.json",
                    "definitions": {
                        "a": { "id": "#alpha", "type": "string" }
                    }
                }),
                &uri("https://example.com/d4.json"),
            )
            .unwrap();
        let registry = registry.seal();
        let alpha = registry
            .resolve_ref(&uri("https://example.com/d4.json"), "#alpha")
            .unwrap();
        assert_eq!(alpha.value["type"], "string");
        assert_eq!(
            registry.dialect(&uri("https://example.com/d4.json")).draft,
            Some(Draft::Draft4)
        );
    }

    #[test]
    fn id_next_to_ref_is_ignored_in_draft7() {
        let mut registry = builder();
        registry
            .register(
                json!({
                    "$schema": "http://json-schema.org/draft-07/schema#",
                    "definitions": {
                        "a": { "$id": "https://example.com/ignored", "$ref": "#" }
                    }
                }),
                &uri("https://example.com/d7.json"),
            )
            .unwrap();
        assert!(!registry.contains(&uri("https://example.com/ignored")));
    }

    #[test]
    fn missing_documents_and_failures() {
        let mut registry = builder();
        registry
            .register(
                json!({ "properties": { "a": { "$ref": "https://example.com/other.json#/x" } } }),
                &uri("https://example.com/s.json"),
            )
            .unwrap();
        let other = uri("https://example.com/other.json");
        assert_eq!(registry.missing(), vec![other.clone()]);

        registry.record_failure(other.clone(), "connection refused");
        assert!(registry.missing().is_empty());
        let registry = registry.seal();
        assert!(matches!(
            registry.resolve_ref(&uri("https://example.com/s.json"), "other.json"),
            Err(ResolveError::Retrieval { .. })
        ));
    }

    #[test]
    fn vocabularies_come_from_registered_meta_schema() {
        let mut registry = builder();
        registry
            .register(
                json!({
                    "$id": "https://example.com/meta",
                    "$vocabulary": {
                        "https://json-schema.org/draft/2020-12/vocab/core": true,
                        "https://json-schema.org/draft/2020-12/vocab/applicator": true
                    }
                }),
                &uri("https://example.com/meta"),
            )
            .unwrap();
        registry
            .register(
                json!({ "$schema": "https://example.com/meta", "minLength": 3 }),
                &uri("https://example.com/s.json"),
            )
            .unwrap();
        let registry = registry.seal();
        let dialect = registry.dialect(&uri("https://example.com/s.json"));
        assert!(dialect.vocabularies.contains(Vocabulary::Applicator));
        assert!(!dialect.vocabularies.contains(Vocabulary::Validation));
    }

    #[test]
    fn sealed_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SealedRegistry>();
    }
}
