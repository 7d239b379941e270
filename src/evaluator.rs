//! Recursive evaluation of a schema against a value.
//!
//! Each subschema/value pair gets a fresh [`ValidationContext`]. Its
//! applicable keywords run in catalog order; each keyword sees a
//! [`KeywordContext`] through which it reports validity, an error message
//! and an annotation, reads the annotations of keywords that ran before it,
//! and descends into subschemas. The node's outcome is the conjunction of its
//! keywords' judgments.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use fancy_regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::catalog::KeywordCatalog;
use crate::format::FormatRegistry;
use crate::output::EvaluationResults;
use crate::pointer::JsonPointer;
use crate::registry::{schema_id, ResolvedSchema, SealedRegistry};
use crate::scope::DynamicScope;
use crate::types::{json_type_name, Dialect, EvaluationOptions};

type PlanKey = (usize, Dialect);

/// Memoized per-validator state: keyword plans per schema object and
/// compiled regular expressions.
#[derive(Debug, Default)]
pub(crate) struct EvaluationCaches {
    plans: RwLock<HashMap<PlanKey, Arc<[usize]>>>,
    regexes: RwLock<HashMap<String, Arc<Regex>>>,
}

/// Everything evaluation reads. All of it is shared and read-only.
#[derive(Clone, Copy)]
pub(crate) struct Evaluator<'e> {
    pub(crate) registry: &'e SealedRegistry,
    pub(crate) catalog: &'e KeywordCatalog,
    pub(crate) formats: &'e FormatRegistry,
    pub(crate) options: &'e EvaluationOptions,
    pub(crate) caches: &'e EvaluationCaches,
}

impl<'e> Evaluator<'e> {
    /// Evaluate one subschema/value pair.
    pub(crate) fn evaluate(&self, mut node: ValidationContext<'_>) -> EvaluationResults {
        if node.stalled > self.options.max_depth {
            let message = format!(
                "maximum evaluation depth of {} exceeded",
                self.options.max_depth
            );
            return node.leaf(false, Some(message));
        }

        let schema = node.schema;
        match schema {
            Value::Bool(true) => node.leaf(true, None),
            Value::Bool(false) => {
                let message = format!("{} is not allowed by a false schema", node.instance);
                node.leaf(false, Some(message))
            }
            Value::Object(map) => {
                self.run_keywords(&mut node, map);
                node.finish()
            }
            other => {
                let message = format!(
                    "a schema must be an object or a boolean, found {}",
                    json_type_name(other)
                );
                node.leaf(false, Some(message))
            }
        }
    }

    fn run_keywords<'a>(&self, node: &mut ValidationContext<'a>, map: &'a Map<String, Value>) {
        let plan = self.plan(map, &node.dialect);
        for &index in plan.iter() {
            let descriptor = self.catalog.descriptor(index);
            let Some(data) = map.get(descriptor.name()) else {
                continue;
            };
            let requirement = Requirement {
                rank: index,
                keyword: descriptor.name(),
                data,
                evaluation_path: node.evaluation_path.join(descriptor.name()),
            };
            tracing::trace!(
                keyword = requirement.keyword,
                rank = requirement.rank,
                path = %requirement.evaluation_path,
                "running keyword"
            );

            let result = {
                let mut ctx = KeywordContext::new(self, node, requirement.keyword, requirement.data);
                descriptor.validate(&mut ctx);
                ctx.into_result()
            };
            if let Some(result) = result {
                let failed = !result.valid;
                node.results.push(result);
                if failed && self.options.short_circuit {
                    break;
                }
            }
        }
    }

    fn plan(&self, map: &Map<String, Value>, dialect: &Dialect) -> Arc<[usize]> {
        let key = (map as *const Map<String, Value> as usize, *dialect);
        if let Some(plan) = self
            .caches
            .plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(plan);
        }
        let plan: Arc<[usize]> = self.catalog.plan(map, dialect).into();
        self.caches
            .plans
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&plan));
        plan
    }

    fn regex(&self, pattern: &str) -> Result<Arc<Regex>, fancy_regex::Error> {
        if let Some(regex) = self
            .caches
            .regexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
        {
            return Ok(Arc::clone(regex));
        }
        let regex = Arc::new(Regex::new(pattern)?);
        self.caches
            .regexes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }
}

/// One scheduled keyword: its data and where it sits in the evaluation.
///
/// `rank` is the keyword's index in the catalog; the plan is already sorted
/// by evaluation order.
#[derive(Debug)]
pub(crate) struct Requirement<'s> {
    pub(crate) rank: usize,
    pub(crate) keyword: &'s str,
    pub(crate) data: &'s Value,
    pub(crate) evaluation_path: JsonPointer,
}

/// State for evaluating one subschema against one value.
#[derive(Debug)]
pub struct ValidationContext<'a> {
    schema: &'a Value,
    instance: &'a Value,
    base: Url,
    /// Location of `schema` inside the resource identified by `base`.
    pointer: JsonPointer,
    evaluation_path: JsonPointer,
    instance_location: JsonPointer,
    scope: DynamicScope,
    dialect: Dialect,
    /// Nested evaluations since the instance location last advanced.
    stalled: usize,
    results: Vec<EvaluationResults>,
}

impl<'a> ValidationContext<'a> {
    /// The context for a root schema resource.
    pub(crate) fn root(target: ResolvedSchema<'a>, instance: &'a Value, dialect: Dialect) -> Self {
        let scope = DynamicScope::new().append(target.base.clone());
        Self {
            schema: target.value,
            instance,
            base: target.base,
            pointer: target.pointer,
            evaluation_path: JsonPointer::root(),
            instance_location: JsonPointer::root(),
            scope,
            dialect,
            stalled: 0,
            results: Vec::new(),
        }
    }

    /// A lexically nested subschema. Picks up the subschema's own `$id`.
    fn subschema<'b>(
        &self,
        registry: &SealedRegistry,
        keyword: &str,
        token: Option<&str>,
        schema: &'b Value,
        instance_token: Option<&str>,
        instance: &'b Value,
    ) -> ValidationContext<'b> {
        let mut evaluation_path = self.evaluation_path.join(keyword);
        let mut pointer = self.pointer.join(keyword);
        if let Some(token) = token {
            evaluation_path.push(token);
            pointer.push(token);
        }
        let (instance_location, stalled) = match instance_token {
            Some(token) => (self.instance_location.join(token), 0),
            None => (self.instance_location.clone(), self.stalled + 1),
        };

        let mut base = self.base.clone();
        let mut scope = self.scope.clone();
        let mut dialect = self.dialect;
        if let Some(id) = schema_id(schema, &self.dialect) {
            if let Ok(mut resource) = self.base.join(id) {
                resource.set_fragment(None);
                if scope.current() != Some(&resource) {
                    scope = scope.append(resource.clone());
                }
                dialect = registry.dialect(&resource);
                base = resource;
                pointer = JsonPointer::root();
            }
        }

        ValidationContext {
            schema,
            instance,
            base,
            pointer,
            evaluation_path,
            instance_location,
            scope,
            dialect,
            stalled,
            results: Vec::new(),
        }
    }

    /// The target of a reference, evaluated against the same value.
    fn referenced<'b>(
        &self,
        registry: &SealedRegistry,
        keyword: &str,
        target: ResolvedSchema<'b>,
        instance: &'b Value,
    ) -> ValidationContext<'b> {
        let scope = if self.scope.current() != Some(&target.base) {
            self.scope.append(target.base.clone())
        } else {
            self.scope.clone()
        };
        ValidationContext {
            schema: target.value,
            instance,
            dialect: registry.dialect(&target.base),
            base: target.base,
            pointer: target.pointer,
            evaluation_path: self.evaluation_path.join(keyword),
            instance_location: self.instance_location.clone(),
            scope,
            stalled: self.stalled + 1,
            results: Vec::new(),
        }
    }

    pub fn schema(&self) -> &'a Value {
        self.schema
    }

    pub fn instance(&self) -> &'a Value {
        self.instance
    }

    pub fn base_uri(&self) -> &Url {
        &self.base
    }

    pub fn instance_location(&self) -> &JsonPointer {
        &self.instance_location
    }

    pub fn evaluation_path(&self) -> &JsonPointer {
        &self.evaluation_path
    }

    pub fn scope(&self) -> &DynamicScope {
        &self.scope
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Annotations produced so far at this node, keyed by keyword.
    pub fn annotations(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.results.iter().filter_map(|result| {
            Some((result.keyword.as_deref()?, result.annotation.as_ref()?))
        })
    }

    fn schema_location(&self, keyword: Option<&str>) -> String {
        match keyword {
            Some(keyword) => format!("{}#{}", self.base, self.pointer.join(keyword)),
            None => format!("{}#{}", self.base, self.pointer),
        }
    }

    fn leaf(self, valid: bool, error: Option<String>) -> EvaluationResults {
        EvaluationResults {
            valid,
            keyword: None,
            schema_location: self.schema_location(None),
            evaluation_path: self.evaluation_path,
            instance_location: self.instance_location,
            error,
            annotation: None,
            details: Vec::new(),
        }
    }

    fn finish(self) -> EvaluationResults {
        let valid = self.results.iter().all(|result| result.valid);
        EvaluationResults {
            valid,
            keyword: None,
            schema_location: self.schema_location(None),
            evaluation_path: self.evaluation_path,
            instance_location: self.instance_location,
            error: None,
            annotation: None,
            details: self.results,
        }
    }
}

/// The view a keyword gets of the node it runs in.
pub struct KeywordContext<'c, 'a> {
    evaluator: &'c Evaluator<'c>,
    node: &'c ValidationContext<'a>,
    keyword: &'c str,
    data: &'a Value,
    valid: Option<bool>,
    error: Option<String>,
    annotation: Option<Value>,
    details: Vec<EvaluationResults>,
}

impl<'c, 'a> KeywordContext<'c, 'a> {
    fn new(
        evaluator: &'c Evaluator<'c>,
        node: &'c ValidationContext<'a>,
        keyword: &'c str,
        data: &'a Value,
    ) -> Self {
        Self {
            evaluator,
            node,
            keyword,
            data,
            valid: None,
            error: None,
            annotation: None,
            details: Vec::new(),
        }
    }

    pub fn keyword(&self) -> &str {
        self.keyword
    }

    /// The keyword's value in the schema.
    pub fn data(&self) -> &'a Value {
        self.data
    }

    /// The value being checked.
    pub fn instance(&self) -> &'a Value {
        self.node.instance
    }

    /// Another keyword's value in the same schema object.
    pub fn schema_value(&self, keyword: &str) -> Option<&'a Value> {
        self.node.schema.get(keyword)
    }

    pub fn dialect(&self) -> Dialect {
        self.node.dialect
    }

    pub fn base_uri(&self) -> &Url {
        &self.node.base
    }

    pub fn scope(&self) -> &DynamicScope {
        &self.node.scope
    }

    pub fn instance_location(&self) -> &JsonPointer {
        &self.node.instance_location
    }

    pub fn evaluation_path(&self) -> JsonPointer {
        self.node.evaluation_path.join(self.keyword)
    }

    pub fn registry(&self) -> &'c SealedRegistry {
        self.evaluator.registry
    }

    pub fn formats(&self) -> &'c FormatRegistry {
        self.evaluator.formats
    }

    pub fn options(&self) -> &'c EvaluationOptions {
        self.evaluator.options
    }

    pub fn short_circuit(&self) -> bool {
        self.evaluator.options.short_circuit
    }

    /// Results of the keywords that already ran in this schema object.
    pub fn sibling_results(&self) -> &'c [EvaluationResults] {
        &self.node.results
    }

    /// The annotation a keyword that already ran here produced.
    pub fn sibling_annotation(&self, keyword: &str) -> Option<&'c Value> {
        self.node
            .results
            .iter()
            .find(|result| result.keyword.as_deref() == Some(keyword))
            .and_then(|result| result.annotation.as_ref())
    }

    /// Compile (or fetch from cache) a regular expression. Lookaround and
    /// backreferences are supported.
    pub fn regex(&self, pattern: &str) -> Result<Arc<Regex>, fancy_regex::Error> {
        self.evaluator.regex(pattern)
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.valid = Some(false);
        self.error = Some(message.into());
    }

    /// Record success unless a failure was already recorded.
    pub fn pass(&mut self) {
        if self.valid.is_none() {
            self.valid = Some(true);
        }
    }

    /// Record the outcome of an applicator, building the message only on
    /// failure.
    pub fn conclude(&mut self, valid: bool, message: impl FnOnce() -> String) {
        if valid {
            self.pass();
        } else {
            self.fail(message());
        }
    }

    pub fn annotate(&mut self, annotation: Value) {
        self.annotation = Some(annotation);
    }

    /// Evaluate a subschema found at `keyword[/token]` against `instance`,
    /// located at `instance_token` below the current value (or at the
    /// current value when `None`). The child result is attached under this
    /// keyword; returns whether it passed.
    pub fn descend<'b>(
        &mut self,
        token: Option<&str>,
        schema: &'b Value,
        instance_token: Option<&str>,
        instance: &'b Value,
    ) -> bool
    where
        'a: 'b,
    {
        let child = self.node.subschema(
            self.evaluator.registry,
            self.keyword,
            token,
            schema,
            instance_token,
            instance,
        );
        self.attach(child)
    }

    /// Evaluate a resolved reference target against the current value.
    pub fn descend_resolved<'b>(&mut self, target: ResolvedSchema<'b>) -> bool
    where
        'a: 'b,
    {
        let instance: &'b Value = self.node.instance;
        let child = self
            .node
            .referenced(self.evaluator.registry, self.keyword, target, instance);
        self.attach(child)
    }

    fn attach(&mut self, child: ValidationContext<'_>) -> bool {
        let result = self.evaluator.evaluate(child);
        let valid = result.valid;
        self.details.push(result);
        valid
    }

    /// A keyword that judged nothing and annotated nothing leaves no trace.
    fn into_result(self) -> Option<EvaluationResults> {
        if self.valid.is_none() && self.annotation.is_none() && self.details.is_empty() {
            return None;
        }
        Some(EvaluationResults {
            valid: self.valid.unwrap_or(true),
            keyword: Some(self.keyword.to_string()),
            evaluation_path: self.node.evaluation_path.join(self.keyword),
            schema_location: self.node.schema_location(Some(self.keyword)),
            instance_location: self.node.instance_location.clone(),
            error: self.error,
            annotation: self.annotation,
            details: self.details,
        })
    }
}
