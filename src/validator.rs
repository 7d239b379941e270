//! The engine handle: a sealed registry plus everything evaluation needs.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::catalog::{CatalogBuilder, KeywordCatalog, KeywordDescriptor};
use crate::error::{BuildError, LoadError, SchemaError, ValidateError};
use crate::evaluator::{EvaluationCaches, Evaluator, ValidationContext};
use crate::format::{FormatRegistry, FormatValidator};
use crate::output::{EvaluationResults, Output};
use crate::pointer::JsonPointer;
use crate::registry::{SchemaRegistryBuilder, SealedRegistry};
use crate::retrieve::{CancellationToken, Fetch};
use crate::root_cause::root_cause_errors;
use crate::types::{Draft, EvaluationOptions, DEFAULT_BASE_URI};

/// A compiled schema, ready to evaluate any number of values from any
/// number of threads.
#[derive(Debug)]
pub struct Validator {
    root: Url,
    registry: SealedRegistry,
    catalog: Arc<KeywordCatalog>,
    formats: FormatRegistry,
    options: EvaluationOptions,
    caches: EvaluationCaches,
}

impl Validator {
    /// Build a validator with the built-in keywords and formats.
    ///
    /// # Errors
    ///
    /// See [`ValidatorBuilder::build`].
    pub fn new(schema: Value) -> Result<Self, BuildError> {
        Self::builder().build(schema)
    }

    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    /// Evaluate `instance` and return the full result tree.
    pub fn evaluate(&self, instance: &Value) -> EvaluationResults {
        self.evaluate_with(instance, &self.options)
    }

    fn evaluate_with(&self, instance: &Value, options: &EvaluationOptions) -> EvaluationResults {
        let target = match self.registry.resource(&self.root) {
            Ok(target) => target,
            Err(err) => {
                return EvaluationResults {
                    valid: false,
                    keyword: None,
                    evaluation_path: JsonPointer::root(),
                    schema_location: format!("{}#", self.root),
                    instance_location: JsonPointer::root(),
                    error: Some(err.to_string()),
                    annotation: None,
                    details: Vec::new(),
                }
            }
        };
        let dialect = self.registry.dialect(&target.base);
        let evaluator = Evaluator {
            registry: &self.registry,
            catalog: &self.catalog,
            formats: &self.formats,
            options,
            caches: &self.caches,
        };
        evaluator.evaluate(ValidationContext::root(target, instance, dialect))
    }

    /// Whether `instance` is valid. Stops at the first failure.
    pub fn is_valid(&self, instance: &Value) -> bool {
        let options = EvaluationOptions {
            short_circuit: true,
            ..self.options.clone()
        };
        self.evaluate_with(instance, &options).valid
    }

    /// Evaluate and project into the configured output format.
    pub fn apply(&self, instance: &Value) -> Output {
        self.evaluate(instance)
            .project(self.options.output_format, self.options.include_valid_units)
    }

    /// The root causes of a failed evaluation, as flat errors.
    pub fn errors(&self, instance: &Value) -> Vec<SchemaError> {
        root_cause_errors(&self.evaluate(instance))
    }

    pub fn registry(&self) -> &SealedRegistry {
        &self.registry
    }

    /// Canonical URI of the root schema resource.
    pub fn root_uri(&self) -> &Url {
        &self.root
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }
}

/// Configures and builds a [`Validator`].
#[derive(Debug, Clone)]
pub struct ValidatorBuilder {
    options: EvaluationOptions,
    catalog: CatalogBuilder,
    formats: FormatRegistry,
    resources: Vec<(String, Value)>,
    base_uri: Option<String>,
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self {
            options: EvaluationOptions::default(),
            catalog: CatalogBuilder::with_builtins(),
            formats: FormatRegistry::with_builtins(),
            resources: Vec::new(),
            base_uri: None,
        }
    }
}

impl ValidatorBuilder {
    pub fn options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    /// Evaluate every resource under `draft`, ignoring `$schema`.
    pub fn draft(mut self, draft: Draft) -> Self {
        self.options.draft = Some(draft);
        self
    }

    /// Add or replace a named format.
    pub fn format(mut self, name: impl Into<String>, validator: FormatValidator) -> Self {
        self.formats.insert(name, validator);
        self
    }

    /// Replace the whole format table.
    pub fn formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    /// Add a keyword to the catalog.
    pub fn keyword(mut self, descriptor: KeywordDescriptor) -> Self {
        self.catalog = self.catalog.keyword(descriptor);
        self
    }

    /// Replace the keyword catalog, e.g. with [`CatalogBuilder::empty`].
    pub fn catalog(mut self, catalog: CatalogBuilder) -> Self {
        self.catalog = catalog;
        self
    }

    /// Register an additional schema document under `uri`, so references to
    /// it resolve without retrieval.
    pub fn resource(mut self, uri: impl Into<String>, schema: Value) -> Self {
        self.resources.push((uri.into(), schema));
        self
    }

    /// Base URI of the root schema when it has no `$id`.
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    /// Register everything and seal the registry.
    ///
    /// # Errors
    ///
    /// `BuildError::Catalog` for a broken keyword table,
    /// `BuildError::Resolve` when registration fails (duplicate resources or
    /// anchors, bad `$id`), `BuildError::Load` for an unparsable URI.
    pub fn build(self, schema: Value) -> Result<Validator, BuildError> {
        let (registry, parts) = self.prepare(schema)?;
        Ok(parts.finish(registry))
    }

    /// Like [`build`](Self::build), but first fetches every external
    /// document the schemas reference.
    ///
    /// # Errors
    ///
    /// As `build`, plus `BuildError::Fetch` on cancellation. Documents that
    /// cannot be fetched are not an error here; references into them fail
    /// during evaluation.
    pub async fn build_with_fetcher<F>(
        self,
        schema: Value,
        fetcher: &F,
        token: &CancellationToken,
    ) -> Result<Validator, BuildError>
    where
        F: Fetch + ?Sized,
    {
        let (mut registry, parts) = self.prepare(schema)?;
        let fetched = registry.retrieve_missing(fetcher, token).await?;
        tracing::debug!(fetched, "external schema documents retrieved");
        Ok(parts.finish(registry))
    }

    fn prepare(self, schema: Value) -> Result<(SchemaRegistryBuilder, Parts), BuildError> {
        let catalog = Arc::new(self.catalog.build()?);
        let mut registry =
            SchemaRegistryBuilder::new(Arc::clone(&catalog)).draft(self.options.draft);
        for (uri, resource) in self.resources {
            let uri = parse_uri(&uri)?;
            registry.register(resource, &uri)?;
        }
        let base = parse_uri(self.base_uri.as_deref().unwrap_or(DEFAULT_BASE_URI))?;
        let root = registry.register(schema, &base)?;

        Ok((
            registry,
            Parts {
                root,
                catalog,
                formats: self.formats,
                options: self.options,
            },
        ))
    }
}

/// What a builder hands over once registration is done.
struct Parts {
    root: Url,
    catalog: Arc<KeywordCatalog>,
    formats: FormatRegistry,
    options: EvaluationOptions,
}

impl Parts {
    fn finish(self, registry: SchemaRegistryBuilder) -> Validator {
        Validator {
            root: self.root,
            registry: registry.seal(),
            catalog: self.catalog,
            formats: self.formats,
            options: self.options,
            caches: EvaluationCaches::default(),
        }
    }
}

fn parse_uri(uri: &str) -> Result<Url, LoadError> {
    Url::parse(uri).map_err(|source| LoadError::InvalidUri {
        uri: uri.to_string(),
        source,
    })
}

/// Evaluate `instance` against `schema` in one call.
///
/// # Errors
///
/// Returns `BuildError` if the schema cannot be registered.
pub fn evaluate(
    schema: &Value,
    instance: &Value,
    options: &EvaluationOptions,
) -> Result<EvaluationResults, BuildError> {
    let validator = Validator::builder()
        .options(options.clone())
        .build(schema.clone())?;
    Ok(validator.evaluate(instance))
}

/// Validate `instance` against `schema`, reporting the root causes of any
/// failure.
///
/// # Errors
///
/// Returns `ValidateError::Build` if the schema cannot be registered, or
/// `ValidateError::Invalid` if the instance doesn't match the schema.
pub fn validate(
    schema: &Value,
    instance: &Value,
    options: &EvaluationOptions,
) -> Result<(), ValidateError> {
    let validator = Validator::builder()
        .options(options.clone())
        .build(schema.clone())
        .map_err(ValidateError::Build)?;

    let errors = validator.errors(instance);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
