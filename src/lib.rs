//! Schema Eval
//!
//! Draft-aware evaluation of JSON values against JSON Schemas that reference
//! each other statically (`$ref`) and dynamically (`$dynamicRef`,
//! `$recursiveRef`).
//!
//! Schemas are registered once into a registry that indexes their resources
//! and anchors, then sealed. Evaluation walks the schema and value together
//! and produces a tree of results that can be projected into flag, basic or
//! hierarchical output, or reduced to the failures that actually need
//! fixing.
//!
//! # Example
//!
//! ```
//! use schema_eval::{root_causes, EvaluationOptions, Validator};
//! use serde_json::json;
//!
//! let validator = Validator::new(json!({
//!     "allOf": [
//!         { "type": "string" },
//!         { "minLength": 3 }
//!     ]
//! }))
//! .unwrap();
//!
//! let results = validator.evaluate(&json!("hi"));
//! assert!(!results.valid);
//!
//! let causes = root_causes(&results);
//! assert_eq!(causes.len(), 1);
//! assert_eq!(causes[0].keyword.as_deref(), Some("minLength"));
//! assert_eq!(causes[0].evaluation_path.to_string(), "/allOf/1/minLength");
//!
//! // One-shot helpers build a validator per call.
//! assert!(schema_eval::validate(&json!({"type": "integer"}), &json!(4), &EvaluationOptions::new()).is_ok());
//! ```
//!
//! # Output formats
//!
//! | Format | Content |
//! |--------|---------|
//! | `flag` | `{"valid": bool}` |
//! | `basic` | Every failing node (or every node) in depth-first order, without nesting |
//! | `hierarchical` | The result tree as evaluated |
//!
//! # Extending
//!
//! Keywords are added with [`KeywordDescriptor::custom`], formats with
//! [`ValidatorBuilder::format`]. Missing external documents can be fetched
//! before sealing with [`ValidatorBuilder::build_with_fetcher`].

mod catalog;
mod error;
mod evaluator;
mod format;
mod keywords;
mod loader;
mod output;
mod pointer;
mod registry;
mod retrieve;
mod root_cause;
mod scope;
mod types;
mod validator;

pub use catalog::{CatalogBuilder, CustomKeyword, KeywordCatalog, KeywordDescriptor, KeywordKind};
pub use error::{
    BuildError, CatalogError, FetchError, LoadError, ResolveError, SchemaError, ValidateError,
};
pub use evaluator::{KeywordContext, ValidationContext};
pub use format::{FormatRegistry, FormatValidator};
pub use keywords::Builtin;
pub use loader::{is_url, load_schema, load_schema_auto, load_schema_str, SchemaBaseConfig};
pub use output::{EvaluationResults, Output, OutputUnit, Preorder};
pub use pointer::JsonPointer;
pub use registry::{ResolvedSchema, SchemaRegistryBuilder, SealedRegistry};
pub use retrieve::{
    fetch, first_matching, settle, CancellationToken, Candidate, Fetch, Race, SchemaFetcher,
};
pub use root_cause::{root_cause_errors, root_causes, Analysis};
pub use scope::DynamicScope;
pub use types::{
    Dialect, Draft, Drafts, EvaluationOptions, OutputFormat, Vocabulary, VocabularySet,
    DEFAULT_BASE_URI, DEFAULT_MAX_DEPTH,
};
pub use validator::{evaluate, validate, Validator, ValidatorBuilder};

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
