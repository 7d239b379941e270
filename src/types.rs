//! Drafts, vocabularies and evaluation options.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base URI given to schemas registered without one.
pub const DEFAULT_BASE_URI: &str = "json-schema:///";

/// Default limit on nested subschema evaluations that stay on one instance
/// location.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A JSON Schema specification version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Draft {
    #[serde(rename = "draft4")]
    Draft4,
    #[serde(rename = "draft6")]
    Draft6,
    #[serde(rename = "draft7")]
    Draft7,
    #[serde(rename = "2019-09")]
    Draft201909,
    #[serde(rename = "2020-12")]
    Draft202012,
}

impl Draft {
    pub const ALL: [Draft; 5] = [
        Draft::Draft4,
        Draft::Draft6,
        Draft::Draft7,
        Draft::Draft201909,
        Draft::Draft202012,
    ];

    /// The canonical meta-schema URI of this draft.
    pub fn meta_schema_uri(self) -> &'static str {
        match self {
            Draft::Draft4 => "http://json-schema.org/draft-04/schema#",
            Draft::Draft6 => "http://json-schema.org/draft-06/schema#",
            Draft::Draft7 => "http://json-schema.org/draft-07/schema#",
            Draft::Draft201909 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft202012 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    /// Recognize a draft from a `$schema` value.
    ///
    /// Scheme (`http`/`https`) and an empty trailing fragment are ignored.
    pub fn from_meta_schema_uri(uri: &str) -> Option<Draft> {
        let wanted = normalize_meta_uri(uri);
        Draft::ALL
            .into_iter()
            .find(|d| normalize_meta_uri(d.meta_schema_uri()) == wanted)
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

fn normalize_meta_uri(uri: &str) -> &str {
    let uri = uri.trim_end_matches('#');
    uri.strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
        .unwrap_or(uri)
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Draft::Draft4 => "draft4",
            Draft::Draft6 => "draft6",
            Draft::Draft7 => "draft7",
            Draft::Draft201909 => "2019-09",
            Draft::Draft202012 => "2020-12",
        };
        f.write_str(name)
    }
}

impl FromStr for Draft {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "4" | "draft4" | "draft-04" => Ok(Draft::Draft4),
            "6" | "draft6" | "draft-06" => Ok(Draft::Draft6),
            "7" | "draft7" | "draft-07" => Ok(Draft::Draft7),
            "2019-09" | "draft2019-09" => Ok(Draft::Draft201909),
            "2020-12" | "draft2020-12" => Ok(Draft::Draft202012),
            other => Err(format!(
                "unknown draft \"{}\": expected draft4, draft6, draft7, 2019-09 or 2020-12",
                other
            )),
        }
    }
}

/// A set of drafts, used to declare where a keyword applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Drafts(u8);

impl Drafts {
    pub const ALL: Drafts = Drafts(0b1_1111);
    pub const NONE: Drafts = Drafts(0);

    pub const fn only(draft: Draft) -> Self {
        Drafts(draft.bit())
    }

    /// `draft` and every later draft.
    pub const fn since(draft: Draft) -> Self {
        Drafts(Self::ALL.0 & !(draft.bit() - 1))
    }

    /// `draft` and every earlier draft.
    pub const fn until(draft: Draft) -> Self {
        Drafts((draft.bit() << 1) - 1)
    }

    pub const fn union(self, other: Drafts) -> Self {
        Drafts(self.0 | other.0)
    }

    pub const fn contains(self, draft: Draft) -> bool {
        self.0 & draft.bit() != 0
    }

    /// Whether a keyword declared for these drafts applies under `draft`.
    ///
    /// An unspecified draft accepts every keyword.
    pub fn applies_to(self, draft: Option<Draft>) -> bool {
        match draft {
            Some(draft) => self.contains(draft),
            None => self != Drafts::NONE,
        }
    }
}

impl BitOr for Drafts {
    type Output = Drafts;

    fn bitor(self, rhs: Drafts) -> Drafts {
        self.union(rhs)
    }
}

/// A named group of keywords that a meta-schema may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vocabulary {
    Core,
    Applicator,
    Unevaluated,
    Validation,
    MetaData,
    FormatAnnotation,
    FormatAssertion,
    Content,
}

impl Vocabulary {
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Map a `$vocabulary` URI to the vocabularies it enables.
    ///
    /// The 2019-09 applicator vocabulary also carries the unevaluated
    /// keywords, and its single format vocabulary is annotation-only.
    pub fn from_uri(uri: &str) -> Option<VocabularySet> {
        let (draft, name) = if let Some(name) =
            uri.strip_prefix("https://json-schema.org/draft/2020-12/vocab/")
        {
            (Draft::Draft202012, name)
        } else if let Some(name) = uri.strip_prefix("https://json-schema.org/draft/2019-09/vocab/") {
            (Draft::Draft201909, name)
        } else {
            return None;
        };
        let set = VocabularySet::empty();
        let set = match (draft, name) {
            (_, "core") => set.with(Vocabulary::Core),
            (Draft::Draft201909, "applicator") => set
                .with(Vocabulary::Applicator)
                .with(Vocabulary::Unevaluated),
            (_, "applicator") => set.with(Vocabulary::Applicator),
            (Draft::Draft202012, "unevaluated") => set.with(Vocabulary::Unevaluated),
            (_, "validation") => set.with(Vocabulary::Validation),
            (_, "meta-data") => set.with(Vocabulary::MetaData),
            (Draft::Draft201909, "format") => set.with(Vocabulary::FormatAnnotation),
            (Draft::Draft202012, "format-annotation") => set.with(Vocabulary::FormatAnnotation),
            (Draft::Draft202012, "format-assertion") => set
                .with(Vocabulary::FormatAnnotation)
                .with(Vocabulary::FormatAssertion),
            (_, "content") => set.with(Vocabulary::Content),
            _ => return None,
        };
        Some(set)
    }
}

/// A set of active vocabularies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VocabularySet(u16);

impl VocabularySet {
    pub const fn empty() -> Self {
        VocabularySet(0)
    }

    /// Every vocabulary except format assertion, which must be opted into.
    pub const fn standard() -> Self {
        VocabularySet(0xff & !Vocabulary::FormatAssertion.bit())
    }

    pub const fn with(self, vocabulary: Vocabulary) -> Self {
        VocabularySet(self.0 | vocabulary.bit())
    }

    pub const fn union(self, other: VocabularySet) -> Self {
        VocabularySet(self.0 | other.0)
    }

    pub const fn contains(self, vocabulary: Vocabulary) -> bool {
        self.0 & vocabulary.bit() != 0
    }
}

impl Default for VocabularySet {
    fn default() -> Self {
        Self::standard()
    }
}

/// The draft and vocabularies a schema resource is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dialect {
    /// `None` means unspecified: every known keyword may apply.
    pub draft: Option<Draft>,
    pub vocabularies: VocabularySet,
}

impl Dialect {
    pub fn new(draft: Option<Draft>, vocabularies: VocabularySet) -> Self {
        Self {
            draft,
            vocabularies,
        }
    }

    /// True when the draft is known and is `draft` or older.
    pub fn is_at_most(&self, draft: Draft) -> bool {
        self.draft.map_or(false, |d| d <= draft)
    }

    /// True when the draft is unknown or is `draft` or newer.
    pub fn is_at_least(&self, draft: Draft) -> bool {
        self.draft.map_or(true, |d| d >= draft)
    }
}

/// Shape of the output produced from an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single boolean.
    Flag,
    /// A flat list of output units.
    #[default]
    Basic,
    /// The evaluation tree as produced.
    Hierarchical,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flag" => Ok(OutputFormat::Flag),
            "basic" => Ok(OutputFormat::Basic),
            "hierarchical" | "verbose" => Ok(OutputFormat::Hierarchical),
            other => Err(format!(
                "unknown output format \"{}\": expected flag, basic or hierarchical",
                other
            )),
        }
    }
}

/// Options for schema evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluationOptions {
    /// Evaluate every resource under this draft. `None` derives the draft
    /// from each resource's `$schema`, or leaves it unspecified.
    pub draft: Option<Draft>,
    pub output_format: OutputFormat,
    /// Treat `format` as an assertion instead of an annotation.
    pub require_format_validation: bool,
    /// Stop evaluating a subschema once its outcome is decided.
    pub short_circuit: bool,
    /// Maximum run of nested subschema evaluations, including reference
    /// hops, that do not move to a child of the instance.
    pub max_depth: usize,
    /// Include passing units in basic output.
    pub include_valid_units: bool,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            draft: None,
            output_format: OutputFormat::default(),
            require_format_validation: false,
            short_circuit: false,
            max_depth: DEFAULT_MAX_DEPTH,
            include_valid_units: false,
        }
    }
}

impl EvaluationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(mut self, draft: Draft) -> Self {
        self.draft = Some(draft);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn require_format_validation(mut self, require: bool) -> Self {
        self.require_format_validation = require;
        self
    }

    pub fn short_circuit(mut self, short_circuit: bool) -> Self {
        self.short_circuit = short_circuit;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn include_valid_units(mut self, include: bool) -> Self {
        self.include_valid_units = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_from_meta_schema_uri() {
        assert_eq!(
            Draft::from_meta_schema_uri("http://json-schema.org/draft-07/schema#"),
            Some(Draft::Draft7)
        );
        assert_eq!(
            Draft::from_meta_schema_uri("https://json-schema.org/draft-07/schema"),
            Some(Draft::Draft7)
        );
        assert_eq!(
            Draft::from_meta_schema_uri("https://json-schema.org/draft/2020-12/schema"),
            Some(Draft::Draft202012)
        );
        assert_eq!(Draft::from_meta_schema_uri("https://example.com/meta"), None);
    }

    #[test]
    fn draft_sets() {
        let modern = Drafts::since(Draft::Draft201909);
        assert!(modern.contains(Draft::Draft202012));
        assert!(modern.contains(Draft::Draft201909));
        assert!(!modern.contains(Draft::Draft7));

        let legacy = Drafts::until(Draft::Draft7);
        assert!(legacy.contains(Draft::Draft4));
        assert!(legacy.contains(Draft::Draft7));
        assert!(!legacy.contains(Draft::Draft201909));

        assert_eq!(modern | legacy, Drafts::ALL);
        assert!(Drafts::only(Draft::Draft4).applies_to(None));
        assert!(!Drafts::NONE.applies_to(None));
    }

    #[test]
    fn vocabulary_uris() {
        let applicator =
            Vocabulary::from_uri("https://json-schema.org/draft/2019-09/vocab/applicator").unwrap();
        assert!(applicator.contains(Vocabulary::Unevaluated));

        let assertion =
            Vocabulary::from_uri("https://json-schema.org/draft/2020-12/vocab/format-assertion")
                .unwrap();
        assert!(assertion.contains(Vocabulary::FormatAssertion));
        assert!(assertion.contains(Vocabulary::FormatAnnotation));

        assert!(Vocabulary::from_uri("https://example.com/vocab/custom").is_none());
        assert!(!VocabularySet::standard().contains(Vocabulary::FormatAssertion));
    }

    #[test]
    fn dialect_draft_bounds() {
        let unspecified = Dialect::default();
        assert!(!unspecified.is_at_most(Draft::Draft7));
        assert!(unspecified.is_at_least(Draft::Draft202012));

        let draft7 = Dialect::new(Some(Draft::Draft7), VocabularySet::standard());
        assert!(draft7.is_at_most(Draft::Draft7));
        assert!(!draft7.is_at_least(Draft::Draft201909));
    }

    #[test]
    fn integer_type_name() {
        assert_eq!(json_type_name(&json!(1)), "integer");
        assert_eq!(json_type_name(&json!(1.5)), "number");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: EvaluationOptions = serde_json::from_value(json!({
            "draft": "2020-12",
            "outputFormat": "hierarchical",
            "requireFormatValidation": true
        }))
        .unwrap();
        assert_eq!(options.draft, Some(Draft::Draft202012));
        assert_eq!(options.output_format, OutputFormat::Hierarchical);
        assert!(options.require_format_validation);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn parse_cli_values() {
        assert_eq!("7".parse::<Draft>(), Ok(Draft::Draft7));
        assert_eq!("Flag".parse::<OutputFormat>(), Ok(OutputFormat::Flag));
        assert!("draft5".parse::<Draft>().is_err());
    }
}
