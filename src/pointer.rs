//! JSON Pointer (RFC 6901) paths into schemas and instances.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// A JSON Pointer as a sequence of reference tokens.
///
/// Array indices are stored in their decimal form, so a pointer built while
/// walking an array compares equal to the same pointer parsed from text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsonPointer(Vec<String>);

impl JsonPointer {
    /// The empty pointer, addressing the whole document.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a pointer such as `/properties/a~1b/0`.
    ///
    /// Returns `None` when the text is non-empty and doesn't start with `/`.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(Self::root());
        }
        let rest = text.strip_prefix('/')?;
        Some(Self(rest.split('/').map(unescape).collect()))
    }

    /// Parse the fragment part of a URI (without the leading `#`).
    ///
    /// Fragments are percent-decoded before being read as a pointer.
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        Self::parse(&percent_decode(fragment))
    }

    /// Returns a new pointer with `token` appended.
    pub fn join(&self, token: impl Into<String>) -> Self {
        let mut tokens = self.0.clone();
        tokens.push(token.into());
        Self(tokens)
    }

    /// Returns a new pointer with an array index appended.
    pub fn join_index(&self, index: usize) -> Self {
        self.join(index.to_string())
    }

    /// Returns a new pointer with every token of `other` appended.
    pub fn concat(&self, other: &JsonPointer) -> Self {
        let mut tokens = self.0.clone();
        tokens.extend(other.0.iter().cloned());
        Self(tokens)
    }

    pub fn push(&mut self, token: impl Into<String>) {
        self.0.push(token.into());
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The first `len` tokens of this pointer.
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Strip `prefix` from the front, if this pointer starts with it.
    pub fn strip_prefix(&self, prefix: &JsonPointer) -> Option<Self> {
        self.0
            .starts_with(&prefix.0)
            .then(|| Self(self.0[prefix.0.len()..].to_vec()))
    }

    /// Walk `value` along this pointer.
    pub fn navigate<'v>(&self, value: &'v Value) -> Option<&'v Value> {
        let mut current = value;
        for token in &self.0 {
            current = match current {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => items.get(parse_index(token)?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", escape(token))?;
        }
        Ok(())
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<S: Into<String>> FromIterator<S> for JsonPointer {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Array indices must be plain decimal without leading zeros.
fn parse_index(token: &str) -> Option<usize> {
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Decode `%XX` escapes. Malformed escapes are kept verbatim.
pub(crate) fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}
