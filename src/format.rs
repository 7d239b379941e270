//! Named checks for the `format` keyword.
//!
//! A [`FormatRegistry`] maps format names to validators. Validators only look
//! at strings; any other value passes, except for [`FormatValidator::Custom`]
//! which sees the raw value.

use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::types::DEFAULT_BASE_URI;

type CustomCheck = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// How one format is checked.
#[derive(Clone)]
pub enum FormatValidator {
    /// The string must match the expression.
    Pattern(Regex),
    /// The string must satisfy the predicate.
    Predicate(fn(&str) -> bool),
    /// Arbitrary check on the value, with a reason on failure.
    Custom(Arc<CustomCheck>),
}

impl FormatValidator {
    pub fn custom(check: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static) -> Self {
        FormatValidator::Custom(Arc::new(check))
    }

    /// Check a value, returning why it does not conform.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (FormatValidator::Custom(check), value) => check(value),
            (FormatValidator::Pattern(regex), Value::String(s)) => {
                if regex.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("does not match {}", regex.as_str()))
                }
            }
            (FormatValidator::Predicate(predicate), Value::String(s)) => {
                if predicate(s) {
                    Ok(())
                } else {
                    Err("malformed".to_string())
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for FormatValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatValidator::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            FormatValidator::Predicate(_) => f.write_str("Predicate"),
            FormatValidator::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Format validators by name.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    validators: HashMap<String, FormatValidator>,
}

impl FormatRegistry {
    /// An empty registry: every format is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in formats: dates and times (RFC 3339), durations, email,
    /// hostnames, IP addresses, URIs, UUIDs, regular expressions and JSON
    /// pointers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let predicates: [(&str, fn(&str) -> bool); 11] = [
            ("date", is_date),
            ("time", is_time),
            ("date-time", is_date_time),
            ("email", is_email),
            ("hostname", is_hostname),
            ("ipv4", |s| s.parse::<Ipv4Addr>().is_ok()),
            ("ipv6", |s| s.parse::<Ipv6Addr>().is_ok()),
            ("uri", is_uri),
            ("uri-reference", is_uri_reference),
            ("regex", |s| fancy_regex::Regex::new(s).is_ok()),
            ("json-pointer", is_json_pointer),
        ];
        for (name, predicate) in predicates {
            registry.insert(name, FormatValidator::Predicate(predicate));
        }

        let patterns = [
            (
                "uuid",
                r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
            ),
            (
                "duration",
                r"^P(\d+W|(\d+Y(\d+M)?(\d+D)?|\d+M(\d+D)?|\d+D)(T(\d+H(\d+M)?(\d+S)?|\d+M(\d+S)?|\d+S))?|T(\d+H(\d+M)?(\d+S)?|\d+M(\d+S)?|\d+S))$",
            ),
        ];
        for (name, pattern) in patterns {
            match Regex::new(pattern) {
                Ok(regex) => {
                    registry.insert(name, FormatValidator::Pattern(regex));
                }
                Err(err) => tracing::warn!(format = name, error = %err, "skipping built-in format"),
            }
        }
        registry
    }

    /// Add or replace a format.
    pub fn insert(&mut self, name: impl Into<String>, validator: FormatValidator) -> &mut Self {
        self.validators.insert(name.into(), validator);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FormatValidator> {
        self.validators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Known format names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a run of exactly `len` ASCII digits.
fn digits(s: &str, len: usize) -> Option<u32> {
    if s.len() != len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// RFC 3339 `full-date`: `YYYY-MM-DD`.
fn is_date(s: &str) -> bool {
    let mut parts = s.split('-');
    let (Some(year), Some(month), Some(day), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let (Some(year), Some(month), Some(day)) = (digits(year, 4), digits(month, 2), digits(day, 2)) else {
        return false;
    };
    (1..=12).contains(&month) && (1..=days_in_month(year, month)).contains(&day)
}

/// RFC 3339 `full-time`: `HH:MM:SS[.frac](Z|±HH:MM)`.
fn is_time(s: &str) -> bool {
    let (local, offset) = if let Some(local) = s.strip_suffix(['Z', 'z']) {
        (local, None)
    } else {
        match s.rfind(['+', '-']) {
            Some(at) => (&s[..at], Some(&s[at + 1..])),
            None => return false,
        }
    };
    if let Some(offset) = offset {
        let Some((hours, minutes)) = offset.split_once(':') else {
            return false;
        };
        match (digits(hours, 2), digits(minutes, 2)) {
            (Some(h), Some(m)) if h <= 23 && m <= 59 => {}
            _ => return false,
        }
    }
    let (clock, fraction) = match local.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (local, None),
    };
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    let mut parts = clock.split(':');
    let (Some(h), Some(m), Some(sec), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    match (digits(h, 2), digits(m, 2), digits(sec, 2)) {
        (Some(h), Some(m), Some(sec)) => h <= 23 && m <= 59 && sec <= 60,
        _ => false,
    }
}

fn is_date_time(s: &str) -> bool {
    match s.find(['T', 't']) {
        Some(at) => is_date(&s[..at]) && is_time(&s[at + 1..]),
        None => false,
    }
}

fn is_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty()
        && s.len() <= 253
        && s.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        })
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };
    if local.is_empty()
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
        || local.contains(char::is_whitespace)
    {
        return false;
    }
    match domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        Some(literal) => {
            literal.parse::<Ipv4Addr>().is_ok()
                || literal
                    .strip_prefix("IPv6:")
                    .map_or(false, |v6| v6.parse::<Ipv6Addr>().is_ok())
        }
        None => is_hostname(domain),
    }
}

fn is_uri(s: &str) -> bool {
    !s.contains(char::is_whitespace) && Url::parse(s).is_ok()
}

fn is_uri_reference(s: &str) -> bool {
    if s.contains(char::is_whitespace) || s.contains('\\') {
        return false;
    }
    Url::parse(DEFAULT_BASE_URI)
        .and_then(|base| base.join(s))
        .is_ok()
}

fn is_json_pointer(s: &str) -> bool {
    if !(s.is_empty() || s.starts_with('/')) {
        return false;
    }
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.next(), Some('0' | '1')) {
            return false;
        }
    }
    true
}
