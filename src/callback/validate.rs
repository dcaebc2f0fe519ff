//! Callback entry validation.
//!
//! Turns raw callback-file entries into [`CallbackSpec`]s. Out-of-domain
//! values are replaced by defaults and unknown fields are stripped; only
//! an entry without a URL is rejected.

use serde_json::{Map, Value};
use std::fmt;

use super::{CallbackMethod, CallbackSpec, CallbackType, ContentType, Dataset};

/// Fields kept from a callback entry
pub const RECOGNIZED_FIELDS: [&str; 6] = ["type", "token", "url", "dataset", "method", "content-type"];

/// A change applied to make an entry valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// A field was missing or outside its domain and got its default
    Defaulted {
        field: &'static str,
        found: Option<String>,
        default: &'static str,
    },
    /// The token was not a string and was removed
    TokenDropped,
    /// Fields outside the recognized set were removed
    Stripped(Vec<String>),
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::Defaulted {
                field,
                found: Some(found),
                default,
            } => write!(f, "invalid {} '{}', using '{}'", field, found, default),
            Repair::Defaulted {
                field,
                found: None,
                default,
            } => write!(f, "no {}, using '{}'", field, default),
            Repair::TokenDropped => f.write_str("token is not a string, removed"),
            Repair::Stripped(keys) => write!(f, "unknown fields removed: {}", keys.join(", ")),
        }
    }
}

/// Why an entry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotAnObject,
    MissingUrl,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAnObject => f.write_str("entry is not a table"),
            Rejection::MissingUrl => f.write_str("no url"),
        }
    }
}

/// Result of validating one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub result: Result<CallbackSpec, Rejection>,
    pub repairs: Vec<Repair>,
}

/// Result of validating a callback list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackValidation {
    /// Valid callbacks in input order
    pub callbacks: Vec<CallbackSpec>,
    /// Repairs by entry index
    pub repairs: Vec<(usize, Repair)>,
    /// Dropped entries by index
    pub rejected: Vec<(usize, Rejection)>,
}

impl CallbackValidation {
    /// False when nothing survived validation.
    pub fn has_valid(&self) -> bool {
        !self.callbacks.is_empty()
    }
}

/// Validate a list of raw callback entries.
pub fn validate_callbacks(entries: &[Value]) -> CallbackValidation {
    let mut validation = CallbackValidation::default();
    for (index, entry) in entries.iter().enumerate() {
        let outcome = validate_entry(entry);
        validation
            .repairs
            .extend(outcome.repairs.into_iter().map(|r| (index, r)));
        match outcome.result {
            Ok(spec) => validation.callbacks.push(spec),
            Err(rejection) => validation.rejected.push((index, rejection)),
        }
    }
    validation
}

/// Validate a single raw callback entry.
pub fn validate_entry(entry: &Value) -> EntryOutcome {
    let map = match entry.as_object() {
        Some(map) => map,
        None => {
            return EntryOutcome {
                result: Err(Rejection::NotAnObject),
                repairs: Vec::new(),
            }
        }
    };

    let url = match map.get("url").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            return EntryOutcome {
                result: Err(Rejection::MissingUrl),
                repairs: Vec::new(),
            }
        }
    };

    let mut repairs = Vec::new();

    let method = field(map, "method", CallbackMethod::parse, "POST", &mut repairs)
        .unwrap_or(CallbackMethod::Post);
    let kind = field(map, "type", CallbackType::parse, "custom", &mut repairs)
        .unwrap_or(CallbackType::Custom);
    let dataset =
        field(map, "dataset", Dataset::parse, "all", &mut repairs).unwrap_or(Dataset::All);
    let content_type = field(map, "content-type", ContentType::parse, "json", &mut repairs)
        .unwrap_or_else(ContentType::json);

    let token = match map.get("token") {
        None | Some(Value::Null) => None,
        Some(Value::String(token)) => Some(token.clone()),
        Some(_) => {
            repairs.push(Repair::TokenDropped);
            None
        }
    };

    let unknown: Vec<String> = map
        .keys()
        .filter(|k| !RECOGNIZED_FIELDS.contains(&k.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        repairs.push(Repair::Stripped(unknown));
    }

    EntryOutcome {
        result: Ok(CallbackSpec {
            kind,
            token,
            url,
            dataset,
            method: Some(method),
            content_type: Some(content_type),
            name: None,
        }),
        repairs,
    }
}

/// Parse an enumerated field, recording a repair when it is unusable.
fn field<T>(
    map: &Map<String, Value>,
    name: &'static str,
    parse: impl Fn(&str) -> Option<T>,
    default: &'static str,
    repairs: &mut Vec<Repair>,
) -> Option<T> {
    let raw = map.get(name).filter(|v| !v.is_null());
    let parsed = raw.and_then(Value::as_str).and_then(&parse);
    if parsed.is_none() {
        repairs.push(Repair::Defaulted {
            field: name,
            found: raw.map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            default,
        });
    }
    parsed
}
