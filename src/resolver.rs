//! `${name}` placeholder resolution against the variable store.
//!
//! Resolution is a pure transform: the input template is never
//! mutated, and a missing variable leaves the placeholder literal
//! (with a warning) so partially-configured scenarios still execute
//! and fail at assertion time with a clear diagnostic instead of an
//! opaque resolution error.

use crate::store::VariableStore;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::warn;

// Matches ${name} and captures the variable name (group 1).
// Compiled once instead of per call.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(\w+)\}").expect("failed to compile placeholder regex")
});

/// Resolve every placeholder in a string.
///
/// Stored string values substitute verbatim; other values substitute
/// their compact JSON string form. Unknown names stay literal.
pub fn resolve_str(text: &str, store: &dyn VariableStore) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            match store.get(name) {
                Some(Value::String(s)) => s,
                Some(value) => value.to_string(),
                None => {
                    warn!("variable '{}' not found, leaving placeholder", name);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Resolve placeholders recursively through a JSON-shaped value.
///
/// Strings are scanned for `${name}`, mappings and sequences recurse
/// with key order preserved, and non-string scalars pass through
/// unchanged.
pub fn resolve(value: &Value, store: &dyn VariableStore) -> Value {
    match value {
        Value::String(text) => Value::String(resolve_str(text, store)),
        Value::Object(map) => {
            let mut resolved = Map::new();
            for (key, val) in map {
                resolved.insert(key.clone(), resolve(val, store));
            }
            Value::Object(resolved)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve(v, store)).collect())
        }
        other => other.clone(),
    }
}
