//! Identifier and reference rewriting over untyped JSON records
//!
//! Rewrites are expressed as a [`StringRule`] applied by [`walk`], a visitor
//! over every kind of JSON value. The walker owns the traversal; rules only
//! see one string at a time together with the key it sits under.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// A rewrite applied to every string leaf of a record
pub trait StringRule {
    /// Returns the replacement for `value`, or `None` to leave it alone
    ///
    /// `key` is the name of the nearest enclosing object field. Array items
    /// inherit the key of the field holding the array.
    fn rewrite(&self, key: Option<&str>, value: &str) -> Option<String>;
}

/// Applies `rule` to every string in `value`, returning the number of rewrites
pub fn walk<R: StringRule + ?Sized>(value: &mut Value, rule: &R) -> usize {
    walk_keyed(value, None, rule)
}

fn walk_keyed<R: StringRule + ?Sized>(value: &mut Value, key: Option<&str>, rule: &R) -> usize {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
        Value::String(s) => match rule.rewrite(key, s) {
            Some(replacement) => {
                *s = replacement;
                1
            }
            None => 0,
        },
        Value::Array(items) => items
            .iter_mut()
            .map(|item| walk_keyed(item, key, rule))
            .sum(),
        Value::Object(map) => map
            .iter_mut()
            .map(|(k, v)| walk_keyed(v, Some(k.as_str()), rule))
            .sum(),
    }
}

/// `<ResourceType>/<digits>`
fn relative_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z][A-Za-z]*)/([0-9]+)$").unwrap())
}

/// Values that already carry a bundle-local or absolute identity
pub(crate) fn is_absolute_identity(value: &str) -> bool {
    value.starts_with("urn:uuid:") || value.starts_with("http://") || value.starts_with("https://")
}

/// Keys whose bare-digit values are treated as identifiers
///
/// Deliberately narrow: other numeric strings (quantities, codes, phone
/// fragments) are left untouched.
pub fn is_identifier_key(key: Option<&str>) -> bool {
    matches!(key, Some("id") | Some("reference"))
}

/// Keys whose values are never rewritten
fn is_exempt_key(key: Option<&str>) -> bool {
    matches!(key, Some("code") | Some("versionId"))
}

/// De-identifies numeric ids and relative references with a fixed prefix
///
/// - `Patient/5` becomes `Patient/ABC-5` anywhere in the record
/// - `5` becomes `ABC-5` under an `id` or `reference` key
///
/// Applying the rule twice gives the same result as applying it once.
#[derive(Debug, Clone)]
pub struct IdentifierRewrite {
    prefix: String,
}

impl IdentifierRewrite {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Rewrites one record in place, returning the number of changed values
    pub fn apply(&self, record: &mut Value) -> usize {
        walk(record, self)
    }
}

impl StringRule for IdentifierRewrite {
    fn rewrite(&self, key: Option<&str>, value: &str) -> Option<String> {
        if is_exempt_key(key) || is_absolute_identity(value) {
            return None;
        }

        if let Some(caps) = relative_reference_regex().captures(value) {
            return Some(format!("{}/{}-{}", &caps[1], self.prefix, &caps[2]));
        }

        if is_identifier_key(key) && !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
        {
            return Some(format!("{}-{value}", self.prefix));
        }

        None
    }
}
