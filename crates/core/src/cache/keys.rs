//! Cache key derivation.
//!
//! Keys have the shape `{tag}:{operation}_{hash}` where `hash` is a 128-bit
//! digest of the canonical form of the call arguments. Two calls with
//! semantically equal arguments always produce the same key, regardless of
//! argument order, mapping insertion order, or blank (null/empty) arguments.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Separates the tag from the rest of a cache key.
pub const TAG_DELIMITER: char = ':';

/// Canonical-form conversion every cache key argument must provide.
///
/// Implemented for every [`Serialize`] type. A value whose serialization
/// fails falls back to a token identifying the instance itself, which is
/// unique but not stable across calls.
pub trait KeyPart {
    /// Converts the value into the JSON form hashed into cache keys.
    fn key_value(&self) -> Value;
}

impl<T: Serialize + ?Sized> KeyPart for T {
    fn key_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(error = %err, "Key argument has no canonical form, using identity");
                Value::String(format!("#instance:{self:p}"))
            }
        }
    }
}

/// Named arguments of a repository call, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyArgs {
    args: Vec<(&'static str, Value)>,
}

impl KeyArgs {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named argument.
    pub fn arg<T: KeyPart + ?Sized>(mut self, name: &'static str, value: &T) -> Self {
        self.args.push((name, value.key_value()));
        self
    }

    /// Returns the canonical text hashed into the key.
    ///
    /// Blank arguments are dropped, the rest are ordered by name and every
    /// mapping is written with sorted keys.
    pub fn canonical(&self) -> String {
        let mut kept: Vec<&(&'static str, Value)> =
            self.args.iter().filter(|(_, value)| !is_blank(value)).collect();
        kept.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = String::from("{");
        for (i, (name, value)) in kept.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&Value::from(*name).to_string());
            out.push(':');
            write_canonical(value, &mut out);
        }
        out.push('}');
        out
    }

    /// Returns the hex encoded 128-bit digest of [`Self::canonical`].
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.canonical().as_bytes());
        hex::encode(&hash[..16])
    }
}

/// Null, empty lists and empty mappings mean "nothing supplied".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Derives the cache key for `operation` called with `args` under `tag`.
///
/// # Examples
///
/// ```
/// use repocache_core::cache::{derive_key, KeyArgs};
/// use serde_json::json;
///
/// let a = derive_key("Users", "filter", &KeyArgs::new().arg("filters", &json!({"a": 1, "b": 2})));
/// let b = derive_key("Users", "filter", &KeyArgs::new().arg("filters", &json!({"b": 2, "a": 1})));
/// assert_eq!(a, b);
/// assert!(a.starts_with("Users:filter_"));
/// ```
pub fn derive_key(tag: &str, operation: &str, args: &KeyArgs) -> String {
    format!("{tag}{TAG_DELIMITER}{operation}_{}", args.digest())
}

/// Returns the tag a key was derived under, if any.
///
/// # Examples
///
/// ```
/// use repocache_core::cache::tag_of_key;
///
/// assert_eq!(tag_of_key("Users:count_abc"), Some("Users"));
/// assert_eq!(tag_of_key("plain-key"), None);
/// ```
pub fn tag_of_key(key: &str) -> Option<&str> {
    key.split_once(TAG_DELIMITER)
        .map(|(tag, _)| tag)
        .filter(|tag| !tag.is_empty())
}

/// Returns the key of the set tracking every cache key written under `tag`.
pub fn tag_index_key(prefix: &str, tag: &str) -> String {
    format!("{prefix}tag{TAG_DELIMITER}{tag}{TAG_DELIMITER}keys")
}

/// Strips module paths from a type name, including inside generics.
///
/// # Examples
///
/// ```
/// use repocache_core::cache::short_type_name;
///
/// assert_eq!(
///     short_type_name("app::storage::InMemoryRepository<app::models::User>"),
///     "InMemoryRepository<User>"
/// );
/// ```
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' {
            segment.push(c);
        } else if c == TAG_DELIMITER {
            segment.clear();
        } else {
            out.push_str(&segment);
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(&segment);
    out
}

/// Returns the tag used for entries cached on behalf of `T`.
pub fn type_tag<T: ?Sized>() -> String {
    short_type_name(std::any::type_name::<T>())
}
