//! Deterministic cache key derivation
//!
//! Keys follow `"<operation>:<sortedParams>"`, e.g.
//! `recommendations:user-1:limit=10|month=3|mood=comfort`. Parameter names are
//! sorted so the caller's insertion order never changes the key. When the key
//! would exceed [`MAX_KEY_LENGTH`], the parameter part is replaced with the
//! SHA-256 of the full key (`"<operation>:<digest>"`), keeping the operation
//! (and scope) prefix intact for prefix invalidation.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::constants::MAX_KEY_LENGTH;

/// Builder for cache keys
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: String,
    params: BTreeMap<String, String>,
}

impl CacheKeyBuilder {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            params: BTreeMap::new(),
        }
    }

    /// Narrow the operation to a scope (typically a user id). Scoped keys
    /// share the `"<operation>:<scope>:"` prefix.
    pub fn scope(mut self, scope: impl AsRef<str>) -> Self {
        self.operation.push(':');
        self.operation.push_str(&escape(scope.as_ref()));
        self
    }

    /// Add a parameter. A repeated name keeps the last value.
    pub fn param(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Add a parameter only when the value is present
    pub fn param_opt<T: Display>(self, name: impl Into<String>, value: Option<T>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    pub fn build(&self) -> String {
        let joined = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
            .collect::<Vec<_>>()
            .join("|");
        let key = format!("{}:{}", self.operation, joined);

        if key.len() <= MAX_KEY_LENGTH {
            return key;
        }

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{}:{}", self.operation, hex::encode(hasher.finalize()))
    }

    /// Prefix shared by every key built with this operation and scope
    pub fn prefix(operation: &str, scope: &str) -> String {
        format!("{}:{}:", operation, escape(scope))
    }
}

/// Escape the separator characters so distinct parameter sets never
/// concatenate to the same string
fn escape(raw: &str) -> String {
    if !raw.contains(['\\', '|', '=', ':']) {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 4);
    for c in raw.chars() {
        if matches!(c, '\\' | '|' | '=' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
