//! Activation gate.
//!
//! Deferred activation expressions contain `${key}` or `${key:default}`
//! placeholders. They are expanded against a [`PropertySource`] and the
//! result must be the token `true` or `false` (case-insensitive). Anything
//! else (a missing key, an empty value, `yes`, `1`) disables mirroring.

use std::collections::HashMap;
use std::sync::Arc;

use super::directive::Activation;

/// Read-only key/value lookup used to resolve activation placeholders.
pub trait PropertySource: Send + Sync {
    fn property(&self, key: &str) -> Option<String>;
}

/// Configured properties with an optional environment-variable fallback.
///
/// The fallback uses relaxed names: `mirror.books-enabled` is looked up as
/// `MIRROR_BOOKS_ENABLED`.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
    env_fallback: bool,
}

impl Properties {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values,
            env_fallback: true,
        }
    }

    /// Only the given values; the process environment is never consulted.
    pub fn isolated(values: HashMap<String, String>) -> Self {
        Self {
            values,
            env_fallback: false,
        }
    }
}

impl PropertySource for Properties {
    fn property(&self, key: &str) -> Option<String> {
        if let Some(value) = self.values.get(key) {
            return Some(value.clone());
        }
        if self.env_fallback {
            return std::env::var(env_key(key)).ok();
        }
        None
    }
}

fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Decides whether a directive is active for the current invocation.
#[derive(Clone)]
pub struct ActivationResolver {
    source: Arc<dyn PropertySource>,
}

impl ActivationResolver {
    pub fn new(source: Arc<dyn PropertySource>) -> Self {
        Self { source }
    }

    /// Never fails: ambiguous configuration resolves to `false`.
    pub fn resolve(&self, activation: &Activation) -> bool {
        let expression = match activation {
            Activation::Literal(value) => return *value,
            Activation::Deferred(expression) => expression,
        };

        let Some(expanded) = self.expand(expression) else {
            tracing::debug!(
                expression = %expression,
                "Activation placeholder unresolved, mirroring disabled"
            );
            return false;
        };

        match parse_flag(&expanded) {
            Some(flag) => flag,
            None => {
                tracing::debug!(
                    expression = %expression,
                    value = %expanded,
                    "Activation value is not a boolean, mirroring disabled"
                );
                false
            }
        }
    }

    /// Substitute every placeholder. `None` if one is unterminated or has
    /// neither a value nor a default.
    fn expand(&self, expression: &str) -> Option<String> {
        let mut out = String::with_capacity(expression.len());
        let mut rest = expression;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}')?;
            let inner = &after[..end];

            let (key, default) = match inner.split_once(':') {
                Some((key, default)) => (key, Some(default)),
                None => (inner, None),
            };
            let value = self
                .source
                .property(key.trim())
                .or_else(|| default.map(str::to_string))?;
            out.push_str(&value);

            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Some(out)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
