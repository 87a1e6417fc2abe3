//! Configuration types and loading logic.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use twins_tracing::TracingConfig;

use crate::mirror::RouteDirective;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwinsConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default)]
    pub tracing: TracingConfig,

    /// Values referenced by `${key}` activation expressions. Nested tables
    /// are flattened with dots, so `[properties.books] enabled = true` is
    /// the key `books.enabled`.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,

    /// Mirror directives, one per `[[routes]]` table.
    #[serde(default)]
    pub routes: Vec<RouteDirective>,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Mirror dispatch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Upper bound for one dispatch unit (handler run or remote exchange).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Dispatch units allowed to run at once; the rest wait for a slot.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Requests with larger bodies are served but not mirrored.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// How long shutdown waits for in-flight mirrors.
    #[serde(default = "default_drain")]
    pub drain_secs: u64,
}

/// A scalar or table under `[properties]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Table(BTreeMap<String, PropertyValue>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Text(v) => f.write_str(v),
            PropertyValue::Table(_) => f.write_str("[table]"),
        }
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    64
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_drain() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_concurrent: default_max_concurrent(),
            max_body_bytes: default_max_body_bytes(),
            drain_secs: default_drain(),
        }
    }
}

impl TwinsConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (TWINS_ prefix, __ for nesting)
    /// 2. TOML config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(config_path))
                .merge(Env::prefixed("TWINS_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        Ok(figment.extract()?)
    }

    /// Properties as flat `dotted.key → string` pairs.
    pub fn flat_properties(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        flatten_into(&mut out, None, &self.properties);
        out
    }
}

fn flatten_into(
    out: &mut HashMap<String, String>,
    prefix: Option<&str>,
    table: &BTreeMap<String, PropertyValue>,
) {
    for (key, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            PropertyValue::Table(nested) => flatten_into(out, Some(&key), nested),
            scalar => {
                out.insert(key, scalar.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::Activation;

    const SAMPLE: &str = r#"
        [server]
        listen_address = "127.0.0.1:9000"

        [mirror]
        timeout_secs = 3

        [properties]
        "orders.enabled" = "false"

        [properties.books]
        enabled = true
        sample-rate = 0.5

        [[routes]]
        method = "GET"
        path = "/books"
        local = ["reportingAgent"]
        active = "${books.enabled}"

        [[routes]]
        method = "POST"
        path = "/books"
        local = ["requestLogger", "reportingAgent"]
        remote = ["https://example.test/a", "https://example.test/b"]
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = TwinsConfig::from_figment(Figment::new().merge(Toml::string(SAMPLE))).unwrap();

        assert_eq!(config.server.listen_address, "127.0.0.1:9000");
        assert_eq!(config.mirror.timeout_secs, 3);
        assert_eq!(config.mirror.max_concurrent, 64);
        assert_eq!(config.routes.len(), 2);

        let get = &config.routes[0];
        assert_eq!(
            get.directive.activation,
            Activation::Deferred("${books.enabled}".to_string())
        );
        let post = &config.routes[1];
        assert_eq!(post.directive.activation, Activation::Literal(true));
        assert_eq!(post.directive.remote_destinations.len(), 2);
    }

    #[test]
    fn test_properties_flatten_to_dotted_keys() {
        let config = TwinsConfig::from_figment(Figment::new().merge(Toml::string(SAMPLE))).unwrap();
        let props = config.flat_properties();

        assert_eq!(props.get("books.enabled").map(String::as_str), Some("true"));
        assert_eq!(props.get("books.sample-rate").map(String::as_str), Some("0.5"));
        assert_eq!(props.get("orders.enabled").map(String::as_str), Some("false"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TwinsConfig::from_figment(Figment::new()).unwrap();
        assert_eq!(config.server.listen_address, "0.0.0.0:8080");
        assert_eq!(config.mirror.timeout_secs, 10);
        assert_eq!(config.mirror.max_body_bytes, 10 * 1024 * 1024);
        assert!(config.routes.is_empty());
        assert!(config.properties.is_empty());
    }
}
