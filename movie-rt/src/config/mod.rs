//! Layered runtime configuration.
//!
//! A [`Config`] is an immutable snapshot of dotted string keys mapped to
//! typed leaves. Layers compose with [`Config::with_fallback`] (self wins)
//! and [`Config::with_env_overrides`] (environment wins), so the usual
//! stack is:
//!
//! ```text
//! defaults  <-  file  <-  environment
//! ```
//!
//! ```rust
//! use movie_rt::config::Config;
//!
//! let file = Config::from_toml_str("name = \"demo\"\n[remoting]\nport = 8000\n").unwrap();
//! let config = file.with_fallback(&Config::runtime_defaults());
//! assert_eq!(config.get_string("name").unwrap(), "demo");
//! assert_eq!(config.get_int("remoting.port").unwrap(), 8000);
//! // untouched paths come from the defaults layer
//! assert_eq!(config.get_string("remoting.host").unwrap(), "127.0.0.1");
//! ```

pub mod value;

pub use value::ConfigValue;

// Layer 1: Standard library imports
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// Layer 2: Third-party crate imports
// (toml used via fully qualified paths)

// Layer 3: Internal module imports
use crate::error::{RtResult, RuntimeError};

/// Default environment-variable prefix for overrides.
pub const DEFAULT_ENV_PREFIX: &str = "MOVIE_";

/// Immutable configuration snapshot.
///
/// Keys are dotted paths (`remoting.port`); values are [`ConfigValue`]
/// leaves. All `with_*` combinators return a new snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    entries: BTreeMap<String, ConfigValue>,
}

impl Config {
    /// An empty configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The runtime's built-in defaults (lowest layer).
    pub fn runtime_defaults() -> Self {
        let mut c = Self::empty();
        c.put("name", ConfigValue::String(String::new()));
        c.put("supervision.strategy", ConfigValue::String("restart".into()));
        c.put("supervision.max-restarts", ConfigValue::Int(3));
        c.put("supervision.within", ConfigValue::String("1m".into()));
        c.put("supervision.backoff.min", ConfigValue::String("100ms".into()));
        c.put("supervision.backoff.max", ConfigValue::String("10s".into()));
        c.put("supervision.backoff.factor", ConfigValue::Float(2.0));
        c.put("system.mailbox-capacity", ConfigValue::Int(1024));
        c.put("system.shutdown-timeout", ConfigValue::String("30s".into()));
        c.put("remoting.enabled", ConfigValue::Bool(false));
        c.put("remoting.host", ConfigValue::String("127.0.0.1".into()));
        c.put("remoting.port", ConfigValue::Int(0));
        c.put("remoting.stripes", ConfigValue::Int(0));
        c.put("remoting.max-frame-bytes", ConfigValue::Int(16 * 1024 * 1024));
        c.put("remoting.heartbeat-interval", ConfigValue::String("2s".into()));
        c.put("remoting.heartbeat-timeout", ConfigValue::String("6s".into()));
        c.put("remoting.connect-buffer", ConfigValue::Int(1024));
        c
    }

    /// Parse a TOML document into a configuration layer.
    ///
    /// Tables become dotted prefixes, scalars become leaves.
    pub fn from_toml_str(input: &str) -> RtResult<Self> {
        let value: toml::Value = toml::from_str(input)
            .map_err(|e| RuntimeError::BadConfig(format!("invalid TOML: {e}")))?;
        let mut entries = BTreeMap::new();
        flatten_toml("", &value, &mut entries)?;
        Ok(Self { entries })
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> RtResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RuntimeError::BadConfig(format!(
                "cannot read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Return a copy with one leaf set (self wins over the previous value).
    pub fn with_value(mut self, path: &str, value: ConfigValue) -> Self {
        self.put(path, value);
        self
    }

    fn put(&mut self, path: &str, value: ConfigValue) {
        self.entries.insert(path.to_string(), value);
    }

    /// Whether a leaf or subtree exists at `path`.
    pub fn has_path(&self, path: &str) -> bool {
        if self.entries.contains_key(path) {
            return true;
        }
        let prefix = format!("{path}.");
        self.entries.range(prefix.clone()..).next().is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Raw leaf lookup.
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        self.entries.get(path)
    }

    /// String accessor; scalar leaves coerce to their display form.
    pub fn get_string(&self, path: &str) -> RtResult<String> {
        self.require(path)?.coerce_string(path)
    }

    /// String accessor with a default for missing paths.
    pub fn get_string_or(&self, path: &str, default: &str) -> RtResult<String> {
        match self.entries.get(path) {
            Some(v) => v.coerce_string(path),
            None => Ok(default.to_string()),
        }
    }

    /// Integer accessor; string leaves are parsed.
    pub fn get_int(&self, path: &str) -> RtResult<i64> {
        self.require(path)?.coerce_int(path)
    }

    /// Integer accessor with a default for missing paths.
    pub fn get_int_or(&self, path: &str, default: i64) -> RtResult<i64> {
        match self.entries.get(path) {
            Some(v) => v.coerce_int(path),
            None => Ok(default),
        }
    }

    /// Float accessor; integers and string leaves coerce.
    pub fn get_float(&self, path: &str) -> RtResult<f64> {
        self.require(path)?.coerce_float(path)
    }

    /// Float accessor with a default for missing paths.
    pub fn get_float_or(&self, path: &str, default: f64) -> RtResult<f64> {
        match self.entries.get(path) {
            Some(v) => v.coerce_float(path),
            None => Ok(default),
        }
    }

    /// Bool accessor; `"true"`/`"false"` string leaves coerce.
    pub fn get_bool(&self, path: &str) -> RtResult<bool> {
        self.require(path)?.coerce_bool(path)
    }

    /// Bool accessor with a default for missing paths.
    pub fn get_bool_or(&self, path: &str, default: bool) -> RtResult<bool> {
        match self.entries.get(path) {
            Some(v) => v.coerce_bool(path),
            None => Ok(default),
        }
    }

    /// Duration accessor: `"<n><unit>"` with units `ms`, `s`, `m`, `h`.
    pub fn get_duration(&self, path: &str) -> RtResult<Duration> {
        let raw = self.get_string(path)?;
        parse_duration(&raw)
            .map_err(|e| RuntimeError::BadConfig(format!("{path}: {e}")))
    }

    /// Duration accessor with a default for missing paths.
    pub fn get_duration_or(&self, path: &str, default: Duration) -> RtResult<Duration> {
        if !self.entries.contains_key(path) {
            return Ok(default);
        }
        self.get_duration(path)
    }

    /// List accessor.
    pub fn get_list(&self, path: &str) -> RtResult<Vec<ConfigValue>> {
        match self.require(path)? {
            ConfigValue::List(items) => Ok(items.clone()),
            other => Err(RuntimeError::BadConfig(format!(
                "{path}: expected list, found {}",
                other.kind()
            ))),
        }
    }

    /// Subtree view: every leaf under `prefix.`, with the prefix stripped.
    pub fn get_config(&self, prefix: &str) -> Self {
        let dotted = format!("{prefix}.");
        let entries = self
            .entries
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(&dotted)
                    .map(|rest| (rest.to_string(), v.clone()))
            })
            .collect();
        Self { entries }
    }

    /// Merge with a lower-priority layer; `self` wins.
    ///
    /// Every leaf present in `self` shadows `other`, including whole
    /// subtrees: a leaf in `self` at `a.b` hides `other`'s leaves below
    /// `a.b.`, and a subtree in `self` under `a.b.` hides a leaf in
    /// `other` at `a.b`. Subtrees never partially merge at non-leaf
    /// values.
    pub fn with_fallback(&self, other: &Self) -> Self {
        let mut merged = self.entries.clone();
        for (key, value) in &other.entries {
            if self.shadows(key) {
                continue;
            }
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Self { entries: merged }
    }

    /// Whether `self` structurally hides `key` from a fallback layer.
    fn shadows(&self, key: &str) -> bool {
        // a leaf at some prefix of `key` hides the deeper fallback leaf
        let mut idx = 0;
        while let Some(dot) = key[idx..].find('.') {
            let prefix = &key[..idx + dot];
            if self.entries.contains_key(prefix) {
                return true;
            }
            idx += dot + 1;
        }
        // a subtree below `key.` hides the fallback leaf at `key`
        let prefix = format!("{key}.");
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    /// Overlay process environment variables starting with `prefix`.
    ///
    /// `MOVIE_REMOTING_PORT=9001` becomes the string leaf
    /// `remoting.port = "9001"` (typed accessors coerce on read).
    pub fn with_env_overrides(&self, prefix: &str) -> Self {
        self.with_env_overrides_from(prefix, std::env::vars())
    }

    /// Environment overlay from an explicit variable iterator (testable).
    pub fn with_env_overrides_from<I>(&self, prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut out = self.clone();
        for (name, value) in vars {
            if let Some(rest) = name.strip_prefix(prefix) {
                if rest.is_empty() {
                    continue;
                }
                let key = rest.to_lowercase().replace('_', ".");
                out.put(&key, ConfigValue::String(value));
            }
        }
        out
    }

    /// Number of leaves in this snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this snapshot has no leaves.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn require(&self, path: &str) -> RtResult<&ConfigValue> {
        self.entries
            .get(path)
            .ok_or_else(|| RuntimeError::BadConfig(format!("missing config path: {path}")))
    }
}

/// Parse a duration literal: `"250ms"`, `"3s"`, `"2m"`, `"1h"`.
pub fn parse_duration(input: &str) -> RtResult<Duration> {
    let trimmed = input.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(digits_end);
    let n: u64 = number
        .parse()
        .map_err(|_| RuntimeError::BadConfig(format!("invalid duration literal: {input:?}")))?;
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        _ => Err(RuntimeError::BadConfig(format!(
            "unknown duration unit {unit:?} in {input:?}"
        ))),
    }
}

fn flatten_toml(
    prefix: &str,
    value: &toml::Value,
    out: &mut BTreeMap<String, ConfigValue>,
) -> RtResult<()> {
    match value {
        toml::Value::Table(table) => {
            for (key, inner) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_toml(&path, inner, out)?;
            }
            Ok(())
        }
        other => {
            let leaf = toml_leaf(prefix, other)?;
            out.insert(prefix.to_string(), leaf);
            Ok(())
        }
    }
}

fn toml_leaf(path: &str, value: &toml::Value) -> RtResult<ConfigValue> {
    match value {
        toml::Value::String(s) => Ok(ConfigValue::String(s.clone())),
        toml::Value::Integer(i) => Ok(ConfigValue::Int(*i)),
        toml::Value::Float(f) => Ok(ConfigValue::Float(*f)),
        toml::Value::Boolean(b) => Ok(ConfigValue::Bool(*b)),
        toml::Value::Datetime(dt) => Ok(ConfigValue::String(dt.to_string())),
        toml::Value::Array(items) => {
            let list = items
                .iter()
                .map(|item| toml_leaf(path, item))
                .collect::<RtResult<Vec<_>>>()?;
            Ok(ConfigValue::List(list))
        }
        toml::Value::Table(_) => Err(RuntimeError::BadConfig(format!(
            "{path}: tables inside arrays are not supported"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_surface() {
        let c = Config::runtime_defaults();
        assert_eq!(c.get_string("name").unwrap(), "");
        assert_eq!(c.get_string("supervision.strategy").unwrap(), "restart");
        assert_eq!(c.get_int("supervision.max-restarts").unwrap(), 3);
        assert_eq!(
            c.get_duration("supervision.within").unwrap(),
            Duration::from_secs(60)
        );
        assert!(!c.get_bool("remoting.enabled").unwrap());
        assert_eq!(c.get_int("remoting.port").unwrap(), 0);
        assert_eq!(
            c.get_duration("remoting.heartbeat-interval").unwrap(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_has_path_leaf_and_subtree() {
        let c = Config::runtime_defaults();
        assert!(c.has_path("remoting.port"));
        assert!(c.has_path("remoting"));
        assert!(c.has_path("supervision.backoff"));
        assert!(!c.has_path("remoting.portal"));
        assert!(!c.has_path("nope"));
    }

    #[test]
    fn test_toml_layer() {
        let c = Config::from_toml_str(
            r#"
            name = "yaml"

            [remoting]
            port = 8000
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(c.get_string("name").unwrap(), "yaml");
        assert_eq!(c.get_int("remoting.port").unwrap(), 8000);
        assert!(c.get_bool("remoting.enabled").unwrap());
    }

    #[test]
    fn test_fallback_self_wins() {
        let file = Config::from_toml_str("name = \"yaml\"\n[remoting]\nport = 8000\n").unwrap();
        let merged = file.with_fallback(&Config::runtime_defaults());

        assert_eq!(merged.get_string("name").unwrap(), "yaml");
        assert_eq!(merged.get_int("remoting.port").unwrap(), 8000);
        // only present in the fallback layer
        assert_eq!(merged.get_string("remoting.host").unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_fallback_no_partial_subtree_merge() {
        // self carries a leaf where other has a subtree: the subtree is hidden
        let upper = Config::empty().with_value("a.b", ConfigValue::Int(1));
        let lower = Config::empty()
            .with_value("a.b.c", ConfigValue::Int(2))
            .with_value("a.other", ConfigValue::Int(3));
        let merged = upper.with_fallback(&lower);
        assert_eq!(merged.get_int("a.b").unwrap(), 1);
        assert!(!merged.has_path("a.b.c"));
        assert_eq!(merged.get_int("a.other").unwrap(), 3);

        // self carries a subtree where other has a leaf: the leaf is hidden
        let upper = Config::empty().with_value("a.b.c", ConfigValue::Int(4));
        let lower = Config::empty().with_value("a.b", ConfigValue::Int(5));
        let merged = upper.with_fallback(&lower);
        assert_eq!(merged.get_int("a.b.c").unwrap(), 4);
        assert!(merged.get("a.b").is_none());
    }

    #[test]
    fn test_env_overlay() {
        let vars = vec![
            ("MOVIE_REMOTING_PORT".to_string(), "9001".to_string()),
            ("MOVIE_NAME".to_string(), "env-sys".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let c = Config::runtime_defaults().with_env_overrides_from("MOVIE_", vars);
        assert_eq!(c.get_int("remoting.port").unwrap(), 9001);
        assert_eq!(c.get_string("name").unwrap(), "env-sys");
        assert!(!c.has_path("unrelated"));
    }

    #[test]
    fn test_layering_scenario() {
        // defaults <- file <- env, as a full stack
        let file = Config::from_toml_str("name = \"yaml\"\n[remoting]\nport = 8000\n").unwrap();
        let vars = vec![("MOVIE_REMOTING_PORT".to_string(), "9001".to_string())];
        let effective = file
            .with_fallback(&Config::runtime_defaults())
            .with_env_overrides_from("MOVIE_", vars);

        assert_eq!(effective.get_string("name").unwrap(), "yaml");
        assert_eq!(effective.get_int("remoting.port").unwrap(), 9001);
        assert_eq!(effective.get_string("remoting.host").unwrap(), "127.0.0.1");
        assert!(!effective.get_bool("remoting.enabled").unwrap());
    }

    #[test]
    fn test_get_config_subtree() {
        let c = Config::runtime_defaults().get_config("supervision");
        assert_eq!(c.get_int("max-restarts").unwrap(), 3);
        assert_eq!(c.get_string("backoff.min").unwrap(), "100ms");
        assert!(!c.has_path("remoting.port"));
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_duration_unknown_unit_fails() {
        assert!(matches!(
            parse_duration("5d"),
            Err(RuntimeError::BadConfig(_))
        ));
        assert!(matches!(
            parse_duration("abc"),
            Err(RuntimeError::BadConfig(_))
        ));
        assert!(matches!(parse_duration(""), Err(RuntimeError::BadConfig(_))));
    }

    #[test]
    fn test_typed_coercion_from_env_strings() {
        let vars = vec![
            ("MOVIE_REMOTING_ENABLED".to_string(), "true".to_string()),
            (
                "MOVIE_SUPERVISION_WITHIN".to_string(),
                "30s".to_string(),
            ),
        ];
        let c = Config::runtime_defaults().with_env_overrides_from("MOVIE_", vars);
        assert!(c.get_bool("remoting.enabled").unwrap());
        assert_eq!(
            c.get_duration("supervision.within").unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_missing_path_error() {
        let c = Config::empty();
        assert!(matches!(
            c.get_int("nope"),
            Err(RuntimeError::BadConfig(_))
        ));
        assert_eq!(c.get_int_or("nope", 7).unwrap(), 7);
    }

    #[test]
    fn test_list_values() {
        let c = Config::from_toml_str("seeds = [\"a\", \"b\"]\n").unwrap();
        let list = c.get_list("seeds").unwrap();
        assert_eq!(list.len(), 2);
    }
}
