// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::error::{RtResult, RuntimeError};

/// One configuration leaf.
///
/// Durations are stored as strings (`"100ms"`) and parsed on access by
/// [`Config::get_duration`](super::Config::get_duration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Human-readable kind name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
        }
    }

    pub(crate) fn coerce_string(&self, path: &str) -> RtResult<String> {
        match self {
            Self::String(s) => Ok(s.clone()),
            Self::Int(i) => Ok(i.to_string()),
            Self::Float(f) => Ok(f.to_string()),
            Self::Bool(b) => Ok(b.to_string()),
            Self::List(_) => Err(type_error(path, "string", self)),
        }
    }

    pub(crate) fn coerce_int(&self, path: &str) -> RtResult<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| type_error(path, "int", self)),
            _ => Err(type_error(path, "int", self)),
        }
    }

    pub(crate) fn coerce_float(&self, path: &str) -> RtResult<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| type_error(path, "float", self)),
            _ => Err(type_error(path, "float", self)),
        }
    }

    pub(crate) fn coerce_bool(&self, path: &str) -> RtResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::String(s) => match s.trim() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(type_error(path, "bool", self)),
            },
            _ => Err(type_error(path, "bool", self)),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

fn type_error(path: &str, wanted: &str, found: &ConfigValue) -> RuntimeError {
    RuntimeError::BadConfig(format!(
        "{path}: expected {wanted}, found {} ({found:?})",
        found.kind()
    ))
}
