//! Format detection and decoding of file contents into a nested document.
//!
//! Every format is normalized to `serde_json::Value` so the flattener sees a
//! single document model. YAML mapping keys that are not strings are
//! stringified; TOML datetimes become strings.

use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::error::{ConfigError, Result};

/// File formats selected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    /// Select the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "yml" | "yaml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }
}

/// Decode `content` read from `path`.
///
/// The root must be a map or sequence; an empty YAML document decodes to an
/// empty map.
pub fn decode(format: Format, content: &str, path: &Path) -> Result<Value> {
    let unparseable = |reason: String| ConfigError::SourceUnparseable {
        path: path.to_path_buf(),
        reason,
    };

    let doc = match format {
        Format::Json => serde_json::from_str::<Value>(content).map_err(|e| unparseable(e.to_string()))?,
        Format::Yaml => {
            let yaml = serde_yaml::from_str::<serde_yaml::Value>(content)
                .map_err(|e| unparseable(e.to_string()))?;
            from_yaml(yaml)
        }
        Format::Toml => {
            let table = toml::from_str::<toml::Table>(content).map_err(|e| unparseable(e.to_string()))?;
            from_toml(toml::Value::Table(table))
        }
    };

    match doc {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) | Value::Array(_) => Ok(doc),
        other => Err(unparseable(format!("document root is a scalar ({})", other))),
    }
}

fn from_yaml(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().and_then(Number::from_f64).map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(from_yaml).collect()),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, child) in mapping {
                map.insert(yaml_key(key), from_yaml(child));
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

pub(crate) fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, from_toml(v))).collect())
        }
    }
}
