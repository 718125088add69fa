//! Flattening of nested documents into a single-level key space.
//!
//! ```text
//! {"database": {"host": "db", "ports": [5432, 5433]}}
//!     → DATABASE.HOST    = "db"
//!     → DATABASE.PORTS.0 = 5432
//!     → DATABASE.PORTS.1 = 5433
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::value::FlatValue;

/// Default path delimiter.
pub const DELIMITER: char = '.';

/// Alternative separator accepted in lookup keys (`database:host`).
pub const ALT_SEPARATOR: char = ':';

/// A flattened document: delimited key path → scalar.
pub type FlatMap = HashMap<String, FlatValue>;

/// Case folding applied to map keys while flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFold {
    #[default]
    Upper,
    Lower,
    Preserve,
}

impl KeyFold {
    fn apply(self, key: &str) -> String {
        match self {
            KeyFold::Upper => key.to_uppercase(),
            KeyFold::Lower => key.to_lowercase(),
            KeyFold::Preserve => key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlattenOptions {
    pub delimiter: char,
    pub fold: KeyFold,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            delimiter: DELIMITER,
            fold: KeyFold::Upper,
        }
    }
}

/// Flatten with the default delimiter and upper-case folding.
pub fn flatten(doc: &Value) -> FlatMap {
    flatten_with(doc, &FlattenOptions::default())
}

pub fn flatten_with(doc: &Value, options: &FlattenOptions) -> FlatMap {
    let mut out = FlatMap::new();
    let mut path = String::new();
    walk(doc, &mut path, options, &mut out);
    out
}

fn walk(value: &Value, path: &mut String, options: &FlattenOptions, out: &mut FlatMap) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let mark = path.len();
                push_segment(path, &options.fold.apply(key), options.delimiter);
                walk(child, path, options, out);
                path.truncate(mark);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let mark = path.len();
                push_segment(path, &index.to_string(), options.delimiter);
                walk(child, path, options, out);
                path.truncate(mark);
            }
        }
        scalar => {
            out.insert(path.clone(), scalar_value(scalar));
        }
    }
}

fn push_segment(path: &mut String, segment: &str, delimiter: char) {
    if !path.is_empty() {
        path.push(delimiter);
    }
    path.push_str(segment);
}

fn scalar_value(value: &Value) -> FlatValue {
    match value {
        Value::Bool(b) => FlatValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FlatValue::Integer(i),
            // u64 beyond i64::MAX and all non-integers land here
            None => FlatValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => FlatValue::String(s.clone()),
        _ => FlatValue::Null,
    }
}

/// Canonical form of a lookup key: trimmed, `:` mapped to the delimiter,
/// upper-cased.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| if c == ALT_SEPARATOR { DELIMITER } else { c })
        .collect::<String>()
        .to_uppercase()
}
