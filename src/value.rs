//! Scalar leaf values of a flattened document.
//!
//! # Coercion
//! Typed accessors on the configuration perform best-effort conversion:
//! - numbers parse from numeric strings
//! - integers accept integral floats
//! - bools accept `true/false/yes/no/on/off/1/0` in any case
//! - strings render any non-null scalar

use std::fmt;

use serde::Serialize;

/// A leaf scalar stored under a flat key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlatValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl FlatValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FlatValue::Null)
    }

    /// Render as a string. `Null` has no string form.
    pub fn as_string(&self) -> Option<String> {
        match self {
            FlatValue::Null => None,
            FlatValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlatValue::Integer(i) => Some(*i),
            FlatValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                if *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            FlatValue::Bool(b) => Some(i64::from(*b)),
            FlatValue::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| FlatValue::Float(s.parse().ok()?).as_i64())
            }
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FlatValue::String(s) => s.trim().parse::<u64>().ok(),
            other => other.as_i64().and_then(|i| u64::try_from(i).ok()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FlatValue::Float(f) => Some(*f),
            FlatValue::Integer(i) => Some(*i as f64),
            FlatValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlatValue::Bool(b) => Some(*b),
            FlatValue::Integer(0) => Some(false),
            FlatValue::Integer(1) => Some(true),
            FlatValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for FlatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatValue::Null => write!(f, "null"),
            FlatValue::Bool(b) => write!(f, "{}", b),
            FlatValue::Integer(i) => write!(f, "{}", i),
            FlatValue::Float(x) => write!(f, "{}", x),
            FlatValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FlatValue {
    fn from(s: &str) -> Self {
        FlatValue::String(s.to_string())
    }
}

impl From<String> for FlatValue {
    fn from(s: String) -> Self {
        FlatValue::String(s)
    }
}

impl From<i64> for FlatValue {
    fn from(i: i64) -> Self {
        FlatValue::Integer(i)
    }
}

impl From<f64> for FlatValue {
    fn from(f: f64) -> Self {
        FlatValue::Float(f)
    }
}

impl From<bool> for FlatValue {
    fn from(b: bool) -> Self {
        FlatValue::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_coercion() {
        assert_eq!(FlatValue::from("42").as_i64(), Some(42));
        assert_eq!(FlatValue::from(" 7 ").as_i64(), Some(7));
        assert_eq!(FlatValue::from(3.0).as_i64(), Some(3));
        assert_eq!(FlatValue::from("3.0").as_i64(), Some(3));
        assert_eq!(FlatValue::from(3.5).as_i64(), None);
        assert_eq!(FlatValue::from("abc").as_i64(), None);
        assert_eq!(FlatValue::Null.as_i64(), None);
    }

    #[test]
    fn test_unsigned_rejects_negative() {
        assert_eq!(FlatValue::from(-1).as_u64(), None);
        assert_eq!(FlatValue::from(8080).as_u64(), Some(8080));
        assert_eq!(FlatValue::from("18446744073709551615").as_u64(), Some(u64::MAX));
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(FlatValue::from("YES").as_bool(), Some(true));
        assert_eq!(FlatValue::from("off").as_bool(), Some(false));
        assert_eq!(FlatValue::from(1).as_bool(), Some(true));
        assert_eq!(FlatValue::from(2).as_bool(), None);
        assert_eq!(FlatValue::from("maybe").as_bool(), None);
    }

    #[test]
    fn test_string_rendering() {
        assert_eq!(FlatValue::from(true).as_string().as_deref(), Some("true"));
        assert_eq!(FlatValue::from(1.5).as_string().as_deref(), Some("1.5"));
        assert_eq!(FlatValue::Null.as_string(), None);
    }

    #[test]
    fn test_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            FlatValue::Null,
            FlatValue::from(1),
            FlatValue::from("x"),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,1,"x"]"#);
    }
}
