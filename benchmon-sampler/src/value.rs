//! Parameter Values
//!
//! A single candidate value on a parameter axis. Values come straight from
//! the suite file, so the variants mirror the scalar TOML types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Scalar value on a parameter axis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number, compared bit-for-bit
    Float(f64),
    /// String value
    Str(String),
}

// Equality is structural: floats compare by bit pattern so that the active
// set lookup is exact and `Eq`/`Hash` stay consistent.
impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Float(a), ParamValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ParamValue::Str(a), ParamValue::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ParamValue::Bool(v) => v.hash(state),
            ParamValue::Int(v) => v.hash(state),
            ParamValue::Float(v) => v.to_bits().hash(state),
            ParamValue::Str(v) => v.hash(state),
        }
    }
}

impl ParamValue {
    /// False only for NaN and infinite floats
    pub fn is_finite(&self) -> bool {
        match self {
            ParamValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            // Debug keeps the trailing ".0" so floats stay floats when rendered into scripts
            ParamValue::Float(v) => write!(f, "{:?}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_never_cross_compare() {
        assert_ne!(ParamValue::Int(1), ParamValue::Float(1.0));
        assert_ne!(ParamValue::Int(1), ParamValue::Bool(true));
        assert_ne!(ParamValue::Str("1".into()), ParamValue::Int(1));
    }

    #[test]
    fn test_float_bitwise_equality() {
        assert_eq!(ParamValue::Float(f64::NAN), ParamValue::Float(f64::NAN));
        assert_ne!(ParamValue::Float(0.0), ParamValue::Float(-0.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(ParamValue::Float(1.0).to_string(), "1.0");
        assert_eq!(ParamValue::Int(-3).to_string(), "-3");
        assert_eq!(ParamValue::from("cauchy").to_string(), "cauchy");
        assert_eq!(ParamValue::Bool(false).to_string(), "false");
    }
}
