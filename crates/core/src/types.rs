//! Core types for filefinder.
//!
//! These types represent the values that groups parse from filenames and the
//! values callers pin onto groups to narrow a pattern or generate a filename.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value parsed from (or formatted into) a filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// Returns the type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
        }
    }

    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A value pinned onto a group.
///
/// A list narrows the group regex to any of its elements, while filename
/// generation only ever uses the first element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixValue {
    One(Value),
    List(Vec<Value>),
}

macro_rules! impl_fix_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FixValue {
                fn from(v: $ty) -> Self {
                    Self::One(v.into())
                }
            }

            impl From<Vec<$ty>> for FixValue {
                fn from(v: Vec<$ty>) -> Self {
                    Self::List(v.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

impl_fix_value_from!(i64, i32, f64, bool, &str, String);

impl From<Value> for FixValue {
    fn from(v: Value) -> Self {
        Self::One(v)
    }
}

impl From<Vec<Value>> for FixValue {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

/// Selects one or more groups of a pattern.
///
/// An index selects exactly one group, a name selects every group sharing
/// that name, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Index(usize),
    Name(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(n) => f.write_str(n),
        }
    }
}

impl From<usize> for GroupKey {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

impl From<&String> for GroupKey {
    fn from(s: &String) -> Self {
        Self::Name(s.clone())
    }
}
