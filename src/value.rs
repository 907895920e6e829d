use crate::error::{Result, RigError};
use serde::{Deserialize, Serialize};

/// Value held by a board location or produced by a computed parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Value {
    /// Scalar content, failing with `ValueShape` for vectors
    pub fn as_scalar(&self, name: &str) -> Result<f64> {
        match self {
            Value::Scalar(v) => Ok(*v),
            Value::Vector(_) => Err(RigError::ValueShape {
                name: name.to_string(),
                expected: "scalar",
            }),
        }
    }

    /// Vector content, failing with `ValueShape` for scalars
    pub fn as_vector(&self, name: &str) -> Result<&[f64]> {
        match self {
            Value::Vector(v) => Ok(v),
            Value::Scalar(_) => Err(RigError::ValueShape {
                name: name.to_string(),
                expected: "vector",
            }),
        }
    }

    pub fn into_vector(self, name: &str) -> Result<Vec<f64>> {
        match self {
            Value::Vector(v) => Ok(v),
            Value::Scalar(_) => Err(RigError::ValueShape {
                name: name.to_string(),
                expected: "vector",
            }),
        }
    }

    /// Number of elements (1 for scalars)
    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Vector(v) if v.is_empty())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Vector(v)
    }
}

/// Names passed to a read: a single name or an ordered batch
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
    One(&'a str),
    Many(Vec<&'a str>),
}

impl<'a> From<&'a str> for Selection<'a> {
    fn from(name: &'a str) -> Self {
        Selection::One(name)
    }
}

impl<'a> From<&'a [&'a str]> for Selection<'a> {
    fn from(names: &'a [&'a str]) -> Self {
        Selection::Many(names.to_vec())
    }
}

impl<'a, const N: usize> From<[&'a str; N]> for Selection<'a> {
    fn from(names: [&'a str; N]) -> Self {
        Selection::Many(names.to_vec())
    }
}

impl<'a> From<Vec<&'a str>> for Selection<'a> {
    fn from(names: Vec<&'a str>) -> Self {
        Selection::Many(names)
    }
}

/// Result of a read, shaped like the `Selection` that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    One(Value),
    Many(Vec<Value>),
}

impl Reading {
    pub fn into_one(self) -> Option<Value> {
        match self {
            Reading::One(v) => Some(v),
            Reading::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<Value>> {
        match self {
            Reading::Many(v) => Some(v),
            Reading::One(_) => None,
        }
    }
}
