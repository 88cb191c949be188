//! Closed set of reply shapes returned by the host.
//!
//! Every value that crosses the host boundary (request replies and the
//! arguments of host-triggered events) is decoded into a [`Reply`] once, at
//! the boundary, instead of being inspected ad hoc further downstream.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{AppError, Result};

/// Sentinel the host sends when a call produced no value.
pub const ABSENT_SENTINEL: &str = "null";

/// A normalized host value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A JSON object, accessible by key.
    Object(Map<String, Value>),
    /// A JSON array, in order.
    List(Vec<Value>),
    /// Any other JSON value (string, number, boolean).
    Scalar(Value),
    /// Explicit "no value": JSON `null` or the `"null"` sentinel.
    Absent,
}

impl Reply {
    /// Normalize a raw JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::Array(items) => Self::List(items),
            Value::Null => Self::Absent,
            Value::String(s) if s == ABSENT_SENTINEL => Self::Absent,
            other => Self::Scalar(other),
        }
    }

    /// Normalize every element of an argument list.
    #[must_use]
    pub fn from_args(args: Vec<Value>) -> Vec<Self> {
        args.into_iter().map(Self::from_value).collect()
    }

    /// Whether the host returned no value.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Field lookup on an object reply.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// String field lookup on an object reply.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Borrow the map of an object reply.
    #[must_use]
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the items of a list reply.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Borrow a boolean scalar.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Normalize the elements of a list reply; any other shape yields nothing.
    #[must_use]
    pub fn elements(&self) -> Vec<Reply> {
        match self {
            Self::List(items) => items.iter().cloned().map(Self::from_value).collect(),
            _ => Vec::new(),
        }
    }

    /// Convert back to raw JSON. `Absent` becomes `null`.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Object(map) => Value::Object(map),
            Self::List(items) => Value::Array(items),
            Self::Scalar(value) => value,
            Self::Absent => Value::Null,
        }
    }

    /// Decode into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` when the reply does not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.into_value())
            .map_err(|err| AppError::Protocol(format!("unexpected reply shape: {err}")))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
