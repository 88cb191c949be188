//! Wire frames exchanged with the host.
//!
//! ```json
//! {"type":"event","event":"Editor.insertBlock","args":[{"args":["uuid","text"],"sibling":true}],"ack":7}
//! {"type":"ack","ack":7,"data":{"uuid":"..."}}
//! ```
//!
//! An `event` carrying `ack` expects exactly one `ack` frame with the same id
//! in return. Agent→host events always carry a single argument: the payload
//! object `{args: [...], ...named options}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Options;
use crate::{AppError, Result};

/// One message on the host connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// A named event with positional arguments.
    Event {
        /// Event name.
        event: String,
        /// Positional arguments.
        #[serde(default)]
        args: Vec<Value>,
        /// Correlation id when the sender expects a reply.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u64>,
    },
    /// The reply to an event that carried `ack`.
    Ack {
        /// Correlation id being answered.
        ack: u64,
        /// Reply payload.
        #[serde(default)]
        data: Value,
    },
}

impl Frame {
    /// Build an agent→host event with the `{args, ...opts}` payload shape.
    #[must_use]
    pub fn outbound(event: &str, args: Vec<Value>, mut opts: Options, ack: Option<u64>) -> Self {
        opts.insert("args".into(), Value::Array(args));
        Self::Event {
            event: event.to_owned(),
            args: vec![Value::Object(opts)],
            ack,
        }
    }

    /// Parse a single JSON frame.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the text is not a valid frame.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text.trim())
            .map_err(|err| AppError::Protocol(format!("malformed frame: {err}")))
    }

    /// Serialize to compact single-line JSON.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| AppError::Protocol(format!("failed to serialise frame: {err}")))
    }

    /// Event name, for logging.
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::Event { event, .. } => Some(event),
            Self::Ack { .. } => None,
        }
    }
}
