//! Error types shared across the application.

use std::fmt::{Display, Formatter};

use serde_json::Value;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// `emit`/`on`/`request` invoked while no host is connected.
    NotConnected(String),
    /// The host connection dropped while a request was in flight.
    Disconnected(String),
    /// A request reply did not arrive before its deadline.
    Timeout {
        /// Event name of the timed-out request.
        event: String,
        /// Positional arguments the request was sent with.
        args: Vec<Value>,
    },
    /// A callback registration is missing its handler or event name.
    Registration(String),
    /// A settings schema declares a type outside the supported set.
    Schema(String),
    /// Malformed frame on the host wire.
    Protocol(String),
    /// An agent handler returned an error.
    Handler(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether the error is a request deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::NotConnected(msg) => write!(f, "not connected: {msg}"),
            Self::Disconnected(msg) => write!(f, "disconnected: {msg}"),
            Self::Timeout { event, args } => {
                write!(f, "timeout: request {event:?} {}", Value::Array(args.clone()))
            }
            Self::Registration(msg) => write!(f, "registration: {msg}"),
            Self::Schema(msg) => write!(f, "schema: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Handler(msg) => write!(f, "handler: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
