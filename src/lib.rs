#![forbid(unsafe_code)]

//! `logspyq`: drive a note-taking host from out-of-process agents.
//!
//! The host connects over a WebSocket or newline-delimited TCP stream and
//! exchanges JSON event frames with the bridge. Agents call host operations
//! through namespaced proxies and receive host-triggered events through
//! callbacks announced on every host `ready`.

pub mod agent;
pub mod agents;
pub mod config;
pub mod errors;
pub mod models;
pub mod persistence;
pub mod proxy;
pub mod registration;
pub mod scheduler;
pub mod server;
pub mod transport;

pub use config::ServerConfig;
pub use errors::{AppError, Result};
