//! Domain models shared by the transport, proxies and registry.

pub mod block;
pub mod reply;

pub use block::{BlockInsertOptions, KeyBinding};
pub use reply::Reply;

/// Named options attached to an outbound event payload next to `args`.
pub type Options = serde_json::Map<String, serde_json::Value>;
