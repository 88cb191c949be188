//! `DB` namespace: queries and change listeners.

use std::sync::Arc;

use serde_json::json;

use super::{args, Capability, CallbackRegistration, Handler, ProxyCore};
use crate::models::{Options, Reply};
use crate::transport::Transport;
use crate::Result;

/// Event name for the database-wide change listener.
pub const CHANGED_EVENT: &str = "changed";

/// Event name for the block renderer slot listener.
pub const BLOCK_RENDERER_SLOTTED_EVENT: &str = "block-render-slotted";

/// Event name bound to changes of one block.
#[must_use]
pub fn block_changed_event(uuid: &str) -> String {
    format!("block-changed-{uuid}")
}

/// Proxy for the host's `DB` API.
pub struct Db {
    core: ProxyCore,
}

impl Capability for Db {
    fn core(&self) -> &ProxyCore {
        &self.core
    }
}

impl Db {
    /// Namespace prefix.
    pub const NAMESPACE: &'static str = "DB";

    /// Create the proxy on `transport`.
    #[must_use]
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            core: ProxyCore::new(Self::NAMESPACE, transport),
        }
    }

    /// Run a datascript query with positional inputs.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn datascript_query(&self, query: &str, inputs: &[String]) -> Result<Reply> {
        self.core
            .request(
                "datascriptQuery",
                args([json!(query), json!(inputs)]),
                Options::new(),
            )
            .await
    }

    /// Run a simple query DSL expression.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn q(&self, dsl: &str) -> Result<Reply> {
        self.core.request("q", args([json!(dsl)]), Options::new()).await
    }

    /// Listen for any database change. Returns `handler` unchanged.
    pub fn on_changed(&self, handler: Handler) -> Handler {
        self.core.register_callback(
            CallbackRegistration::new("onChanged", CHANGED_EVENT).with_handler(Arc::clone(&handler)),
        );
        handler
    }

    /// Listen for changes of block `uuid`. Returns `handler` unchanged.
    pub fn on_block_changed(&self, uuid: &str, handler: Handler) -> Handler {
        self.core.register_callback(
            CallbackRegistration::new("onBlockChanged", block_changed_event(uuid))
                .with_option("uuid", uuid)
                .with_handler(Arc::clone(&handler)),
        );
        handler
    }

    /// Listen for block renderer slots. Returns `handler` unchanged.
    pub fn on_block_renderer_slotted(&self, handler: Handler) -> Handler {
        self.core.register_callback(
            CallbackRegistration::new("onBlockRendererSlotted", BLOCK_RENDERER_SLOTTED_EVENT)
                .with_handler(Arc::clone(&handler)),
        );
        handler
    }
}
