//! `App` namespace: messages, graph information and the command palette.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{args, Capability, CallbackRegistration, Handler, ProxyCore};
use crate::models::{KeyBinding, Options, Reply};
use crate::transport::Transport;
use crate::Result;

/// Event name bound to a command palette entry.
#[must_use]
pub fn command_palette_event(label: &str) -> String {
    format!("command-palette-{label}")
}

/// Default toast duration in milliseconds.
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 3000;

/// Proxy for the host's `App` API.
pub struct App {
    core: ProxyCore,
}

impl Capability for App {
    fn core(&self) -> &ProxyCore {
        &self.core
    }
}

impl App {
    /// Namespace prefix.
    pub const NAMESPACE: &'static str = "App";

    /// Create the proxy on `transport`.
    #[must_use]
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            core: ProxyCore::new(Self::NAMESPACE, transport),
        }
    }

    /// Register a command palette entry, optionally bound to a keyboard
    /// shortcut. Returns `handler` unchanged.
    pub fn register_command_palette(
        &self,
        label: &str,
        keybinding: Option<KeyBinding>,
        handler: Handler,
    ) -> Handler {
        let mut registration =
            CallbackRegistration::new("registerCommandPalette", command_palette_event(label))
                .with_option("label", label);
        if let Some(keybinding) = keybinding {
            registration = registration.with_option(
                "keybinding",
                serde_json::to_value(keybinding).unwrap_or(Value::Null),
            );
        }
        self.core
            .register_callback(registration.with_handler(Arc::clone(&handler)));
        handler
    }

    /// Show a toast message. `status` is `success`, `warning` or `error`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn show_msg(
        &self,
        content: &str,
        status: &str,
        key: Option<&str>,
        timeout_ms: Option<u64>,
    ) -> Result<()> {
        let mut opts = Options::new();
        opts.insert("key".into(), key.map_or(Value::Null, |k| json!(k)));
        opts.insert(
            "timeout".into(),
            json!(timeout_ms.unwrap_or(DEFAULT_MESSAGE_TIMEOUT_MS)),
        );
        self.core
            .emit("showMsg", args([json!(content), json!(status)]), opts)
    }

    /// Descriptor of the open graph.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_current_graph(&self) -> Result<Reply> {
        self.core.request("getCurrentGraph", Vec::new(), Options::new()).await
    }

    /// Page currently open.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn get_current_page(&self) -> Result<Reply> {
        self.core.request("getCurrentPage", Vec::new(), Options::new()).await
    }
}
