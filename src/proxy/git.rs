//! `Git` namespace.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{args, Capability, ProxyCore};
use crate::models::{Options, Reply};
use crate::transport::Transport;
use crate::Result;

/// Proxy for the host's `Git` API.
pub struct Git {
    core: ProxyCore,
}

impl Capability for Git {
    fn core(&self) -> &ProxyCore {
        &self.core
    }
}

impl Git {
    /// Namespace prefix.
    pub const NAMESPACE: &'static str = "Git";

    /// Create the proxy on `transport`.
    #[must_use]
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            core: ProxyCore::new(Self::NAMESPACE, transport),
        }
    }

    /// Run `git` with `argv` inside the graph repository.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn exec_command(&self, argv: &[&str]) -> Result<Reply> {
        let argv: Vec<Value> = argv.iter().map(|a| json!(a)).collect();
        self.core
            .request("execCommand", args([Value::Array(argv)]), Options::new())
            .await
    }

    /// Ask the host to reload `.gitignore`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn load_ignore_file(&self) -> Result<()> {
        self.core.emit("loadIgnoreFile", Vec::new(), Options::new())
    }

    /// Overwrite `.gitignore` with `content`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn save_ignore_file(&self, content: &str) -> Result<()> {
        self.core
            .emit("saveIgnoreFile", args([json!(content)]), Options::new())
    }
}
