//! `Assets` namespace.

use std::sync::Arc;

use serde_json::json;

use super::{args, Capability, ProxyCore};
use crate::models::{Options, Reply};
use crate::transport::Transport;
use crate::Result;

/// Proxy for the host's `Assets` API.
pub struct Assets {
    core: ProxyCore,
}

impl Capability for Assets {
    fn core(&self) -> &ProxyCore {
        &self.core
    }
}

impl Assets {
    /// Namespace prefix.
    pub const NAMESPACE: &'static str = "Assets";

    /// Create the proxy on `transport`.
    #[must_use]
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            core: ProxyCore::new(Self::NAMESPACE, transport),
        }
    }

    /// List files of the open graph with one of the extensions in `exts`.
    ///
    /// # Errors
    ///
    /// Propagates transport errors.
    pub async fn list_files_of_current_graph(&self, exts: &str) -> Result<Reply> {
        self.core
            .request("listFilesOfCurrentGraph", args([json!(exts)]), Options::new())
            .await
    }
}
