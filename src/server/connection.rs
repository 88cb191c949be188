//! One host connection, independent of the wire it arrives on.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::Registry;
use crate::transport::frame::Frame;

/// A host attached to the shared transport.
///
/// Created when a host connects; [`close`](Self::close) must run when the
/// connection ends so outstanding requests fail with `Disconnected`.
pub struct HostSession {
    registry: Arc<Registry>,
    sid: String,
}

impl HostSession {
    /// Attach a new host and return the session plus its outbound queue.
    ///
    /// A previously connected host is replaced.
    #[must_use]
    pub fn attach(registry: Arc<Registry>) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sid = registry.transport().attach(tx);
        registry.on_connect(&sid);
        (Self { registry, sid }, rx)
    }

    /// Session id.
    #[must_use]
    pub fn sid(&self) -> &str {
        &self.sid
    }

    /// Dispatch one decoded inbound frame.
    pub fn receive(&self, frame: Frame) {
        self.registry.handle_frame(frame);
    }

    /// Detach from the transport. A session already replaced by a newer
    /// connection leaves the current host untouched.
    pub fn close(self) {
        if self.registry.transport().detach(&self.sid) {
            self.registry.on_disconnect(&self.sid);
        }
    }
}
