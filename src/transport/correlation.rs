//! Request/reply correlation.
//!
//! Each outbound request owns a private one-shot slot keyed by a fresh
//! correlation id. The inbound path resolves exactly the slot whose id the
//! host acknowledged; nothing is shared between concurrent requests.
//!
//! ```text
//!   request()                    PendingCalls                 reader
//!   ─────────                    ────────────                 ──────
//!   open() ─────────────────▶  id → oneshot::Sender
//!   emit {ack: id}
//!   await rx (≤ timeout)       resolve(id, data) ◀──────────  ack frame
//!   timeout → abandon(id)      (late ack: no slot, dropped)
//! ```
//!
//! A waiting caller that is dropped (aborted task, cancelled job) abandons
//! its slot on the way out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::models::Reply;
use crate::{AppError, Result};

/// Outstanding request slots keyed by correlation id.
#[derive(Debug, Default)]
pub struct PendingCalls {
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

impl PendingCalls {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a correlation id and its one-shot reply slot.
    pub fn open(&self) -> (u64, oneshot::Receiver<Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Deliver a reply to the slot for `id`.
    ///
    /// Returns `false` when no caller is waiting any more (the request timed
    /// out or the id was never issued); the reply is dropped.
    pub fn resolve(&self, id: u64, data: Value) -> bool {
        let Some(tx) = self.lock().remove(&id) else {
            return false;
        };
        tx.send(data).is_ok()
    }

    /// Stop observing `id`. A reply that arrives afterwards is discarded.
    pub fn abandon(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Drop every slot; waiting callers observe a closed channel.
    pub fn fail_all(&self) -> usize {
        let mut slots = self.lock();
        let count = slots.len();
        slots.clear();
        count
    }

    /// Number of requests still awaiting a reply.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no request is awaiting a reply.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for the reply to `id`, normalizing it, or fail after `timeout`.
    ///
    /// # Errors
    ///
    /// - `AppError::Timeout` when the deadline passes; the slot is abandoned.
    /// - `AppError::Disconnected` when the slot was dropped by [`Self::fail_all`].
    pub async fn wait(
        &self,
        id: u64,
        rx: oneshot::Receiver<Value>,
        timeout: Duration,
        event: &str,
        args: &[Value],
    ) -> Result<Reply> {
        let _slot = SlotGuard { calls: self, id };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(raw)) => {
                debug!(event, ack = id, response = %raw, "request resolved");
                Ok(Reply::from_value(raw))
            }
            Ok(Err(_)) => Err(AppError::Disconnected(format!(
                "host connection closed while awaiting {event:?}"
            ))),
            Err(_) => {
                error!(event, ack = id, ?timeout, "request timed out");
                Err(AppError::Timeout {
                    event: event.to_owned(),
                    args: args.to_vec(),
                })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Abandons the slot when the waiter goes away, however it ends.
struct SlotGuard<'a> {
    calls: &'a PendingCalls,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.calls.abandon(self.id);
    }
}
