//! Duplex event channel to the host.
//!
//! The [`Transport`] is shared by every agent in the process. It owns the
//! outbound queue of the currently connected host, the table of local event
//! subscriptions, and the [`PendingCalls`](correlation::PendingCalls) used to
//! correlate request replies.
//!
//! Network front-ends (`server::ws`, `server::tcp`) [`attach`](Transport::attach)
//! an unbounded frame queue when a host connects and feed every decoded inbound
//! frame to [`Transport::receive`].
//!
//! Submodules:
//! - `frame`: the JSON wire frame.
//! - `codec`: newline-delimited framing for stream transports.
//! - `correlation`: one-shot reply slots keyed by correlation id.

pub mod codec;
pub mod correlation;
pub mod frame;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::models::{Options, Reply};
use crate::{AppError, Result};

use self::correlation::PendingCalls;
use self::frame::Frame;

/// Deadline applied to a request when the caller does not pass one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Future returned by event handlers. A `Some` value is acked back to the
/// host when the triggering event asked for a reply.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send>>;

/// Transport-level subscription receiving the raw event arguments.
pub type RawHandler = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// Outbound queue of the connected host.
struct Peer {
    sid: String,
    outbound: mpsc::UnboundedSender<Frame>,
}

/// One owner's handler for an event.
struct Subscription {
    owner: String,
    handler: RawHandler,
}

/// Owner recorded for subscriptions made through [`Transport::on`].
const ANONYMOUS_OWNER: &str = "";

/// Shared duplex channel to the host.
pub struct Transport {
    peer: RwLock<Option<Peer>>,
    handlers: RwLock<HashMap<String, Vec<Subscription>>>,
    catch_all: RwLock<Option<RawHandler>>,
    pending: PendingCalls,
    default_timeout: Duration,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl Transport {
    /// Create a disconnected transport whose requests time out after
    /// `default_timeout` unless told otherwise.
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            peer: RwLock::new(None),
            handlers: RwLock::new(HashMap::new()),
            catch_all: RwLock::new(None),
            pending: PendingCalls::new(),
            default_timeout,
        }
    }

    /// Default request deadline.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // ── Connection lifecycle ────────────────────────────────────────────

    /// Make `outbound` the host connection and return its session id.
    ///
    /// A host that reconnects replaces the previous connection; requests
    /// still waiting on the old connection fail with `Disconnected`.
    pub fn attach(&self, outbound: mpsc::UnboundedSender<Frame>) -> String {
        let sid = uuid::Uuid::new_v4().simple().to_string();
        let previous = self.peer_mut().replace(Peer {
            sid: sid.clone(),
            outbound,
        });
        if let Some(previous) = previous {
            let dropped = self.pending.fail_all();
            warn!(old_sid = %previous.sid, new_sid = %sid, dropped, "host reconnected; replacing connection");
        }
        info!(sid = %sid, "host connected");
        sid
    }

    /// Drop the connection identified by `sid`.
    ///
    /// Returns `false` when `sid` is not the current connection (it was
    /// already replaced). Outstanding requests fail with `Disconnected`.
    pub fn detach(&self, sid: &str) -> bool {
        let mut peer = self.peer_mut();
        if peer.as_ref().is_some_and(|p| p.sid == sid) {
            *peer = None;
            drop(peer);
            let dropped = self.pending.fail_all();
            info!(sid, dropped, "host disconnected");
            true
        } else {
            false
        }
    }

    /// Whether a host is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.peer.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Session id of the current connection.
    #[must_use]
    pub fn sid(&self) -> Option<String> {
        self.peer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| p.sid.clone())
    }

    // ── Outbound ────────────────────────────────────────────────────────

    /// Fire-and-forget event. Never waits on the host.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn emit(&self, event: &str, args: Vec<Value>, opts: Options) -> Result<()> {
        debug!(event, "emit");
        self.send(Frame::outbound(event, args, opts, None))
    }

    /// Emit `event` and wait for the host's reply.
    ///
    /// `timeout` falls back to [`Self::default_timeout`].
    ///
    /// # Errors
    ///
    /// - `AppError::NotConnected` when no host is attached.
    /// - `AppError::Timeout` when no reply arrives in time.
    /// - `AppError::Disconnected` when the host drops before replying.
    pub async fn request(
        &self,
        event: &str,
        args: Vec<Value>,
        opts: Options,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let (id, rx) = self.pending.open();
        let shown = Value::Array(args.clone());
        debug!(event, ack = id, args = %shown, "request");

        if let Err(err) = self.send(Frame::outbound(event, args.clone(), opts, Some(id))) {
            self.pending.abandon(id);
            return Err(err);
        }

        self.pending.wait(id, rx, timeout, event, &args).await
    }

    /// Number of requests awaiting a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn send(&self, frame: Frame) -> Result<()> {
        let peer = self.peer.read().unwrap_or_else(PoisonError::into_inner);
        let Some(peer) = peer.as_ref() else {
            return Err(AppError::NotConnected(format!(
                "cannot send {:?}: no host connected",
                frame.event_name().unwrap_or("ack")
            )));
        };
        peer.outbound
            .send(frame)
            .map_err(|_| AppError::NotConnected("host connection is closing".into()))
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    /// Subscribe `handler` to `event`, replacing any existing handler.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn on(&self, event: &str, handler: RawHandler) -> Result<()> {
        self.bind(ANONYMOUS_OWNER, event, handler)
    }

    /// Subscribe `handler` to `event` on behalf of `owner`.
    ///
    /// Each owner holds at most one handler per event; binding again
    /// replaces it. When several owners bind the same event, the most
    /// recent binding receives it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn bind(&self, owner: &str, event: &str, handler: RawHandler) -> Result<()> {
        if !self.is_connected() {
            return Err(AppError::NotConnected(format!(
                "cannot subscribe to {event:?}: no host connected"
            )));
        }
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let subscriptions = handlers.entry(event.to_owned()).or_default();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.owner != owner);
        let replaced = subscriptions.len() != before;
        subscriptions.push(Subscription {
            owner: owner.to_owned(),
            handler,
        });
        debug!(event, owner, replaced, "subscribed");
        Ok(())
    }

    /// Remove `owner`'s subscription to `event`. Other owners keep theirs.
    /// Returns whether one existed.
    pub fn unbind(&self, owner: &str, event: &str) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(subscriptions) = handlers.get_mut(event) else {
            return false;
        };
        let before = subscriptions.len();
        subscriptions.retain(|s| s.owner != owner);
        let removed = subscriptions.len() != before;
        if subscriptions.is_empty() {
            handlers.remove(event);
        }
        if removed {
            debug!(event, owner, "unsubscribed");
        }
        removed
    }

    /// Remove every subscription for `event`. Returns whether one existed.
    pub fn off(&self, event: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event)
            .is_some()
    }

    /// Whether `event` has a local subscription.
    #[must_use]
    pub fn is_subscribed(&self, event: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(event)
    }

    /// Sorted names of all subscribed events.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Install the handler for events nobody subscribed to. It receives the
    /// event name followed by the event arguments.
    pub fn set_catch_all(&self, handler: RawHandler) {
        *self.catch_all.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    // ── Inbound ─────────────────────────────────────────────────────────

    /// Route one inbound frame.
    ///
    /// Acks resolve the matching pending request. Events run their handler
    /// on a spawned task so that a handler awaiting its own request cannot
    /// block delivery of that request's reply.
    pub fn receive(self: &Arc<Self>, frame: Frame) {
        match frame {
            Frame::Ack { ack, data } => {
                if !self.pending.resolve(ack, data) {
                    debug!(ack, "discarding reply with no waiting request");
                }
            }
            Frame::Event { event, args, ack } => {
                let handler = self
                    .handlers
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&event)
                    .and_then(|subscriptions| subscriptions.last())
                    .map(|s| Arc::clone(&s.handler));

                match handler {
                    Some(handler) => self.spawn_handler(event, handler, args, ack),
                    None => self.unhandled(event, args, ack),
                }
            }
        }
    }

    fn unhandled(self: &Arc<Self>, event: String, mut args: Vec<Value>, ack: Option<u64>) {
        let catch_all = self
            .catch_all
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match catch_all {
            Some(handler) => {
                args.insert(0, Value::String(event.clone()));
                self.spawn_handler(event, handler, args, ack);
            }
            None => {
                warn!(event = %event, "unhandled host event");
                if let Some(ack) = ack {
                    self.reply(ack, Value::Null);
                }
            }
        }
    }

    fn spawn_handler(
        self: &Arc<Self>,
        event: String,
        handler: RawHandler,
        args: Vec<Value>,
        ack: Option<u64>,
    ) {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = handler(args).await;
            let reply = match outcome {
                Ok(value) => value.unwrap_or(Value::Null),
                Err(err) => {
                    error!(event = %event, %err, "event handler failed");
                    json!({ "error": err.to_string() })
                }
            };
            if let Some(ack) = ack {
                transport.reply(ack, reply);
            }
        });
    }

    /// Ack host event `ack` with `data`. Delivery failures are logged only.
    pub fn reply(&self, ack: u64, data: Value) {
        if let Err(err) = self.send(Frame::Ack { ack, data }) {
            debug!(ack, %err, "could not deliver reply to host");
        }
    }

    fn peer_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<Peer>> {
        self.peer.write().unwrap_or_else(PoisonError::into_inner)
    }
}
