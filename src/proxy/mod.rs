//! Capability proxies.
//!
//! A proxy groups the host operations of one namespace (`Editor`, `App`,
//! `DB`, `Git`, `Assets`) behind named Rust methods. Immediate calls become
//! `"<Namespace>.<method>"` events routed through the [`Transport`];
//! declarative registrations are stored as [`CallbackRegistration`]s and only
//! reach the host when the registration protocol runs on the next `ready`.
//!
//! Every registration kind derives its local event name from its identifying
//! parameter alone (see the `*_event` functions on each proxy), so repeated
//! registration passes always bind the same name on the host.

pub mod app;
pub mod assets;
pub mod db;
pub mod editor;
pub mod git;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::info;

use crate::models::{Options, Reply};
use crate::transport::{HandlerFuture, RawHandler, Transport};
use crate::Result;

pub use app::App;
pub use assets::Assets;
pub use db::Db;
pub use editor::Editor;
pub use git::Git;

/// Agent-side callback invoked by the host with normalized arguments.
pub type Handler = Arc<dyn Fn(Vec<Reply>) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure as a [`Handler`].
///
/// ```rust,ignore
/// let h = handler(|_args| async { Ok(None) });
/// ```
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Vec<Reply>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// Adapt a [`Handler`] to the transport, normalizing every host argument
/// into a [`Reply`] before the agent code sees it.
#[must_use]
pub fn normalizing(handler: Handler) -> RawHandler {
    Arc::new(move |args: Vec<Value>| handler(Reply::from_args(args)))
}

/// A callback the host will invoke by emitting `event_name`.
#[derive(Clone)]
pub struct CallbackRegistration {
    method: String,
    event_name: String,
    options: Options,
    handler: Option<Handler>,
}

impl CallbackRegistration {
    /// Start a registration for host method `method` bound to `event_name`.
    #[must_use]
    pub fn new(method: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            event_name: event_name.into(),
            options: Options::new(),
            handler: None,
        }
    }

    /// Attach announcement metadata (label, tag, key binding, …).
    #[must_use]
    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_owned(), value.into());
        self
    }

    /// Attach the local handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Host method name, without namespace.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Synthesized local event name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Local handler, if one was attached.
    #[must_use]
    pub fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    /// Registration metadata.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Payload announced to the host: metadata plus `event_name`. The
    /// handler is local-only and never serialized.
    #[must_use]
    pub fn announcement(&self) -> Options {
        let mut payload = self.options.clone();
        payload.insert("event_name".into(), Value::String(self.event_name.clone()));
        payload
    }
}

impl fmt::Debug for CallbackRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistration")
            .field("method", &self.method)
            .field("event_name", &self.event_name)
            .field("options", &self.options)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// State shared by every capability proxy.
pub struct ProxyCore {
    namespace: &'static str,
    transport: Arc<Transport>,
    registrations: Mutex<BTreeMap<(String, String), CallbackRegistration>>,
}

impl ProxyCore {
    /// Create the core for `namespace`.
    #[must_use]
    pub fn new(namespace: &'static str, transport: Arc<Transport>) -> Self {
        Self {
            namespace,
            transport,
            registrations: Mutex::new(BTreeMap::new()),
        }
    }

    /// Namespace prefix.
    #[must_use]
    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Fully qualified host event for `method`.
    #[must_use]
    pub fn qualified(&self, method: &str) -> String {
        format!("{}.{method}", self.namespace)
    }

    /// Fire-and-forget call to `<Namespace>.<method>`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn emit(&self, method: &str, args: Vec<Value>, opts: Options) -> Result<()> {
        self.transport.emit(&self.qualified(method), args, opts)
    }

    /// Awaited call to `<Namespace>.<method>` with the default deadline.
    ///
    /// # Errors
    ///
    /// Propagates `NotConnected`, `Timeout` and `Disconnected` from the transport.
    pub async fn request(&self, method: &str, args: Vec<Value>, opts: Options) -> Result<Reply> {
        self.transport
            .request(&self.qualified(method), args, opts, None)
            .await
    }

    /// Store a registration. Registering the same method and event name
    /// again replaces the earlier entry. Returns the event name.
    pub fn register_callback(&self, registration: CallbackRegistration) -> String {
        info!(
            namespace = self.namespace,
            method = registration.method(),
            event_name = registration.event_name(),
            "registering callback"
        );
        let event_name = registration.event_name.clone();
        self.lock().insert(
            (registration.method.clone(), registration.event_name.clone()),
            registration,
        );
        event_name
    }

    /// Snapshot of the stored registrations in stable order.
    #[must_use]
    pub fn registrations(&self) -> Vec<CallbackRegistration> {
        self.lock().values().cloned().collect()
    }

    /// Event names of the stored registrations.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.lock().values().map(|r| r.event_name.clone()).collect()
    }

    /// Transport this proxy routes through.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), CallbackRegistration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A namespaced façade over the host API.
pub trait Capability: Send + Sync {
    /// Shared proxy state.
    fn core(&self) -> &ProxyCore;

    /// Namespace prefix.
    fn namespace(&self) -> &'static str {
        self.core().namespace()
    }
}

/// Positional argument list helper.
pub(crate) fn args<const N: usize>(values: [Value; N]) -> Vec<Value> {
    values.into_iter().collect()
}
