//! Agents multiplexed over the shared host transport.
//!
//! An [`Agent`] owns one proxy per host namespace plus the ad-hoc event
//! handlers, one-shot jobs and on-ready callbacks its author declared.
//! Nothing reaches the host until [`Agent::register_with_host`] runs on a
//! host `ready`, and only while the agent is enabled.

pub mod discovery;
pub mod registry;
pub mod settings;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::models::{Options, Reply};
use crate::proxy::{normalizing, App, Assets, Capability, Db, Editor, Git, Handler, ProxyCore};
use crate::registration::{self, RegistrationReport, RegistrationState};
use crate::scheduler::{ScheduledJob, Scheduler, Trigger};
use crate::transport::Transport;
use crate::Result;

pub use discovery::{AgentFactory, AgentSource, Catalog};
pub use registry::{ReadyReport, Registry, RegistryMode};
pub use settings::{SettingDescriptor, SettingType, Settings, SettingsSchema};

/// Builder for [`Agent`].
#[derive(Debug, Clone)]
pub struct AgentBuilder {
    name: String,
    description: String,
    schema: Option<SettingsSchema>,
}

impl AgentBuilder {
    /// Human-readable description shown by the admin surface.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare the agent's settings.
    #[must_use]
    pub fn settings(mut self, schema: SettingsSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Build the agent on `transport`.
    ///
    /// The settings schema is rendered here so an unsupported type fails
    /// before any host traffic.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Schema` when a declared setting type is invalid.
    pub fn build(self, transport: Arc<Transport>) -> Result<Arc<Agent>> {
        let settings = match &self.schema {
            Some(schema) => {
                schema.render()?;
                schema.defaults()
            }
            None => Settings::default(),
        };

        Ok(Arc::new(Agent {
            name: self.name,
            description: self.description,
            enabled: AtomicBool::new(false),
            state: Mutex::new(RegistrationState::Unregistered),
            editor: Editor::new(Arc::clone(&transport)),
            app: App::new(Arc::clone(&transport)),
            db: Db::new(Arc::clone(&transport)),
            git: Git::new(Arc::clone(&transport)),
            assets: Assets::new(Arc::clone(&transport)),
            transport,
            schema: self.schema,
            settings: RwLock::new(Arc::new(settings)),
            events: Mutex::new(BTreeMap::new()),
            jobs: Mutex::new(BTreeMap::new()),
            ready_handlers: Mutex::new(Vec::new()),
        }))
    }
}

/// A unit of automation driving the host through its proxies.
pub struct Agent {
    name: String,
    description: String,
    enabled: AtomicBool,
    state: Mutex<RegistrationState>,
    transport: Arc<Transport>,
    /// `Editor` namespace.
    pub editor: Editor,
    /// `App` namespace.
    pub app: App,
    /// `DB` namespace.
    pub db: Db,
    /// `Git` namespace.
    pub git: Git,
    /// `Assets` namespace.
    pub assets: Assets,
    schema: Option<SettingsSchema>,
    settings: RwLock<Arc<Settings>>,
    events: Mutex<BTreeMap<String, Handler>>,
    jobs: Mutex<BTreeMap<String, ScheduledJob>>,
    ready_handlers: Mutex<Vec<Handler>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Start building an agent called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            description: String::new(),
            schema: None,
        }
    }

    /// Agent name; also its persisted key prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Agent description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the agent takes part in registration.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Set the in-memory enabled flag. Persisting it is the registry's job.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Current handshake state.
    #[must_use]
    pub fn state(&self) -> RegistrationState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: RegistrationState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    // ── Core primitives ─────────────────────────────────────────────────

    /// Fire-and-forget host event.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn emit(&self, event: &str, args: Vec<Value>, opts: Options) -> Result<()> {
        self.transport.emit(event, args, opts)
    }

    /// Host request awaiting a reply.
    ///
    /// # Errors
    ///
    /// Propagates `NotConnected`, `Timeout` and `Disconnected` from the transport.
    pub async fn request(
        &self,
        event: &str,
        args: Vec<Value>,
        opts: Options,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        self.transport.request(event, args, opts, timeout).await
    }

    /// Handle host event `event`. Installed on the next registration pass;
    /// a later call for the same event replaces the handler.
    pub fn on(&self, event: &str, handler: Handler) -> Handler {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.to_owned(), Arc::clone(&handler));
        handler
    }

    /// Run `handler` once at `when`. The job id is `<agent>:<job>`.
    pub fn run_at(&self, job: &str, when: DateTime<Utc>, handler: Handler) -> Handler {
        self.add_job(job, Trigger::At(when), handler)
    }

    /// Run `handler` once, `delay` after the agent is registered.
    pub fn run_after(&self, job: &str, delay: Duration, handler: Handler) -> Handler {
        self.add_job(job, Trigger::After(delay), handler)
    }

    fn add_job(&self, job: &str, trigger: Trigger, handler: Handler) -> Handler {
        let id = self.job_id(job);
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).insert(
            id.clone(),
            ScheduledJob {
                id,
                trigger,
                handler: Arc::clone(&handler),
            },
        );
        handler
    }

    fn job_id(&self, job: &str) -> String {
        format!("{}:{job}", self.name)
    }

    /// Ids of the declared jobs.
    #[must_use]
    pub fn job_ids(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Run `handler` after every successful registration pass.
    pub fn on_ready(&self, handler: Handler) -> Handler {
        self.ready_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&handler));
        handler
    }

    /// Provide a UI template to the host at `slot`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotConnected` when no host is attached.
    pub fn provide_ui(&self, key: &str, slot: &str, template: &str) -> Result<()> {
        let mut opts = Options::new();
        opts.insert("key".into(), json!(key));
        opts.insert("slot".into(), json!(slot));
        opts.insert("template".into(), json!(template));
        self.emit("provideUI", Vec::new(), opts)
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// Declared settings schema, if any.
    #[must_use]
    pub fn settings_schema(&self) -> Option<&SettingsSchema> {
        self.schema.as_ref()
    }

    /// Host-facing settings descriptors; empty without a schema.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Schema` when a declared type is invalid.
    pub fn rendered_schema(&self) -> Result<Vec<SettingDescriptor>> {
        self.schema
            .as_ref()
            .map_or_else(|| Ok(Vec::new()), SettingsSchema::render)
    }

    /// Current settings snapshot.
    #[must_use]
    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&*self.settings.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a fresh snapshot built from persisted text values.
    ///
    /// Handlers holding the previous snapshot keep seeing it unchanged.
    pub fn apply_settings(&self, persisted: &HashMap<String, String>) -> Arc<Settings> {
        let Some(schema) = &self.schema else {
            return self.settings();
        };
        let mut slot = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(slot.reloaded(schema, persisted));
        debug!(agent = %self.name, version = next.version(), "settings reloaded");
        *slot = Arc::clone(&next);
        next
    }

    // ── Registration ────────────────────────────────────────────────────

    fn cores(&self) -> [&ProxyCore; 5] {
        [
            self.editor.core(),
            self.app.core(),
            self.db.core(),
            self.git.core(),
            self.assets.core(),
        ]
    }

    /// Local event names this agent binds on the transport.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cores()
            .iter()
            .flat_map(|core| core.event_names())
            .collect();
        names.extend(
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned(),
        );
        names
    }

    /// Install and announce every registration, then the ad-hoc events and
    /// jobs. Disabled agents are skipped with an empty report.
    ///
    /// # Errors
    ///
    /// - `AppError::Registration` when any proxy registration is invalid;
    ///   nothing is installed in that case.
    /// - `AppError::NotConnected` when the host is gone.
    pub fn register_with_host(&self, scheduler: &Scheduler) -> Result<RegistrationReport> {
        if !self.is_enabled() {
            debug!(agent = %self.name, "agent disabled, skipping registration");
            return Ok(RegistrationReport::default());
        }

        let mut report = registration::register_with_host(&self.transport, &self.name, &self.cores())?;

        let events: Vec<(String, Handler)> = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(event, handler)| (event.clone(), Arc::clone(handler)))
            .collect();
        for (event, handler) in events {
            self.transport.bind(&self.name, &event, normalizing(handler))?;
            report.installed.push(event);
        }

        let jobs: Vec<ScheduledJob> = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for job in &jobs {
            scheduler.add_job(job);
        }

        self.set_state(RegistrationState::Announced);
        info!(
            agent = %self.name,
            installed = report.installed.len(),
            announced = report.announced.len(),
            jobs = jobs.len(),
            "agent registered with host"
        );
        Ok(report)
    }

    /// Drop the transport subscriptions this agent bound and cancel its
    /// jobs. Other agents bound to the same event names keep theirs.
    pub fn unregister_locally(&self, scheduler: &Scheduler) {
        let mut removed = 0usize;
        for event in self.event_names() {
            if self.transport.unbind(&self.name, &event) {
                removed += 1;
            }
        }
        for id in self.job_ids() {
            scheduler.cancel(&id);
        }
        self.set_state(RegistrationState::Unregistered);
        info!(agent = %self.name, removed, "agent unregistered locally");
    }

    /// The host dropped its bindings; a new `ready` re-announces them.
    pub fn mark_unregistered(&self) {
        self.set_state(RegistrationState::Unregistered);
    }

    /// Run the on-ready callbacks, each on its own task.
    pub fn notify_ready(&self) {
        let handlers: Vec<Handler> = self
            .ready_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            let agent = self.name.clone();
            tokio::spawn(async move {
                if let Err(err) = handler(Vec::new()).await {
                    error!(agent = %agent, %err, "on-ready handler failed");
                }
            });
        }
    }
}
