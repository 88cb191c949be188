//! Agent registry: lifecycle fan-out over the shared transport.
//!
//! The registry intercepts the host lifecycle events (`ready`, `graph`)
//! before the transport dispatches a frame, runs the registration protocol
//! for every enabled agent on `ready`, and applies enable toggles and
//! settings updates coming from the admin surface.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::discovery::AgentSource;
use super::settings::Settings;
use super::Agent;
use crate::persistence::SettingsStore;
use crate::scheduler::Scheduler;
use crate::transport::frame::Frame;
use crate::transport::Transport;
use crate::{AppError, Result};

/// Host event signalling that its plugin runtime accepts registrations.
pub const READY_EVENT: &str = "ready";
/// Host event carrying the current workspace descriptor.
pub const GRAPH_EVENT: &str = "graph";
/// Event pushing the single agent's settings schema to the host.
pub const SETTINGS_SCHEMA_EVENT: &str = "useSettingsSchema";

/// How agents were discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    /// One agent, always enabled.
    Single,
    /// A catalog of agents gated by their persisted enabled flag.
    Multi,
}

/// Outcome of one `ready` fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadyReport {
    /// Agents that completed registration.
    pub registered: Vec<String>,
    /// Agents whose registration failed.
    pub failed: Vec<String>,
    /// Disabled agents.
    pub skipped: Vec<String>,
}

/// Holds every agent multiplexed over one transport.
pub struct Registry {
    mode: RegistryMode,
    transport: Arc<Transport>,
    store: SettingsStore,
    scheduler: Arc<Scheduler>,
    agents: BTreeMap<String, Arc<Agent>>,
    graph: RwLock<Option<Value>>,
}

impl Registry {
    /// Single-agent mode: `agent` is implicitly enabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if persisted settings cannot be read.
    pub async fn single(
        transport: Arc<Transport>,
        store: SettingsStore,
        scheduler: Arc<Scheduler>,
        agent: Arc<Agent>,
    ) -> Result<Self> {
        agent.set_enabled(true);
        let mut agents = BTreeMap::new();
        agents.insert(agent.name().to_owned(), agent);
        let registry = Self {
            mode: RegistryMode::Single,
            transport,
            store,
            scheduler,
            agents,
            graph: RwLock::new(None),
        };
        registry.load_settings().await?;
        Ok(registry)
    }

    /// Multi-agent mode: every agent from `source`, enabled per the store.
    /// Agents with no persisted flag start disabled.
    ///
    /// # Errors
    ///
    /// Returns discovery errors and `AppError::Db` on store failures.
    pub async fn multi(
        transport: Arc<Transport>,
        store: SettingsStore,
        scheduler: Arc<Scheduler>,
        source: &dyn AgentSource,
    ) -> Result<Self> {
        let mut agents = BTreeMap::new();
        for agent in source.load(&transport)? {
            let enabled = store.enabled(agent.name()).await?.unwrap_or(false);
            agent.set_enabled(enabled);
            info!(agent = %agent.name(), enabled, "agent discovered");
            agents.insert(agent.name().to_owned(), agent);
        }
        let registry = Self {
            mode: RegistryMode::Multi,
            transport,
            store,
            scheduler,
            agents,
            graph: RwLock::new(None),
        };
        registry.load_settings().await?;
        Ok(registry)
    }

    async fn load_settings(&self) -> Result<()> {
        for agent in self.agents.values() {
            if agent.settings_schema().is_some() {
                let persisted = self.store.settings(agent.name()).await?;
                agent.apply_settings(&persisted);
            }
        }
        Ok(())
    }

    /// Discovery mode.
    #[must_use]
    pub fn mode(&self) -> RegistryMode {
        self.mode
    }

    /// Shared transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Persisted store.
    #[must_use]
    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Job scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Agent called `name`.
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.get(name).cloned()
    }

    /// All agents, ordered by name.
    #[must_use]
    pub fn agents(&self) -> Vec<Arc<Agent>> {
        self.agents.values().cloned().collect()
    }

    /// Last workspace descriptor sent by the host.
    #[must_use]
    pub fn graph(&self) -> Option<Value> {
        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Host lifecycle ──────────────────────────────────────────────────

    /// Route one inbound frame, handling lifecycle events here and
    /// everything else in the transport.
    pub fn handle_frame(&self, frame: Frame) {
        match frame {
            Frame::Event { event, ack, .. } if event == READY_EVENT => {
                let report = self.on_ready();
                debug!(?report, "ready handled");
                self.ack_lifecycle(ack);
            }
            Frame::Event { event, args, ack } if event == GRAPH_EVENT => {
                self.on_graph(args);
                self.ack_lifecycle(ack);
            }
            other => self.transport.receive(other),
        }
    }

    fn ack_lifecycle(&self, ack: Option<u64>) {
        if let Some(ack) = ack {
            self.transport.reply(ack, Value::Null);
        }
    }

    /// A host connected.
    pub fn on_connect(&self, sid: &str) {
        info!(sid, agents = self.agents.len(), "host session opened");
    }

    /// The host went away; its bindings are gone with it.
    pub fn on_disconnect(&self, sid: &str) {
        for agent in self.agents.values() {
            agent.mark_unregistered();
        }
        info!(sid, "host session closed");
    }

    /// Register every enabled agent, then run their on-ready callbacks.
    ///
    /// A failing agent is logged and skipped; the rest still register.
    pub fn on_ready(&self) -> ReadyReport {
        info!(sid = ?self.transport.sid(), "host ready");
        let mut report = ReadyReport::default();

        for agent in self.agents.values() {
            if !agent.is_enabled() {
                report.skipped.push(agent.name().to_owned());
                continue;
            }
            match agent.register_with_host(&self.scheduler) {
                Ok(_) => report.registered.push(agent.name().to_owned()),
                Err(err) => {
                    error!(agent = %agent.name(), %err, "agent registration failed, skipping");
                    report.failed.push(agent.name().to_owned());
                }
            }
        }

        if self.mode == RegistryMode::Single {
            for agent in self.agents.values() {
                self.push_settings_schema(agent);
            }
        }

        for agent in self.agents.values() {
            if report.registered.iter().any(|n| n == agent.name()) {
                agent.notify_ready();
            }
        }

        report
    }

    fn push_settings_schema(&self, agent: &Agent) {
        if agent.settings_schema().is_none() {
            return;
        }
        let outcome = agent.rendered_schema().and_then(|schema| {
            let schema = serde_json::to_value(schema)?;
            self.transport
                .emit(SETTINGS_SCHEMA_EVENT, vec![schema], serde_json::Map::new())
        });
        if let Err(err) = outcome {
            warn!(agent = %agent.name(), %err, "could not push settings schema");
        }
    }

    /// Retain the workspace descriptor.
    pub fn on_graph(&self, args: Vec<Value>) {
        let descriptor = args.into_iter().next().unwrap_or(Value::Null);
        debug!(graph = %descriptor, "graph descriptor received");
        *self.graph.write().unwrap_or_else(PoisonError::into_inner) = Some(descriptor);
    }

    // ── Admin operations ────────────────────────────────────────────────

    /// Flip and persist the enabled flag of `name`; returns the new value.
    ///
    /// Enabling registers the agent immediately when a host is connected.
    /// Disabling drops its local subscriptions and cancels its jobs.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` for an unknown agent.
    /// - `AppError::Db` when the flag cannot be persisted.
    /// - Registration errors when catching up with a connected host; the
    ///   agent is then disabled again and the flag persisted as `false`.
    pub async fn toggle(&self, name: &str) -> Result<bool> {
        let agent = self.require(name)?;
        let enabled = !agent.is_enabled();
        self.store.set_enabled(name, enabled).await?;
        agent.set_enabled(enabled);
        info!(agent = %name, enabled, "agent toggled");

        if enabled {
            if self.transport.is_connected() {
                if let Err(err) = agent.register_with_host(&self.scheduler) {
                    self.roll_back_enable(&agent).await;
                    return Err(err);
                }
                agent.notify_ready();
            }
        } else {
            agent.unregister_locally(&self.scheduler);
        }
        Ok(enabled)
    }

    /// Undo an enable whose catch-up registration failed, so the agent is
    /// not retried on every later `ready`.
    async fn roll_back_enable(&self, agent: &Agent) {
        agent.set_enabled(false);
        agent.unregister_locally(&self.scheduler);
        if let Err(err) = self.store.set_enabled(agent.name(), false).await {
            warn!(agent = %agent.name(), %err, "could not persist enable rollback");
        }
        warn!(agent = %agent.name(), "registration failed, agent left disabled");
    }

    /// Persist `pairs` as settings of `name` and reload its snapshot.
    ///
    /// # Errors
    ///
    /// - `AppError::NotFound` for an unknown agent.
    /// - `AppError::Db` on store failures.
    pub async fn update_settings(
        &self,
        name: &str,
        pairs: &HashMap<String, String>,
    ) -> Result<Arc<Settings>> {
        let agent = self.require(name)?;
        for (key, value) in pairs {
            self.store.set_setting(name, key, value).await?;
        }
        let persisted = self.store.settings(name).await?;
        let settings = agent.apply_settings(&persisted);
        info!(agent = %name, keys = pairs.len(), version = settings.version(), "settings updated");
        Ok(settings)
    }

    fn require(&self, name: &str) -> Result<Arc<Agent>> {
        self.agent(name)
            .ok_or_else(|| AppError::NotFound(format!("agent {name:?} not found")))
    }
}
