//! Agent discovery.
//!
//! Agents are compiled in and listed in a [`Catalog`] of named factories.
//! The registry asks an [`AgentSource`] for its agents once at startup.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::Agent;
use crate::transport::Transport;
use crate::{AppError, Result};

/// Builds one agent on the shared transport.
pub type AgentFactory = fn(Arc<Transport>) -> Result<Arc<Agent>>;

/// Something that can enumerate agents.
pub trait AgentSource {
    /// Build every agent this source knows.
    ///
    /// # Errors
    ///
    /// Returns the first factory error, or `AppError::Config` when two
    /// agents share a name.
    fn load(&self, transport: &Arc<Transport>) -> Result<Vec<Arc<Agent>>>;
}

/// Named agent factories.
#[derive(Clone, Default)]
pub struct Catalog {
    entries: Vec<(String, AgentFactory)>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Catalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The agents shipped with the bridge.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with(crate::agents::hello::NAME, crate::agents::hello::build)
            .with(crate::agents::bye::NAME, crate::agents::bye::build)
    }

    /// Add (or replace) the factory for `name`.
    #[must_use]
    pub fn with(mut self, name: &str, factory: AgentFactory) -> Self {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name.to_owned(), factory)),
        }
        self
    }

    /// Catalogued names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Factory for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<AgentFactory> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| *factory)
    }

    /// Keep only the names in `allow`. An empty list keeps everything.
    #[must_use]
    pub fn filtered(self, allow: &[String]) -> Self {
        if allow.is_empty() {
            return self;
        }
        for name in allow {
            if !self.entries.iter().any(|(n, _)| n == name) {
                warn!(agent = %name, "allow-listed agent is not in the catalog");
            }
        }
        Self {
            entries: self
                .entries
                .into_iter()
                .filter(|(n, _)| allow.iter().any(|a| a == n))
                .collect(),
        }
    }
}

impl AgentSource for Catalog {
    fn load(&self, transport: &Arc<Transport>) -> Result<Vec<Arc<Agent>>> {
        let mut seen = BTreeSet::new();
        let mut agents = Vec::with_capacity(self.entries.len());
        for (entry, factory) in &self.entries {
            let agent = factory(Arc::clone(transport))?;
            if !seen.insert(agent.name().to_owned()) {
                return Err(AppError::Config(format!(
                    "duplicate agent name {:?} (catalog entry {entry:?})",
                    agent.name()
                )));
            }
            debug!(entry = %entry, agent = %agent.name(), "agent loaded");
            agents.push(agent);
        }
        Ok(agents)
    }
}
