//! Two-phase registration handshake.
//!
//! Run for an enabled agent on every host `ready`:
//!
//! 1. **validate**: every stored registration must carry an event name and
//!    a handler; a single invalid entry aborts the whole pass before anything
//!    is installed, so the host never holds a dangling binding.
//! 2. **install**: subscribe each event name on the transport, wrapping the
//!    handler so host arguments arrive as normalized [`Reply`](crate::models::Reply)s.
//! 3. **announce**: emit `"<Namespace>.<method>"` with the registration
//!    metadata (never the handler) so the host binds its UI to the event name.
//!
//! Re-running is safe: event names and announcement payloads depend only on
//! the registration parameters, and installing replaces the previous handler.

use serde_json::Value;
use tracing::{debug, info};

use crate::proxy::{normalizing, CallbackRegistration, ProxyCore};
use crate::transport::Transport;
use crate::{AppError, Result};

/// Where an agent stands in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Nothing installed locally or announced to the host.
    Unregistered,
    /// Handlers installed and registrations announced.
    Announced,
}

/// Outcome of one registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Local event names installed on the transport.
    pub installed: Vec<String>,
    /// Fully qualified host methods announced, one per registration.
    pub announced: Vec<String>,
}

/// Check a registration before anything touches the transport.
///
/// # Errors
///
/// Returns `AppError::Registration` when the event name or handler is missing.
pub fn validate(namespace: &str, registration: &CallbackRegistration) -> Result<()> {
    if registration.event_name().trim().is_empty() || registration.handler().is_none() {
        return Err(AppError::Registration(format!(
            "invalid callback {namespace}.{} (event_name={:?}, handler={})",
            registration.method(),
            registration.event_name(),
            if registration.handler().is_some() { "set" } else { "missing" },
        )));
    }
    Ok(())
}

/// Run the full handshake for `proxies`, binding their events on behalf
/// of `owner`.
///
/// # Errors
///
/// - `AppError::Registration` if any registration is invalid; nothing is
///   installed or announced in that case.
/// - `AppError::NotConnected` if the host disconnects mid-pass.
pub fn register_with_host(
    transport: &Transport,
    owner: &str,
    proxies: &[&ProxyCore],
) -> Result<RegistrationReport> {
    let mut batches = Vec::with_capacity(proxies.len());
    for proxy in proxies {
        let registrations = proxy.registrations();
        for registration in &registrations {
            validate(proxy.namespace(), registration)?;
        }
        batches.push((*proxy, registrations));
    }

    let mut report = RegistrationReport::default();

    for (_, registrations) in &batches {
        report.installed.extend(install(transport, owner, registrations)?);
    }

    for (proxy, registrations) in &batches {
        report.announced.extend(announce(transport, proxy, registrations)?);
    }

    info!(
        installed = report.installed.len(),
        announced = report.announced.len(),
        "registration pass complete"
    );
    Ok(report)
}

/// Phase 1: subscribe every registration's event name locally for `owner`.
///
/// # Errors
///
/// Returns `AppError::Registration` for an entry without a handler and
/// `AppError::NotConnected` when no host is attached.
pub fn install(
    transport: &Transport,
    owner: &str,
    registrations: &[CallbackRegistration],
) -> Result<Vec<String>> {
    let mut installed = Vec::with_capacity(registrations.len());
    for registration in registrations {
        let Some(handler) = registration.handler() else {
            return Err(AppError::Registration(format!(
                "callback {} has no handler",
                registration.method()
            )));
        };
        transport.bind(owner, registration.event_name(), normalizing(handler.clone()))?;
        installed.push(registration.event_name().to_owned());
    }
    Ok(installed)
}

/// Phase 2: announce every registration to the host.
///
/// # Errors
///
/// Returns `AppError::NotConnected` when no host is attached.
pub fn announce(
    transport: &Transport,
    proxy: &ProxyCore,
    registrations: &[CallbackRegistration],
) -> Result<Vec<String>> {
    let mut announced = Vec::with_capacity(registrations.len());
    for registration in registrations {
        let method = proxy.qualified(registration.method());
        let payload = registration.announcement();
        let shown = Value::Object(payload.clone());
        debug!(method = %method, payload = %shown, "announcing callback");
        transport.emit(&method, Vec::new(), payload)?;
        announced.push(method);
    }
    Ok(announced)
}
