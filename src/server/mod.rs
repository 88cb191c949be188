//! Network front-ends.
//!
//! - `ws`: WebSocket host endpoint at `GET /socket` on the HTTP port.
//! - `tcp`: optional newline-delimited host endpoint on its own port.
//! - `admin`: JSON admin routes sharing the HTTP port.
//! - `connection`: the wire-independent host session both endpoints use.

pub mod admin;
pub mod connection;
pub mod tcp;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::Registry;
use crate::{AppError, Result};

/// Full HTTP router: host socket plus admin routes.
pub fn router(registry: Arc<Registry>) -> Router {
    admin::router()
        .route("/socket", get(ws::socket))
        .with_state(registry)
}

/// Serve HTTP on `listener` until `ct` fires.
///
/// # Errors
///
/// Returns `AppError::Io` if the server stops with an error.
pub async fn serve_http(
    listener: TcpListener,
    registry: Arc<Registry>,
    ct: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "http server listening");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("http server error: {err}")))?;

    info!("http server shut down");
    Ok(())
}
