#![forbid(unsafe_code)]

//! `logspyq`: agent bridge server binary.
//!
//! Loads configuration, opens the settings store, discovers agents and
//! serves the host endpoints plus the JSON admin surface until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use logspyq::agent::{Catalog, Registry};
use logspyq::persistence::{db, SettingsStore};
use logspyq::scheduler::Scheduler;
use logspyq::server::{self, tcp};
use logspyq::transport::Transport;
use logspyq::{AppError, Result, ServerConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "logspyq", about = "Agent bridge server", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,

    /// HTTP port for the admin surface and WebSocket endpoint.
    #[arg(long)]
    port: Option<u16>,

    /// Port for the newline-delimited TCP host endpoint.
    #[arg(long)]
    tcp_port: Option<u16>,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,

    /// Serve only this catalog agent, implicitly enabled.
    #[arg(long)]
    agent: Option<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(&args)?;
    init_tracing(args.log_format, config.debug)?;
    info!("logspyq server bootstrap");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(config, args.agent))
}

fn load_config(args: &Cli) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load_from_path(path)?,
        None => ServerConfig::default(),
    };

    if let Some(host) = &args.host {
        config.host.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.tcp_port.is_some() {
        config.tcp_port = args.tcp_port;
    }
    config.debug |= args.debug;

    config.validate()?;
    Ok(config)
}

async fn run(config: ServerConfig, single_agent: Option<String>) -> Result<()> {
    // ── Initialize database ─────────────────────────────
    info!(path = %config.db_path.display(), "loading database");
    let db = Arc::new(db::connect(&config.db_path).await?);
    let store = SettingsStore::new(db);

    // ── Build registry ──────────────────────────────────
    let transport = Arc::new(Transport::new(config.request_timeout()));
    let scheduler = Arc::new(Scheduler::new());
    let catalog = Catalog::builtin();

    let registry = match single_agent {
        Some(name) => {
            let factory = catalog.get(&name).ok_or_else(|| {
                AppError::Config(format!(
                    "unknown agent {name:?}; available: {}",
                    catalog.names().join(", ")
                ))
            })?;
            let agent = factory(Arc::clone(&transport))?;
            Registry::single(Arc::clone(&transport), store.clone(), Arc::clone(&scheduler), agent)
                .await?
        }
        None => {
            let catalog = catalog.filtered(&config.agents);
            Registry::multi(Arc::clone(&transport), store.clone(), Arc::clone(&scheduler), &catalog)
                .await?
        }
    };
    let registry = Arc::new(registry);
    info!(mode = ?registry.mode(), agents = registry.agents().len(), "registry ready");

    // ── Start endpoints ─────────────────────────────────
    let ct = CancellationToken::new();

    let http_listener = bind(&config.host, config.port).await?;
    let http_ct = ct.clone();
    let http_registry = Arc::clone(&registry);
    let http_handle = tokio::spawn(async move {
        if let Err(err) = server::serve_http(http_listener, http_registry, http_ct).await {
            error!(%err, "http server failed");
        }
    });

    let tcp_handle = match config.tcp_port {
        Some(port) => {
            let listener = bind(&config.host, port).await?;
            let tcp_ct = ct.clone();
            let tcp_registry = Arc::clone(&registry);
            Some(tokio::spawn(async move {
                if let Err(err) = tcp::serve_tcp(listener, tcp_registry, tcp_ct).await {
                    error!(%err, "tcp endpoint failed");
                }
            }))
        }
        None => None,
    };

    info!("logspyq server ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    info!("stopping scheduler");
    scheduler.shutdown().await;

    let _ = http_handle.await;
    if let Some(handle) = tcp_handle {
        let _ = handle.await;
    }

    info!("closing database");
    store.close().await;
    info!("logspyq shut down");

    Ok(())
}

async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {host}:{port}: {err}")))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!(%addr, "bound");
    Ok(listener)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat, debug: bool) -> Result<()> {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
