use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use lineboard_common::LineTargets;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState, SharedState};
use super::db::{DbHandle, FloorDb};
use crate::config::LineboardToml;
use crate::notifier::Notifier;

/// Configuration for the floor server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Bind on all interfaces and allow any CORS origin.
    pub dev_mode: bool,
    pub broadcast_capacity: usize,
    pub top_performers: usize,
    pub targets: LineTargets,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_toml(&LineboardToml::default())
    }
}

impl ServerConfig {
    pub fn from_toml(toml: &LineboardToml) -> Self {
        Self {
            port: toml.server.port,
            db_path: toml.server.db_path.clone(),
            dev_mode: toml.server.dev,
            broadcast_capacity: toml.server.broadcast_capacity,
            top_performers: toml.dashboard.top_performers,
            targets: toml.line_targets(),
        }
    }

    /// Open the database and assemble shared state. `notifier` is the
    /// process-wide event hub; pass a clone to anything else that publishes.
    pub fn build_state(&self, notifier: Notifier) -> Result<SharedState> {
        let db = FloorDb::new(&self.db_path).context("Failed to initialize floor database")?;
        Ok(self.state_with_db(db, notifier))
    }

    fn state_with_db(&self, db: FloorDb, notifier: Notifier) -> SharedState {
        Arc::new(
            AppState::new(
                DbHandle::new(db),
                notifier,
                Arc::new(self.targets.clone()),
                self.broadcast_capacity,
            )
            .with_top_performers(self.top_performers),
        )
    }
}

/// Build the full application router: API, WebSocket and SSE push.
pub fn build_router(state: SharedState, dev_mode: bool) -> Router {
    let app = api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    if dev_mode {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Bind `127.0.0.1:0` and serve in the background. Returns the bound address
/// and the shutdown trigger.
pub async fn spawn_local(
    state: SharedState,
) -> Result<(SocketAddr, tokio_util::sync::CancellationToken)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind local listener")?;
    let addr = listener.local_addr()?;
    let token = tokio_util::sync::CancellationToken::new();
    let shutdown = token.clone();
    let app = build_router(state, false);
    tokio::spawn(async move {
        if let Err(e) = serve_on(listener, app, async move { shutdown.cancelled().await }).await {
            tracing::error!(error = %format!("{:#}", e), "local server stopped");
        }
    });
    Ok((addr, token))
}

/// Start the floor server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let state = config.build_state(Notifier::new())?;
    let app = build_router(state, config.dev_mode);

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        db = %config.db_path.display(),
        lines = config.targets.len(),
        "lineboard floor server running"
    );

    serve_on(listener, app, shutdown_signal()).await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
