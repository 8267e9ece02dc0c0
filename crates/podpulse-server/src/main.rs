//! podpulse: process metrics and health endpoint.
//!
//! - `GET /metrics` : registry with the default collector set
//! - `GET /health`  : `{status, pod, greeting}`
//!
//! Collector installation happens before the listener binds; any failure
//! there aborts startup with a non-zero exit code.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podpulse_core::{DefaultCollectors, Registry};
use podpulse_server::{
    app_state::AppState,
    config,
    error::{Result, ServerError},
    router,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "podpulse exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let registry = Arc::new(Registry::new());
    let _collectors = DefaultCollectors::new().install(&registry)?;

    let app = router::build_router(AppState::new(registry));

    let listen = config::listen_addr();
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|source| ServerError::Bind { addr: listen, source })?;
    tracing::info!(%listen, "App listening on port {}", config::LISTEN_PORT);

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}
