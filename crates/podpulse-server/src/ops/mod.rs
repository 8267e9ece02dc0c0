//! Operational HTTP endpoints.
//!
//! - `/health`  : liveness, plus pod name and greeting from the environment
//! - `/metrics` : Prometheus text format

pub mod health;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::app_state::AppState;
use crate::error::Result;

pub use health::HealthPayload;

pub async fn health(State(state): State<AppState>) -> Json<HealthPayload> {
    Json(HealthPayload::from_env(state.env()))
}

pub async fn metrics(State(state): State<AppState>) -> Result<Response> {
    let exposition = state.registry().render()?;
    tracing::debug!(bytes = exposition.body.len(), "metrics scraped");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, exposition.content_type)],
        exposition.body,
    )
        .into_response())
}
