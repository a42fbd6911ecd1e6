// SPDX-License-Identifier: Apache-2.0
//! Minimal operator-facing HTTP surface, grounded on `jitosd`'s
//! `axum::Router` pattern: a liveness probe and the same per-user summary
//! the periodic log line reports.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::AppState;

/// Build the admin router over shared daemon state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/summary", get(summary))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn summary(State(state): State<Arc<AppState>>) -> Json<Vec<crate::summary::UserSummary>> {
    let roster: Vec<_> = state.roster.lock().await.iter().copied().collect();
    Json(crate::summary::build(&state.cache, &roster).await)
}
