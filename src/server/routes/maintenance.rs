use crate::error::FlagsError;
use crate::server::router::FlagsState;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use gmsflags_schema::{ClearCacheReport, HealthResponse, UsersResponse};

pub fn router() -> Router<FlagsState> {
    Router::new()
        .route("/health", get(health))
        .route("/users", get(users))
        .route("/packages/{package}/cache:clear", post(clear_cache))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        pid: std::process::id(),
    })
}

async fn users(State(state): State<FlagsState>) -> Result<Json<UsersResponse>, FlagsError> {
    let users = state.db.list_users().await?;
    Ok(Json(UsersResponse { users }))
}

async fn clear_cache(
    State(state): State<FlagsState>,
    Path(package): Path<String>,
) -> Result<Json<ClearCacheReport>, FlagsError> {
    let android_package = state.android_package(&package).await?;
    let outcome = state.cache.clear(&android_package).await?;
    Ok(Json(ClearCacheReport {
        package,
        android_package,
        cache_removed: outcome.cache_removed,
        force_stopped: outcome.force_stopped,
    }))
}
