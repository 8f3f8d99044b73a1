use super::flags::list_overrides;
use crate::error::FlagsError;
use crate::server::router::FlagsState;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use gmsflags_schema::{DeleteReport, OverrideReport, OverrideRequest};

pub fn router() -> Router<FlagsState> {
    Router::new()
        .route(
            "/packages/{package}/overrides",
            get(list_overrides)
                .post(override_flag)
                .delete(delete_overrides),
        )
        .route(
            "/packages/{package}/overrides/{name}",
            delete(delete_override),
        )
}

async fn override_flag(
    State(state): State<FlagsState>,
    Path(package): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<OverrideReport>, FlagsError> {
    let report = state.db.override_flag(package, request).await?;
    Ok(Json(report))
}

async fn delete_overrides(
    State(state): State<FlagsState>,
    Path(package): Path<String>,
) -> Result<Json<DeleteReport>, FlagsError> {
    let deleted = state.db.delete_overrides(package.clone()).await?;
    Ok(Json(DeleteReport {
        package,
        name: None,
        deleted,
    }))
}

async fn delete_override(
    State(state): State<FlagsState>,
    Path((package, name)): Path<(String, String)>,
) -> Result<Json<DeleteReport>, FlagsError> {
    let deleted = state
        .db
        .delete_override(package.clone(), name.clone())
        .await?;
    Ok(Json(DeleteReport {
        package,
        name: Some(name),
        deleted,
    }))
}
