use crate::db::FlagLookup;
use crate::error::FlagsError;
use crate::server::router::FlagsState;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use gmsflags_schema::{AndroidPackageResponse, FlagQuery, FlagsResponse};

pub fn router() -> Router<FlagsState> {
    Router::new()
        .route("/packages/{package}/flags", get(list_flags))
        .route(
            "/packages/{package}/android-package",
            get(android_package),
        )
}

fn lookup(package: &str, query: &FlagQuery) -> FlagLookup {
    FlagLookup {
        package: package.to_string(),
        flag_type: query.flag_type,
        user: query.user.clone(),
    }
}

async fn list_flags(
    State(state): State<FlagsState>,
    Path(package): Path<String>,
    Query(query): Query<FlagQuery>,
) -> Result<Json<FlagsResponse>, FlagsError> {
    let flags = state.db.query_flags(lookup(&package, &query)).await?;
    Ok(Json(FlagsResponse {
        package,
        flag_type: query.flag_type,
        user: query.user,
        flags,
    }))
}

pub(super) async fn list_overrides(
    State(state): State<FlagsState>,
    Path(package): Path<String>,
    Query(query): Query<FlagQuery>,
) -> Result<Json<FlagsResponse>, FlagsError> {
    let flags = state.db.query_overrides(lookup(&package, &query)).await?;
    Ok(Json(FlagsResponse {
        package,
        flag_type: query.flag_type,
        user: query.user,
        flags,
    }))
}

async fn android_package(
    State(state): State<FlagsState>,
    Path(package): Path<String>,
) -> Result<Json<AndroidPackageResponse>, FlagsError> {
    let android_package = state.android_package(&package).await?;
    Ok(Json(AndroidPackageResponse {
        package,
        android_package,
    }))
}
