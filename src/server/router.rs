use crate::db::DbActorHandle;
use crate::error::FlagsError;
use crate::server::guards::auth::RequireServiceKey;
use crate::server::routes::{flags, maintenance, overrides};
use crate::service::cache::PhenotypeCache;

use axum::{
    Router,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
};
use base64::Engine as _;
use moka::sync::Cache;
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const ANDROID_PACKAGE_CACHE_CAPACITY: u64 = 1024;

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone)]
pub struct FlagsState {
    pub db: DbActorHandle,
    pub cache: Arc<PhenotypeCache>,
    pub service_key: Arc<str>,
    android_packages: Cache<String, String>,
}

impl FlagsState {
    pub fn new(db: DbActorHandle, cache: PhenotypeCache, service_key: Arc<str>) -> Self {
        Self {
            db,
            cache: Arc::new(cache),
            service_key,
            android_packages: Cache::new(ANDROID_PACKAGE_CACHE_CAPACITY),
        }
    }

    /// Android package owning `package`; the mapping never changes while GMS runs.
    pub async fn android_package(&self, package: &str) -> Result<String, FlagsError> {
        if let Some(cached) = self.android_packages.get(package) {
            return Ok(cached);
        }
        let android = self.db.android_package(package.to_string()).await?;
        self.android_packages
            .insert(package.to_string(), android.clone());
        Ok(android)
    }
}

async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {} | {}ms",
            status.as_u16(),
            request_id,
            method.as_str(),
            path,
            latency_ms
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {} | {}ms",
            status.as_u16(),
            request_id,
            method.as_str(),
            path,
            latency_ms
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {} | {}ms",
            status.as_u16(),
            request_id,
            method.as_str(),
            path,
            latency_ms
        );
    }

    resp
}

pub fn flags_router(state: FlagsState) -> Router {
    let api = Router::new()
        .merge(flags::router())
        .merge(overrides::router())
        .merge(maintenance::router())
        .layer(middleware::from_extractor_with_state::<RequireServiceKey, _>(
            state.clone(),
        ));

    Router::new()
        .merge(api)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn(access_log))
}
