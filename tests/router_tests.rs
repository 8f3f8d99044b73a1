mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::{PHOTOS, PHOTOS_ANDROID, open_seed_pool, remove_database, seeded_database, temp_path};
use gmsflags::config::CacheConfig;
use gmsflags::db;
use gmsflags::server::router::{FlagsState, flags_router};
use gmsflags::service::PhenotypeCache;
use gmsflags_schema::{
    ApiErrorBody, ClearCacheReport, DeleteReport, FlagValue, FlagsResponse, OverrideReport,
    OverrideRequest, UsersResponse,
};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

const KEY: &str = "test-service-key";

struct Harness {
    app: axum::Router,
    db_path: PathBuf,
    data_root: PathBuf,
    db: db::DbActorHandle,
}

impl Harness {
    async fn new(prefix: &str) -> Self {
        let (cfg, db_path) = seeded_database(prefix).await;
        let db = db::spawn(cfg).await.expect("spawn DbActor");
        let data_root = temp_path(prefix, "data");
        let cache = PhenotypeCache::new(&CacheConfig {
            data_root: data_root.clone(),
            force_stop_command: vec!["true".to_string()],
        });
        let app = flags_router(FlagsState::new(db.clone(), cache, Arc::from(KEY)));
        Self {
            app,
            db_path,
            data_root,
            db,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, axum::body::Bytes) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        (status, body)
    }

    async fn json<T: DeserializeOwned>(&self, req: Request<Body>) -> T {
        let (status, body) = self.send(req).await;
        assert_eq!(status, StatusCode::OK, "body: {}", String::from_utf8_lossy(&body));
        serde_json::from_slice(&body).unwrap()
    }

    async fn cleanup(self) {
        self.db.stop();
        remove_database(&self.db_path).await;
        let _ = tokio::fs::remove_dir_all(&self.data_root).await;
    }
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
}

#[tokio::test]
async fn requests_without_the_service_key_are_rejected() {
    let h = Harness::new("router-auth").await;

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = h.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let err: ApiErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.inner.code, "UNAUTHORIZED");

    let req = Request::builder()
        .uri("/users")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = h.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = authed("GET", "/health").body(Body::empty()).unwrap();
    let (status, _) = h.send(req).await;
    assert_eq!(status, StatusCode::OK);

    h.cleanup().await;
}

#[tokio::test]
async fn override_query_and_delete_over_http() {
    let h = Harness::new("router-flow").await;

    let users: UsersResponse = h.json(authed("GET", "/users").body(Body::empty()).unwrap()).await;
    assert_eq!(users.users.len(), 2);

    let request = OverrideRequest {
        name: "45389969".to_string(),
        value: FlagValue::Bool(false),
        users: users.users.clone(),
        committed: 0,
    };
    let report: OverrideReport = h
        .json(
            authed("POST", &format!("/packages/{PHOTOS}/overrides"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap(),
        )
        .await;
    assert!(report.is_complete());
    assert_eq!(report.results.len(), 2);

    let flags: FlagsResponse = h
        .json(
            authed("GET", &format!("/packages/{PHOTOS}/flags?type=bool&user=0"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(flags.flags.get("45389969"), Some(&FlagValue::Bool(false)));

    let overridden: FlagsResponse = h
        .json(
            authed("GET", &format!("/packages/{PHOTOS}/overrides?type=bool"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(overridden.user, "");
    assert_eq!(overridden.flags.len(), 1);

    let deleted: DeleteReport = h
        .json(
            authed("DELETE", &format!("/packages/{PHOTOS}/overrides/45389969"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(deleted.deleted, 2);
    assert_eq!(deleted.name.as_deref(), Some("45389969"));

    let flags: FlagsResponse = h
        .json(
            authed("GET", &format!("/packages/{PHOTOS}/flags?type=bool&user=0"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(flags.flags.get("45389969"), Some(&FlagValue::Bool(true)));

    h.cleanup().await;
}

#[tokio::test]
async fn bad_requests_map_to_error_codes() {
    let h = Harness::new("router-errors").await;

    let request = OverrideRequest {
        name: "x".to_string(),
        value: FlagValue::Int(1),
        users: vec![],
        committed: 0,
    };
    let (status, body) = h
        .send(
            authed("POST", &format!("/packages/{PHOTOS}/overrides"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: ApiErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.inner.code, "INVALID_REQUEST");

    let (status, body) = h
        .send(
            authed("GET", "/packages/com.example.none/android-package")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let err: ApiErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.inner.code, "NOT_FOUND");

    let (status, _) = h
        .send(authed("GET", "/no/such/route").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.cleanup().await;
}

#[tokio::test]
async fn clear_cache_removes_files_but_keeps_override_rows() {
    let h = Harness::new("router-cache").await;

    let request = OverrideRequest {
        name: "photos_max_items".to_string(),
        value: FlagValue::Int(9),
        users: vec!["0".to_string()],
        committed: 0,
    };
    let _: OverrideReport = h
        .json(
            authed("POST", &format!("/packages/{PHOTOS}/overrides"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap(),
        )
        .await;

    let cache_dir = h
        .data_root
        .join(PHOTOS_ANDROID)
        .join("files")
        .join("phenotype");
    tokio::fs::create_dir_all(&cache_dir).await.unwrap();
    tokio::fs::write(cache_dir.join("shared.pb"), b"cached")
        .await
        .unwrap();

    let report: ClearCacheReport = h
        .json(
            authed("POST", &format!("/packages/{PHOTOS}/cache:clear"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(report.android_package, PHOTOS_ANDROID);
    assert!(report.cache_removed);
    assert!(report.force_stopped);
    assert!(!cache_dir.exists());

    let pool = open_seed_pool(&h.db_path).await;
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM FlagOverrides")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
    pool.close().await;

    h.cleanup().await;
}
