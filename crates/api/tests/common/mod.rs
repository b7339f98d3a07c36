#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use partvault_core::batch::memory::MemoryBatchStore;
use partvault_core::settings::{DataSource, Settings};
use tempfile::TempDir;
use tower::ServiceExt;

use partvault_api::auth::jwt::{generate_access_token, JwtConfig};
use partvault_api::config::ServerConfig;
use partvault_api::router::build_app_router;
use partvault_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: None,
        batch_retention_secs: 86_400,
        batch_cleanup_interval_secs: 3_600,
        build_timeout_secs: 3_600,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// A data source `ds1` on disk:
///
/// ```text
/// 0000-index/users.ini        alice (prt), bob (@all), anonymous (asm)
/// widgets/                    part.prt{,.1,.2}, gear.asm, metadata + thumbnail
/// secret/                     ACL allowing bob only
/// ```
pub fn fixture() -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("ds1");

    write(
        &root.join("0000-index/users.ini"),
        "[alice]\npassword = secret\nparts = prt\n\n\
         [bob]\npassword = hunter2\nparts = @all\n\n\
         [anonymous]\nparts = asm\n",
    );

    let widgets = root.join("widgets");
    for name in ["part.prt", "part.prt.1", "part.prt.2"] {
        write(&widgets.join(name), name);
    }
    write(&widgets.join("gear.asm"), "gear");
    write(
        &widgets.join("0000-index/metadata.ini"),
        "[directory]\nlabel = Widgets\nlabel/de = Bauteile\n\n\
         [parameters]\ndiameter.label = Diameter\ndiameter.label/de = Durchmesser\ndiameter.type = number\n\n\
         [part:part]\ndiameter = 12\n",
    );
    write(&widgets.join("0000-index/thumbnails/part.png"), "png");
    write(&widgets.join("0000-index/logo.png"), "png");

    write(&root.join("secret/plans.prt"), "plans");
    write(&root.join("secret/0000-index/acl.ini"), "[allow]\nusers = bob\n");

    tmp
}

fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Application state over the fixture's data source with an in-memory
/// batch store.
pub fn test_state(tmp: &TempDir) -> AppState {
    let mut settings =
        Settings::with_data_sources(vec![DataSource::new("ds1", tmp.path().join("ds1"))]);
    settings.download_root = tmp.path().join("downloads");

    AppState::new(
        test_config(),
        Arc::new(settings),
        Arc::new(MemoryBatchStore::new()),
    )
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(tmp: &TempDir) -> Router {
    build_app_router(test_state(tmp))
}

pub fn token_for(username: &str) -> String {
    generate_access_token(username, &test_config().jwt).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    app.oneshot(
        Request::get(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn get_with_language(app: Router, uri: &str, language: &str) -> Response<Body> {
    app.oneshot(
        Request::get(uri)
            .header("accept-language", language)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
