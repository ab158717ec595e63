//! Shared harness for the HTTP end-to-end tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mccontrol::{build_router, initialize_with_credentials, ControlConfig, ControlState};
use mccontrol_host::LogHub;
use mccontrol_vault::CredentialStore;
use rsa::RsaPrivateKey;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub const API_KEY: &str = "4f1c7a52-9d8e-4a6b-b3c2-1e0f9a8b7c6d-0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";

/// One RSA key for the whole test binary; generating 2048-bit keys is slow.
fn shared_key() -> RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| mccontrol_vault::credential::generate_key_pair().unwrap())
        .clone()
}

pub struct Harness {
    pub app: Router,
    pub state: Arc<ControlState>,
    pub host: JoinHandle<()>,
    pub tmp: TempDir,
}

impl Harness {
    pub fn server_root(&self) -> std::path::PathBuf {
        self.state.sandbox.root().to_path_buf()
    }

    /// Wait until the host loop has applied `count` commands in total.
    pub async fn applied(&self, count: u64) {
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            self.state.world.wait_applied(count),
        )
        .await
        .expect("host loop did not apply commands in time");
        assert!(self.state.world.last_applied() >= count);
    }
}

pub fn harness() -> Harness {
    harness_with(|_| {})
}

pub fn harness_with(tweak: impl FnOnce(&mut ControlConfig)) -> Harness {
    let tmp = TempDir::new().unwrap();
    let server_root = tmp.path().join("server");
    std::fs::create_dir_all(server_root.join("plugins")).unwrap();

    let mut config = ControlConfig {
        data_dir: tmp.path().join("data"),
        server_root: Some(server_root),
        ..ControlConfig::default()
    };
    tweak(&mut config);

    let credentials = CredentialStore::from_parts(API_KEY, shared_key()).unwrap();
    let runtime =
        initialize_with_credentials(config, credentials, Arc::new(LogHub::in_memory())).unwrap();
    let state = runtime.state;
    let host = tokio::spawn(runtime.host_loop.run());

    Harness {
        app: build_router(Arc::clone(&state)),
        state,
        host,
        tmp,
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Authenticated call with the test API key.
pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send(app, request(method, uri, Some(API_KEY), body.as_ref())).await
}
