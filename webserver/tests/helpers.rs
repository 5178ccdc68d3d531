//! Test helper utilities for webserver integration tests
#![allow(dead_code)]

use analysis::AnalysisEngine;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tempfile::TempDir;
use std::sync::Arc;
use tower::ServiceExt;

use webserver::{AppConfig, MailTransportConfig, ServiceSet, WebServer, WebServerState};

pub const BOUNDARY: &str = "colpo-test-boundary";

/// Server over a private temp directory for snapshot, outbox and static files
pub struct TestServer {
    pub server: WebServer,
    pub router: Router,
    pub dir: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, adjust);
        Self::from_parts(config, dir)
    }

    /// Start a fresh server reusing an existing directory
    pub fn from_parts(config: AppConfig, dir: TempDir) -> Self {
        let server = WebServer::from_config(config).unwrap();
        let router = server.build_router();
        Self { server, router, dir }
    }

    /// Real services with some replaced, typically by mocks
    pub fn with_services(replace: impl FnOnce(&mut ServiceSet)) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, |_| {});
        let state = Arc::new(WebServerState::new(
            config.bind_address().unwrap(),
            config.settings.clone(),
        ));
        let engine = Arc::new(AnalysisEngine::from_config(&config.engine).unwrap());
        let mut services = ServiceSet::real(&state, &config).unwrap();
        replace(&mut services);

        let server = WebServer::new(config, state, engine, services);
        let router = server.build_router();
        Self { server, router, dir }
    }

    pub fn outbox(&self) -> std::path::PathBuf {
        self.dir.path().join("outbox")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_empty(&self, uri: &str) -> Response {
        self.send(Request::builder().method(Method::POST).uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn upload(&self, uri: &str, form: MultipartBody) -> Response {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(form.finish()))
                .unwrap(),
        )
        .await
    }
}

pub fn test_config(dir: &TempDir, adjust: impl FnOnce(&mut AppConfig)) -> AppConfig {
    let mut config = AppConfig::default();
    config.port = 0;
    config.static_dir = dir.path().join("static");
    config.snapshot_path = dir.path().join("snapshot.json");
    config.mail.transport = MailTransportConfig::Outbox {
        dir: dir.path().join("outbox"),
    };
    config.engine.input_size = 32;
    config.engine.seed = Some(7);
    adjust(&mut config);
    config
}

/// Hand-built multipart/form-data body
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, file_name: &str, content: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(content);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.bytes.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Assert the status and decode the JSON body
pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}
