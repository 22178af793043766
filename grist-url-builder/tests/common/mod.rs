#![allow(dead_code)]

use axum::{body::Body, http::Request, response::Response, Router};
use grist_url_builder::config::{
    GristSettings, RateLimitSettings, ServerSettings, Settings, TelemetrySettings,
};
use grist_url_builder::services::GristClient;
use grist_url_builder::startup::build_router;
use grist_url_builder::AppState;
use secrecy::Secret;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Address nothing listens on; connections are refused immediately.
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:9";

pub fn settings(base_url: &str, default_key: Option<&str>) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        grist: GristSettings {
            base_url: base_url.to_string(),
            api_key: default_key.map(|key| Secret::new(key.to_string())),
            timeout_seconds: 5,
        },
        rate_limit: RateLimitSettings {
            enabled: false,
            ..RateLimitSettings::default()
        },
        telemetry: TelemetrySettings::default(),
    }
}

pub fn client(base_url: &str, default_key: Option<&str>) -> GristClient {
    GristClient::new(&settings(base_url, default_key).grist).expect("client builds")
}

pub fn router_with(settings: Settings) -> Router {
    let grist = GristClient::new(&settings.grist).expect("client builds");
    build_router(
        AppState::new(Arc::new(grist)),
        &settings,
        Path::new("static"),
    )
}

pub fn router(base_url: &str) -> Router {
    router_with(settings(base_url, None))
}

pub fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn multipart_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    const BOUNDARY: &str = "grist-url-builder-boundary";
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get_with_key(uri: &str, key: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", key))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
