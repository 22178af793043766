use askama::Template;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::any::Any;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {}

#[derive(Template)]
#[template(path = "widget.html")]
pub struct WidgetTemplate {}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {}

#[derive(Template)]
#[template(path = "500.html")]
pub struct ServerErrorTemplate {}

pub async fn index() -> impl IntoResponse {
    IndexTemplate {}
}

/// Page embedded in Grist as a custom widget.
pub async fn widget() -> impl IntoResponse {
    WidgetTemplate {}
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "grist-url-builder",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate {})
}

/// Response for a panicking handler; plugged into `CatchPanicLayer`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, ServerErrorTemplate {}).into_response()
}
