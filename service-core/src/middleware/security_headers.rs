use axum::{
    extract::{Request, State},
    http::header::{self, HeaderValue},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;

/// Framing policy for [`security_headers_middleware`].
#[derive(Debug, Clone)]
pub struct SecurityHeadersPolicy {
    /// Paths that may be embedded in an iframe (e.g. a custom widget page).
    pub embeddable_paths: Vec<String>,
    /// Origins allowed to embed those paths, besides `'self'`.
    pub frame_ancestors: Vec<String>,
}

impl SecurityHeadersPolicy {
    fn is_embeddable(&self, path: &str) -> bool {
        self.embeddable_paths.iter().any(|p| p == path)
    }

    fn frame_ancestors_csp(&self) -> String {
        let mut csp = String::from("frame-ancestors 'self'");
        for origin in &self.frame_ancestors {
            csp.push(' ');
            csp.push_str(origin);
        }
        csp
    }
}

fn is_secure(req: &Request) -> bool {
    req.uri().scheme_str() == Some("https")
        || req
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

pub async fn security_headers_middleware(
    State(policy): State<Arc<SecurityHeadersPolicy>>,
    req: Request,
    next: Next,
) -> impl IntoResponse {
    let embeddable = policy.is_embeddable(req.uri().path());
    let secure = is_secure(&req);

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    if secure {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    if embeddable {
        if let Ok(csp) = HeaderValue::from_str(&policy.frame_ancestors_csp()) {
            headers.insert(header::CONTENT_SECURITY_POLICY, csp);
        }
    } else {
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, middleware::from_fn_with_state, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        let policy = Arc::new(SecurityHeadersPolicy {
            embeddable_paths: vec!["/widget".to_string()],
            frame_ancestors: vec!["https://grist.example.org".to_string()],
        });
        Router::new()
            .route("/", get(|| async { "index" }))
            .route("/widget", get(|| async { "widget" }))
            .layer(from_fn_with_state(policy, security_headers_middleware))
    }

    #[tokio::test]
    async fn pages_are_not_frameable_by_default() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers().get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert!(response.headers().get(header::STRICT_TRANSPORT_SECURITY).is_none());
    }

    #[tokio::test]
    async fn widget_allows_configured_ancestors() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/widget")
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(header::X_FRAME_OPTIONS).is_none());
        assert_eq!(
            response.headers().get(header::CONTENT_SECURITY_POLICY).unwrap(),
            "frame-ancestors 'self' https://grist.example.org"
        );
        assert!(response.headers().get(header::STRICT_TRANSPORT_SECURITY).is_some());
    }
}
