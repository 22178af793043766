use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, MethodRouter},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{
        create_ip_rate_limiter, ip_rate_limit_middleware, spawn_limiter_pruning, IpRateLimit,
        IpRateLimiter,
    },
    security_headers::{security_headers_middleware, SecurityHeadersPolicy},
    tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{static_directory, RateLimitSettings, Settings};
use crate::handlers::{
    app::{handle_panic, health_check, index, not_found, widget},
    credentials::test_api,
    listings::{list_columns, list_tables},
    metrics::metrics,
    urls::{generate_url, test_url},
};
use crate::services::GristClient;
use crate::AppState;

/// How often idle entries are dropped from the rate limiters.
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

/// Per-IP limiters for the global and per-endpoint quotas.
pub struct RateLimiters {
    enabled: bool,
    trust_forwarded_for: bool,
    per_day: IpRateLimiter,
    per_hour: IpRateLimiter,
    test_api: IpRateLimiter,
    generate_url: IpRateLimiter,
    test_url: IpRateLimiter,
}

impl RateLimiters {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            enabled: settings.enabled,
            trust_forwarded_for: settings.trust_forwarded_for,
            per_day: create_ip_rate_limiter(settings.global_per_day, 86_400),
            per_hour: create_ip_rate_limiter(settings.global_per_hour, 3_600),
            test_api: create_ip_rate_limiter(settings.test_api_per_minute, 60),
            generate_url: create_ip_rate_limiter(settings.generate_url_per_minute, 60),
            test_url: create_ip_rate_limiter(settings.test_url_per_minute, 60),
        }
    }

    fn state(&self, limiter: &IpRateLimiter) -> IpRateLimit {
        IpRateLimit {
            limiter: limiter.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }

    fn limit_route(
        &self,
        route: MethodRouter<AppState>,
        limiter: &IpRateLimiter,
    ) -> MethodRouter<AppState> {
        if self.enabled {
            route.layer(from_fn_with_state(self.state(limiter), ip_rate_limit_middleware))
        } else {
            route
        }
    }

    fn limit_router(&self, router: Router<AppState>) -> Router<AppState> {
        if self.enabled {
            router
                .layer(from_fn_with_state(self.state(&self.per_hour), ip_rate_limit_middleware))
                .layer(from_fn_with_state(self.state(&self.per_day), ip_rate_limit_middleware))
        } else {
            router
        }
    }

    /// Start the background task that prunes idle client entries.
    pub fn spawn_pruning(&self) -> Option<JoinHandle<()>> {
        self.enabled.then(|| {
            spawn_limiter_pruning(
                vec![
                    self.per_day.clone(),
                    self.per_hour.clone(),
                    self.test_api.clone(),
                    self.generate_url.clone(),
                    self.test_url.clone(),
                ],
                LIMITER_PRUNE_INTERVAL,
            )
        })
    }
}

pub fn build_router(state: AppState, settings: &Settings, static_dir: &Path) -> Router {
    let limiters = RateLimiters::new(&settings.rate_limit);
    build_router_with_limiters(state, &limiters, static_dir)
}

pub fn build_router_with_limiters(
    state: AppState,
    limiters: &RateLimiters,
    static_dir: &Path,
) -> Router {
    let app_routes = Router::new()
        .route("/", get(index))
        .route("/widget", get(widget))
        .route("/test_api", limiters.limit_route(post(test_api), &limiters.test_api))
        .route("/api/tables/:doc_id", get(list_tables))
        .route("/api/columns/:doc_id/:table_name", get(list_columns))
        .route(
            "/generate_url",
            limiters.limit_route(post(generate_url), &limiters.generate_url),
        )
        .route("/test_url", limiters.limit_route(post(test_url), &limiters.test_url));
    let app_routes = limiters.limit_router(app_routes);

    let security_policy = Arc::new(SecurityHeadersPolicy {
        embeddable_paths: vec!["/widget".to_string()],
        frame_ancestors: vec![state.grist.base_url().to_string()],
    });

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .merge(app_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(not_found)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn_with_state(
            security_policy,
            security_headers_middleware,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Bound listener plus router, ready to serve.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        let grist = GristClient::new(&settings.grist)?;
        let state = AppState::new(Arc::new(grist));
        let limiters = RateLimiters::new(&settings.rate_limit);
        limiters.spawn_pruning();
        let router = build_router_with_limiters(state, &limiters, &static_directory());

        let address = format!("{}:{}", settings.server.host, settings.server.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        tracing::info!(port = self.port, "Starting grist-url-builder");
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
