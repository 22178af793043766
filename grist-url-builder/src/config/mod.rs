use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;
use std::path::PathBuf;

/// Crate directory name, used to locate `config/` and `static/`.
pub const SERVICE_DIR: &str = "grist-url-builder";

/// Environment variable read as the default API key when none is configured.
pub const LEGACY_API_KEY_VAR: &str = "GRIST_API_KEY";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub grist: GristSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone)]
pub struct GristSettings {
    /// Root of the Grist instance, without the `/api` suffix.
    #[serde(default = "default_grist_base_url")]
    pub base_url: String,
    /// Default API key used when a request does not carry one.
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    /// Upper bound on every outbound call.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_grist_base_url() -> String {
    "https://grist.numerique.gouv.fr".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

/// Per-client-IP quotas.
#[derive(Deserialize, Clone)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Key clients on the first `x-forwarded-for` hop rather than the peer
    /// address. Enable only behind a proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
    /// Requests per day across pages and API endpoints.
    #[serde(default = "default_global_per_day")]
    pub global_per_day: u32,
    /// Requests per hour across pages and API endpoints.
    #[serde(default = "default_global_per_hour")]
    pub global_per_hour: u32,
    #[serde(default = "default_test_api_per_minute")]
    pub test_api_per_minute: u32,
    #[serde(default = "default_generate_url_per_minute")]
    pub generate_url_per_minute: u32,
    #[serde(default = "default_test_url_per_minute")]
    pub test_url_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_forwarded_for: false,
            global_per_day: default_global_per_day(),
            global_per_hour: default_global_per_hour(),
            test_api_per_minute: default_test_api_per_minute(),
            generate_url_per_minute: default_generate_url_per_minute(),
            test_url_per_minute: default_test_url_per_minute(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_global_per_day() -> u32 {
    200
}

fn default_global_per_hour() -> u32 {
    50
}

fn default_test_api_per_minute() -> u32 {
    10
}

fn default_generate_url_per_minute() -> u32 {
    20
}

fn default_test_url_per_minute() -> u32 {
    15
}

#[derive(Deserialize, Clone)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP/gRPC collector; span export is off when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let mut settings: Settings = service_core::config::load_settings(SERVICE_DIR)?;

    if settings.grist.api_key.is_none() {
        settings.grist.api_key = std::env::var(LEGACY_API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Secret::new);
    }

    Ok(settings)
}

/// Directory served under `/static`, next to `config/`.
pub fn static_directory() -> PathBuf {
    service_core::config::configuration_directory(SERVICE_DIR)
        .map(|config_dir| config_dir.with_file_name("static"))
        .unwrap_or_else(|_| PathBuf::from("static"))
}
