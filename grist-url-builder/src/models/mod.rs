pub mod credential;
pub mod lookup;

pub use credential::{BearerCredential, Credential};
pub use lookup::Lookup;
pub use url_test::{UrlTestOutcome, UrlTestReport};

use thiserror::Error;

/// Failure of a single call to the Grist API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("API key required")]
    MissingCredential,

    #[error("Connection error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("URL does not target the configured Grist instance: {0}")]
    ForeignHost(String),
}

impl UpstreamError {
    /// HTTP status returned by Grist, when the call got that far.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::MissingCredential => "missing_credential",
            UpstreamError::Transport(_) => "transport",
            UpstreamError::Status { .. } => "status",
            UpstreamError::Decode(_) => "decode",
            UpstreamError::ForeignHost(_) => "foreign_host",
        }
    }
}
