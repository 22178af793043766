use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use secrecy::{ExposeSecret, Secret};
use std::convert::Infallible;

/// Grist API key. The token itself never appears in `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct Credential(Secret<String>);

impl Credential {
    /// Blank input (empty or whitespace only) is treated as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Secret::new(trimmed.to_string())))
        }
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<Secret<String>> for Credential {
    fn from(secret: Secret<String>) -> Self {
        Self(secret)
    }
}

/// Credential carried by an `Authorization: Bearer <token>` request header.
///
/// Never rejects: a missing or malformed header yields `None`.
#[derive(Debug, Clone, Default)]
pub struct BearerCredential(pub Option<Credential>);

impl BearerCredential {
    /// Header credential first, then the body/form field.
    pub fn or_field(self, field: Option<&str>) -> Option<Credential> {
        self.0.or_else(|| field.and_then(Credential::parse))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let credential = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()
            .and_then(|TypedHeader(Authorization(bearer))| Credential::parse(bearer.token()));

        Ok(Self(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> BearerCredential {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        BearerCredential::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[test]
    fn blank_input_is_absent() {
        assert!(Credential::parse("").is_none());
        assert!(Credential::parse("   ").is_none());
        assert_eq!(Credential::parse(" key ").unwrap().expose(), "key");
    }

    #[test]
    fn debug_output_is_redacted() {
        let credential = Credential::parse("super-secret-token").unwrap();
        assert!(!format!("{:?}", credential).contains("super-secret-token"));
    }

    #[tokio::test]
    async fn reads_bearer_header() {
        let BearerCredential(credential) = extract(Some("Bearer abc123")).await;
        assert_eq!(credential.unwrap().expose(), "abc123");
    }

    #[tokio::test]
    async fn missing_or_foreign_scheme_is_none() {
        assert!(extract(None).await.0.is_none());
        assert!(extract(Some("Basic dXNlcjpwYXNz")).await.0.is_none());
    }

    #[tokio::test]
    async fn header_wins_over_field() {
        let credential = extract(Some("Bearer from-header"))
            .await
            .or_field(Some("from-body"))
            .unwrap();
        assert_eq!(credential.expose(), "from-header");

        let credential = BearerCredential(None).or_field(Some("from-body")).unwrap();
        assert_eq!(credential.expose(), "from-body");
    }
}
