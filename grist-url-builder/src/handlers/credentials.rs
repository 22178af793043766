use crate::models::{BearerCredential, UpstreamError};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct CredentialCheckRequest {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialCheckResponse {
    pub success: bool,
    pub message: String,
    pub status: u16,
}

fn respond(status: StatusCode, success: bool, message: String) -> Response {
    (
        status,
        Json(CredentialCheckResponse {
            success,
            message,
            status: status.as_u16(),
        }),
    )
        .into_response()
}

/// `POST /test_api`: check that Grist accepts the supplied API key.
///
/// The configured default key is never used here; an absent key is a 400.
pub async fn test_api(
    State(state): State<AppState>,
    header: BearerCredential,
    payload: Result<Json<CredentialCheckRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if header.0.is_none() => {
            return respond(
                StatusCode::BAD_REQUEST,
                false,
                format!("Requête invalide: {}", rejection.body_text()),
            );
        }
        Err(_) => CredentialCheckRequest::default(),
    };

    let Some(credential) = header.or_field(request.api_key.as_deref()) else {
        return respond(
            StatusCode::BAD_REQUEST,
            false,
            "Token API manquant".to_string(),
        );
    };

    match state.grist.validate_credential(&credential).await {
        Ok(count) => respond(
            StatusCode::OK,
            true,
            format!(
                "Token API valide ! Vous avez accès à {} organisation(s).",
                count
            ),
        ),
        Err(UpstreamError::Status { status, body }) => respond(
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            false,
            format!("Erreur {}: {}", status, body),
        ),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            false,
            format!("Erreur de connexion: {}", e),
        ),
    }
}
