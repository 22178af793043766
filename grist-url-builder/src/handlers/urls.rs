use crate::models::{BearerCredential, UrlTestOutcome};
use crate::services::filter_url;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

const GENERATE_FIELDS_REQUIRED: &str = "Document ID, table et colonne requis";
const TEST_FIELDS_REQUIRED: &str = "URL et valeur de test requis";

#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerateUrlForm {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub doc_id: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub table_name: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub column_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateUrlResponse {
    pub url: String,
    pub doc_name: String,
    pub doc_id: String,
    pub table: String,
    pub column: String,
    pub format_info: String,
    pub usage: String,
}

fn fields_required() -> AppError {
    AppError::BadRequest(anyhow::anyhow!(GENERATE_FIELDS_REQUIRED))
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

impl GenerateUrlForm {
    /// Read the form from a `multipart/form-data` body, as sent by
    /// `FormData` in the browser. Unknown fields are ignored.
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::warn!(error = %e, "Rejected generate_url multipart body");
            fields_required()
        })? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field.text().await.map_err(|e| {
                tracing::warn!(error = %e, field = %name, "Unreadable multipart field");
                fields_required()
            })?;

            match name.as_str() {
                "doc_id" => form.doc_id = value,
                "table_name" => form.table_name = value,
                "column_name" => form.column_name = value,
                "api_key" => form.api_key = Some(value),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Read the form from either a urlencoded or a multipart body.
    async fn read(request: Request, state: &AppState) -> Result<Self, AppError> {
        if is_multipart(&request) {
            let multipart = Multipart::from_request(request, state).await.map_err(|e| {
                tracing::warn!(error = %e, "Rejected generate_url multipart body");
                fields_required()
            })?;
            Self::from_multipart(multipart).await
        } else {
            let Form(form) = Form::<Self>::from_request(request, state)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, "Rejected generate_url form");
                    fields_required()
                })?;
            Ok(form)
        }
    }
}

/// `POST /generate_url`: build the filter URL template for a column.
///
/// Accepts `application/x-www-form-urlencoded` and `multipart/form-data`.
pub async fn generate_url(
    State(state): State<AppState>,
    header: BearerCredential,
    request: Request,
) -> Result<Json<GenerateUrlResponse>, AppError> {
    let form = GenerateUrlForm::read(request, &state).await?;

    form.validate().map_err(|_| fields_required())?;

    let credential = header.or_field(form.api_key.as_deref());
    let doc_name = state
        .grist
        .get_document_info(&form.doc_id, credential.as_ref())
        .await
        .into_value();

    let url = state
        .grist
        .generate_filter_url(&form.doc_id, &form.table_name, &form.column_name);

    Ok(Json(GenerateUrlResponse {
        url,
        doc_name,
        format_info: format!(
            "Le placeholder {} sera remplacé par la valeur du champ (avec guillemets automatiques)",
            filter_url::ID_PLACEHOLDER
        ),
        usage: format!(
            "Cette URL filtrera la table \"{}\" sur la colonne \"{}\" avec la valeur saisie à la place de {}",
            form.table_name,
            form.column_name,
            filter_url::ID_PLACEHOLDER
        ),
        doc_id: form.doc_id,
        table: form.table_name,
        column: form.column_name,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TestUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub test_value: Option<Value>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestUrlSuccess {
    pub success: bool,
    pub data: Value,
    pub test_url: String,
    pub status_code: u16,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TestUrlFailure {
    pub success: bool,
    pub error: String,
    pub test_url: String,
}

/// `POST /test_url`: fill `{id}` with a test value and call the URL.
pub async fn test_url(
    State(state): State<AppState>,
    header: BearerCredential,
    payload: Result<Json<TestUrlRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Rejected test_url body");
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": format!("Erreur lors du test: {}", rejection.body_text()),
                })),
            )
                .into_response());
        }
    };

    let url = request.url.filter(|url| !url.trim().is_empty());
    let test_value = request.test_value.as_ref().and_then(filter_url::test_value_text);
    let (Some(url), Some(test_value)) = (url, test_value) else {
        return Err(AppError::BadRequest(anyhow::anyhow!(TEST_FIELDS_REQUIRED)));
    };

    let credential = header.or_field(request.api_key.as_deref());
    let report = state
        .grist
        .test_url(&url, &test_value, credential.as_ref())
        .await;

    let record_count = report.record_count();
    let response = match report.outcome {
        UrlTestOutcome::Passed { data, status_code } => Json(TestUrlSuccess {
            success: true,
            data,
            test_url: report.test_url,
            status_code,
            message: format!(
                "Test réussi avec {} enregistrement(s) trouvé(s)",
                record_count
            ),
        })
        .into_response(),
        UrlTestOutcome::Failed { error, .. } => (
            StatusCode::BAD_REQUEST,
            Json(TestUrlFailure {
                success: false,
                error,
                test_url: report.test_url,
            }),
        )
            .into_response(),
    };

    Ok(response)
}
