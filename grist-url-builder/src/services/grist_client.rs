//! Client for the Grist document/table/column REST API.
//!
//! Built once at startup and shared read-only between handlers. Lookups
//! used to fill the UI degrade to a default through [`Lookup`] instead of
//! failing, so handlers never need per-call error handling for them.

use crate::config::GristSettings;
use crate::models::{Credential, Lookup, UpstreamError, UrlTestReport};
use crate::services::filter_url;
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use service_core::observability::TracedClientExt;
use std::time::Duration;

/// Name reported when a document's name cannot be determined.
pub const UNNAMED_DOCUMENT: &str = "Document sans nom";

/// System and demo tables hidden from table listings.
pub const EXCLUDED_TABLES: [&str; 14] = [
    "GristDocTour",
    "GristHidden_import",
    "_grist_Tables",
    "_grist_Tables_column",
    "_grist_Views",
    "_grist_Views_section",
    "_grist_Views_section_field",
    "_grist_TabBar",
    "_grist_Pages",
    "_grist_Attachments",
    "_grist_Cells",
    "_grist_ACLResources",
    "_grist_ACLRules",
    "_grist_ACLMemberships",
];

const SYSTEM_TABLE_PREFIX: &str = "_grist_";

/// Upstream error bodies are cut to this many characters before being
/// surfaced to the browser.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct IdEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TablesResponse {
    #[serde(default)]
    tables: Vec<IdEntry>,
}

#[derive(Debug, Deserialize)]
struct ColumnsResponse {
    #[serde(default)]
    columns: Vec<IdEntry>,
}

/// Drop `_grist_*` tables and the known system/demo tables, keeping order.
pub fn filter_user_tables<I>(table_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    table_ids
        .into_iter()
        .filter(|id| !id.starts_with(SYSTEM_TABLE_PREFIX) && !EXCLUDED_TABLES.contains(&id.as_str()))
        .collect()
}

fn document_name(metadata: &Value) -> Option<String> {
    ["name", "title", "docName"].iter().find_map(|field| {
        metadata
            .get(*field)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    })
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub struct GristClient {
    client: Client,
    base_url: String,
    default_credential: Option<Credential>,
}

impl GristClient {
    pub fn new(settings: &GristSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            default_credential: settings.api_key.clone().map(Credential::from),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resolve_credential<'a>(
        &'a self,
        credential: Option<&'a Credential>,
    ) -> Result<&'a Credential, UpstreamError> {
        credential
            .or(self.default_credential.as_ref())
            .ok_or(UpstreamError::MissingCredential)
    }

    /// Single authenticated GET, decoding a 2xx JSON body as `T`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        credential: &Credential,
    ) -> Result<(StatusCode, T), UpstreamError> {
        let result = self.send_get(url, credential).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        counter!(
            "grist_upstream_requests_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        result
    }

    async fn send_get<T: DeserializeOwned>(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<(StatusCode, T), UpstreamError> {
        let response = self
            .client
            .traced_get(url)
            .bearer_auth(credential.expose())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let data = response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        Ok((status, data))
    }

    /// Display name of a document, or [`UNNAMED_DOCUMENT`].
    #[tracing::instrument(skip(self, credential))]
    pub async fn get_document_info(
        &self,
        doc_id: &str,
        credential: Option<&Credential>,
    ) -> Lookup<String> {
        let url = format!("{}/api/docs/{}", self.base_url, urlencoding::encode(doc_id));

        let result = match self.resolve_credential(credential) {
            Ok(credential) => self.get_json::<Value>("document_info", &url, credential).await,
            Err(e) => Err(e),
        };

        match result {
            Ok((status, metadata)) if status == StatusCode::OK => {
                let name = document_name(&metadata).unwrap_or_else(|| UNNAMED_DOCUMENT.to_string());
                tracing::info!(doc_name = %name, "Resolved document name");
                Lookup::Found(name)
            }
            Ok((status, _)) => {
                tracing::warn!(status = status.as_u16(), "Unexpected status for document info");
                Lookup::Fallback {
                    value: UNNAMED_DOCUMENT.to_string(),
                    cause: UpstreamError::Status {
                        status: status.as_u16(),
                        body: String::new(),
                    },
                }
            }
            Err(cause) => {
                tracing::warn!(error = %cause, "Failed to fetch document info");
                Lookup::Fallback {
                    value: UNNAMED_DOCUMENT.to_string(),
                    cause,
                }
            }
        }
    }

    /// User tables of a document; empty when the listing fails.
    #[tracing::instrument(skip(self, credential))]
    pub async fn get_tables(
        &self,
        doc_id: &str,
        credential: Option<&Credential>,
    ) -> Lookup<Vec<String>> {
        let url = format!(
            "{}/api/docs/{}/tables",
            self.base_url,
            urlencoding::encode(doc_id)
        );

        let result = match self.resolve_credential(credential) {
            Ok(credential) => {
                self.get_json::<TablesResponse>("tables", &url, credential)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((_, response)) => {
                let total = response.tables.len();
                let tables = filter_user_tables(response.tables.into_iter().map(|t| t.id));
                tracing::info!(total, displayed = tables.len(), "Listed document tables");
                Lookup::Found(tables)
            }
            Err(cause) => {
                tracing::warn!(error = %cause, "Failed to list tables");
                Lookup::Fallback {
                    value: Vec::new(),
                    cause,
                }
            }
        }
    }

    /// Column ids of a table; empty when the listing fails.
    #[tracing::instrument(skip(self, credential))]
    pub async fn get_columns(
        &self,
        doc_id: &str,
        table_name: &str,
        credential: Option<&Credential>,
    ) -> Lookup<Vec<String>> {
        let url = format!(
            "{}/api/docs/{}/tables/{}/columns",
            self.base_url,
            urlencoding::encode(doc_id),
            urlencoding::encode(table_name)
        );

        let result = match self.resolve_credential(credential) {
            Ok(credential) => {
                self.get_json::<ColumnsResponse>("columns", &url, credential)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((_, response)) => {
                let columns: Vec<String> = response.columns.into_iter().map(|c| c.id).collect();
                tracing::info!(count = columns.len(), "Listed table columns");
                Lookup::Found(columns)
            }
            Err(cause) => {
                tracing::warn!(error = %cause, "Failed to list columns");
                Lookup::Fallback {
                    value: Vec::new(),
                    cause,
                }
            }
        }
    }

    /// Records URL filtering `table_name` on `column_name`, with a literal
    /// `{id}` where the record key goes.
    pub fn generate_filter_url(&self, doc_id: &str, table_name: &str, column_name: &str) -> String {
        let url = filter_url::build_template(&self.base_url, doc_id, table_name, column_name);
        tracing::debug!(
            filter = filter_url::decoded_filter(&url).as_deref().unwrap_or_default(),
            "Generated filter URL"
        );
        url
    }

    /// Fill `{id}` with `test_value` and fetch the resulting URL.
    ///
    /// Never fails: errors are reported in the returned [`UrlTestReport`].
    /// URLs outside the configured Grist instance are refused without a
    /// request so the credential is never sent elsewhere.
    #[tracing::instrument(skip(self, url_template, credential))]
    pub async fn test_url(
        &self,
        url_template: &str,
        test_value: &str,
        credential: Option<&Credential>,
    ) -> UrlTestReport {
        let test_url = filter_url::substitute(url_template, test_value);

        if !test_url.starts_with(&format!("{}/", self.base_url)) {
            let error = UpstreamError::ForeignHost(test_url.clone());
            tracing::warn!(error = %error, "Refused to test URL");
            return UrlTestReport::failed(test_url, error.to_string(), None);
        }

        let result = match self.resolve_credential(credential) {
            Ok(credential) => self.get_json::<Value>("test_url", &test_url, credential).await,
            Err(e) => Err(e),
        };

        match result {
            Ok((status, data)) => {
                let report = UrlTestReport::passed(test_url, data, status.as_u16());
                tracing::info!(records = report.record_count(), "URL test succeeded");
                report
            }
            Err(e) => {
                tracing::warn!(error = %e, "URL test failed");
                UrlTestReport::failed(test_url, e.to_string(), e.status_code())
            }
        }
    }

    /// Probe `GET /api/orgs` with `credential` and return how many
    /// organisations it can access.
    ///
    /// Unlike the lookups this never falls back to the default credential.
    #[tracing::instrument(skip(self, credential))]
    pub async fn validate_credential(&self, credential: &Credential) -> Result<usize, UpstreamError> {
        let url = format!("{}/api/orgs", self.base_url);
        let (status, orgs) = self.get_json::<Value>("orgs", &url, credential).await?;

        if status != StatusCode::OK {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }

        let count = match &orgs {
            Value::Array(items) => items.len(),
            Value::Object(fields) => fields.len(),
            _ => 0,
        };
        tracing::info!(organisations = count, "Credential accepted");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn filters_system_and_demo_tables() {
        let tables = filter_user_tables(ids(&["_grist_Tables", "Projects", "GristDocTour"]));
        assert_eq!(tables, ids(&["Projects"]));
    }

    #[test]
    fn filtering_preserves_order_of_user_tables() {
        let input = ids(&[
            "Zeta",
            "_grist_Anything",
            "Alpha",
            "GristHidden_import",
            "Middle",
            "_grist_ACLRules",
        ]);
        assert_eq!(filter_user_tables(input), ids(&["Zeta", "Alpha", "Middle"]));
    }

    #[test]
    fn every_excluded_name_is_removed() {
        let input: Vec<String> = EXCLUDED_TABLES.iter().map(|s| s.to_string()).collect();
        assert!(filter_user_tables(input).is_empty());
    }

    #[test]
    fn underscore_tables_without_prefix_are_kept() {
        let tables = filter_user_tables(ids(&["_private", "grist_Tables"]));
        assert_eq!(tables, ids(&["_private", "grist_Tables"]));
    }

    #[test]
    fn document_name_prefers_name_then_title_then_doc_name() {
        assert_eq!(
            document_name(&json!({"name": "Budget", "title": "T", "docName": "D"})),
            Some("Budget".to_string())
        );
        assert_eq!(
            document_name(&json!({"name": "", "title": "Titre"})),
            Some("Titre".to_string())
        );
        assert_eq!(
            document_name(&json!({"docName": "Doc"})),
            Some("Doc".to_string())
        );
        assert_eq!(document_name(&json!({"id": "abc"})), None);
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("éèàç", 2), "éè");
        assert_eq!(truncate("short", 200), "short");
    }
}
