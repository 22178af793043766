use crate::models::BearerCredential;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};

/// `GET /api/tables/:doc_id`: user tables of a document, `[]` when Grist
/// cannot be reached or refuses the key.
pub async fn list_tables(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    Path(doc_id): Path<String>,
) -> Json<Vec<String>> {
    let tables = state.grist.get_tables(&doc_id, credential.as_ref()).await;
    Json(tables.into_value())
}

/// `GET /api/columns/:doc_id/:table_name`: column ids of a table, `[]` on
/// failure.
pub async fn list_columns(
    State(state): State<AppState>,
    BearerCredential(credential): BearerCredential,
    Path((doc_id, table_name)): Path<(String, String)>,
) -> Json<Vec<String>> {
    let columns = state
        .grist
        .get_columns(&doc_id, &table_name, credential.as_ref())
        .await;
    Json(columns.into_value())
}
