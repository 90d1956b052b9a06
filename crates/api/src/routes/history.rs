use axum::{Json, extract::State, http::StatusCode};
use scribeflow_db::models::{HistoryEntry, HistoryKind};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

const HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct SaveHistoryRequest {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub file_name: Option<String>,
    #[validate(length(min = 2, max = 16))]
    pub language: String,
    pub duration_secs: Option<f64>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub file_name: Option<String>,
    pub language: String,
    pub duration_secs: Option<f64>,
    pub confidence: Option<f64>,
    pub created_at: String,
}

impl HistoryResponse {
    pub fn from_entry(entry: HistoryEntry) -> Self {
        Self {
            id: entry.id.map(|id| id.to_hex()).unwrap_or_default(),
            text: entry.text,
            kind: entry.kind,
            file_name: entry.file_name,
            language: entry.language,
            duration_secs: entry.duration_secs,
            confidence: entry.confidence,
            created_at: entry
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<HistoryResponse>>, ApiError> {
    let entries = state
        .history
        .list_for_user(auth.user_id, HISTORY_LIMIT)
        .await?;
    Ok(Json(
        entries.into_iter().map(HistoryResponse::from_entry).collect(),
    ))
}

pub async fn save(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SaveHistoryRequest>,
) -> Result<(StatusCode, Json<HistoryResponse>), ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let entry = state
        .history
        .add(
            auth.user_id,
            body.text,
            body.kind,
            body.file_name,
            body.language,
            body.duration_secs,
            body.confidence,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(HistoryResponse::from_entry(entry))))
}
