use axum::{
    Json,
    extract::{Query, State},
};
use scribeflow_db::models::TransactionType;
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};
use scribeflow_services::dao::base::PaginationParams;

// ---- POST /api/credits/adjust --------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub amount: i64,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: TransactionType,
    #[serde(default = "default_description")]
    pub description: String,
}

fn default_kind() -> TransactionType {
    TransactionType::Usage
}

fn default_description() -> String {
    "Credit usage".to_string()
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub credits: i64,
}

/// Applies a signed delta to the caller's balance. Decrements clamp at
/// zero server-side; the response always carries the authoritative balance.
pub async fn adjust(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<AdjustRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    if body.amount == 0 {
        return Err(ApiError::BadRequest("Invalid amount".to_string()));
    }

    let credits = state
        .credits
        .adjust(auth.user_id, body.amount, body.kind, &body.description, None)
        .await?;

    Ok(Json(BalanceResponse { credits }))
}

// ---- GET /api/credits/transactions ---------------------------------------

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: String,
    pub payment_id: Option<String>,
    pub created_at: String,
}

pub async fn transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = state.credits.transactions_for(auth.user_id, &params).await?;

    let items: Vec<TransactionResponse> = result
        .items
        .into_iter()
        .map(|t| TransactionResponse {
            id: t.id.map(|id| id.to_hex()).unwrap_or_default(),
            amount: t.amount,
            kind: t.kind,
            description: t.description,
            payment_id: t.payment_id.map(|id| id.to_hex()),
            created_at: t.created_at.try_to_rfc3339_string().unwrap_or_default(),
        })
        .collect();

    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}
