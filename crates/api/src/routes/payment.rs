use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use scribeflow_db::models::{Payment, PaymentStatus};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

// ---- POST /api/payments --------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPaymentRequest {
    #[validate(length(min = 11, max = 14))]
    pub phone_number: String,
    #[validate(length(min = 4, max = 64))]
    pub transaction_id: String,
    pub amount: i64,
    pub credits: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitPaymentResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub message: String,
}

pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<SubmitPaymentResponse>), ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    if !is_valid_bd_phone(&body.phone_number) {
        return Err(ApiError::BadRequest(
            "Invalid phone number format".to_string(),
        ));
    }
    if body.amount <= 0 || body.credits <= 0 {
        return Err(ApiError::BadRequest(
            "Amount and credits must be positive".to_string(),
        ));
    }

    let user = state.users.base.find_by_id(auth.user_id).await?;

    let payment = state
        .payments
        .submit(
            &user,
            body.phone_number,
            body.transaction_id,
            body.amount,
            body.credits,
        )
        .await
        .map_err(|e| match e {
            scribeflow_services::dao::base::DaoError::DuplicateKey(_) => {
                ApiError::Conflict("Transaction ID already exists".to_string())
            }
            other => other.into(),
        })?;

    let payment_id = payment
        .id
        .ok_or_else(|| ApiError::Internal("payment without id".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitPaymentResponse {
            payment_id: payment_id.to_hex(),
            status: payment.status,
            message: "Payment submitted for approval".to_string(),
        }),
    ))
}

/// Bangladeshi mobile numbers: optional +88 country code, then 01[3-9]
/// followed by 8 digits.
fn is_valid_bd_phone(phone: &str) -> bool {
    let local = phone.strip_prefix("+88").unwrap_or(phone);
    let bytes = local.as_bytes();
    bytes.len() == 11
        && local.starts_with("01")
        && (b'3'..=b'9').contains(&bytes[2])
        && bytes.iter().all(|b| b.is_ascii_digit())
}

// ---- GET /api/payments ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub phone_number: String,
    pub transaction_id: String,
    pub amount: i64,
    pub credits: i64,
    pub status: PaymentStatus,
    pub created_at: String,
    pub reviewed_at: Option<String>,
}

impl PaymentResponse {
    pub fn from_payment(payment: Payment) -> Self {
        Self {
            id: payment.id.map(|id| id.to_hex()).unwrap_or_default(),
            phone_number: payment.phone_number,
            transaction_id: payment.transaction_ref,
            amount: payment.amount,
            credits: payment.credits,
            status: payment.status,
            created_at: payment
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
            reviewed_at: payment
                .reviewed_at
                .and_then(|d| d.try_to_rfc3339_string().ok()),
        }
    }
}

pub async fn list_own(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments = state.payments.list_for_user(auth.user_id).await?;
    Ok(Json(
        payments
            .into_iter()
            .map(PaymentResponse::from_payment)
            .collect(),
    ))
}
