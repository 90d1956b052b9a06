use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::oid::ObjectId;
use scribeflow_db::models::{Plan, TransactionType, User, UserRole};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::ApiError,
    extractors::auth::AdminUser,
    routes::history::HistoryResponse,
    routes::payment::PaymentResponse,
    state::AppState,
    ws::dispatcher,
};
use scribeflow_services::dao::base::PaginationParams;

const ADMIN_HISTORY_LIMIT: i64 = 50;

// ---- GET /api/admin/users ------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AdminUserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub credits: i64,
    pub plan: Plan,
    pub role: UserRole,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

impl AdminUserResponse {
    fn from_user(user: User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email,
            name: user.name,
            credits: user.credits,
            plan: user.plan,
            role: user.role,
            created_at: user
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
            last_login_at: user
                .last_login_at
                .and_then(|d| d.try_to_rfc3339_string().ok()),
        }
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = state.users.list(&params).await?;

    let items: Vec<AdminUserResponse> = result
        .items
        .into_iter()
        .map(AdminUserResponse::from_user)
        .collect();

    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}

// ---- GET /api/admin/users/{user_id} --------------------------------------

pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let uid = parse_oid(&user_id)?;
    let user = state.users.base.find_by_id(uid).await?;
    let history = state.history.list_for_user(uid, ADMIN_HISTORY_LIMIT).await?;

    let history: Vec<HistoryResponse> = history
        .into_iter()
        .map(HistoryResponse::from_entry)
        .collect();

    Ok(Json(serde_json::json!({
        "user": AdminUserResponse::from_user(user),
        "history": history,
    })))
}

// ---- GET /api/admin/payments ---------------------------------------------

#[derive(Debug, Serialize)]
pub struct AdminPaymentResponse {
    pub user_name: String,
    pub user_email: String,
    #[serde(flatten)]
    pub payment: PaymentResponse,
}

pub async fn list_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = state.payments.list_all(&params).await?;

    let items: Vec<AdminPaymentResponse> = result
        .items
        .into_iter()
        .map(|p| AdminPaymentResponse {
            user_name: p.user_name.clone(),
            user_email: p.user_email.clone(),
            payment: PaymentResponse::from_payment(p),
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

// ---- PATCH /api/admin/payments/{payment_id} ------------------------------

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: String,
}

pub async fn review_payment(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(payment_id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let approve = match body.status.as_str() {
        "approved" => true,
        "rejected" => false,
        _ => {
            return Err(ApiError::BadRequest(
                "Status must be 'approved' or 'rejected'".to_string(),
            ));
        }
    };

    let pid = parse_oid(&payment_id)?;
    let payment = state.payments.review(pid, approve, admin.user_id).await?;

    if approve {
        let description = format!("Payment approved - {}", payment.transaction_ref);
        let credits = state
            .credits
            .adjust(
                payment.user_id,
                payment.credits,
                TransactionType::Purchase,
                &description,
                Some(pid),
            )
            .await?;

        // Push the fresh balance to the user's open tabs.
        let event = serde_json::json!({
            "type": "balance:update",
            "data": { "credits": credits },
        });
        dispatcher::send_to_user(&state.ws_storage, &payment.user_id, &event).await;
    }

    info!(
        payment_id = %pid,
        reviewer = %admin.email,
        approved = approve,
        "payment reviewed"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Payment {} successfully", body.status),
    })))
}

fn parse_oid(s: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(s).map_err(|_| ApiError::BadRequest(format!("Invalid ObjectId: {s}")))
}
