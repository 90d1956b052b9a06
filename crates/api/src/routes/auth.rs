use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use scribeflow_db::models::{Plan, TransactionType, User, UserRole};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

const WELCOME_DESCRIPTION: &str = "Welcome credits";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub credits: i64,
    pub plan: Plan,
    pub role: UserRole,
}

impl UserResponse {
    fn from_user(user: &User, credits: i64) -> Result<Self, ApiError> {
        let id = user
            .id
            .ok_or_else(|| ApiError::Internal("user without id".to_string()))?;
        Ok(Self {
            id: id.to_hex(),
            email: user.email.clone(),
            name: user.name.clone(),
            credits,
            plan: user.plan,
            role: user.role,
        })
    }
}

fn session_cookie(token: &str, max_age: u64) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let cookie = format!(
        "access_token={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        token, max_age
    );
    let value = cookie
        .parse()
        .map_err(|_| ApiError::Internal("invalid cookie header".to_string()))?;
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let password_hash = state.auth.hash_password(&body.password)?;

    let user = state
        .users
        .create(body.email.clone(), body.name.clone(), password_hash)
        .await
        .map_err(|e| match e {
            scribeflow_services::dao::base::DaoError::DuplicateKey(_) => {
                ApiError::Conflict("User already exists".to_string())
            }
            other => other.into(),
        })?;

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("user without id".to_string()))?;

    // The welcome grant goes through the ledger so the transaction audit
    // covers the full balance from day one.
    let credits = state
        .credits
        .adjust(
            user_id,
            state.settings.credits.welcome_grant,
            TransactionType::Bonus,
            WELCOME_DESCRIPTION,
            None,
        )
        .await?;

    let tokens = state
        .auth
        .generate_tokens(user_id, &user.email, &user.name, user.role)?;

    let headers = session_cookie(&tokens.access_token, tokens.expires_in)?;

    let response = AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: UserResponse::from_user(&user, credits)?,
    };

    Ok((StatusCode::CREATED, headers, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let user = state
        .users
        .find_by_email(&body.email)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let password_hash = user
        .password_hash
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("No password set".to_string()))?;

    let valid = state.auth.verify_password(&body.password, password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::Internal("user without id".to_string()))?;
    state.users.touch_login(user_id).await?;

    let tokens = state
        .auth
        .generate_tokens(user_id, &user.email, &user.name, user.role)?;

    let headers = session_cookie(&tokens.access_token, tokens.expires_in)?;

    let response = AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: UserResponse::from_user(&user, user.credits)?,
    };

    Ok((headers, Json(response)))
}

pub async fn logout() -> Result<HeaderMap, ApiError> {
    session_cookie("", 0)
}

/// Returns the current user with their authoritative balance; clients seed
/// their local balance mirror from this.
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.base.find_by_id(auth.user_id).await?;
    Ok(Json(UserResponse::from_user(&user, user.credits)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let claims = state.auth.verify_refresh_token(&body.refresh_token)?;

    let user_id = bson::oid::ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid user ID".to_string()))?;

    let user = state.users.base.find_by_id(user_id).await?;

    let tokens = state
        .auth
        .generate_tokens(user_id, &user.email, &user.name, user.role)?;

    let headers = session_cookie(&tokens.access_token, tokens.expires_in)?;

    let response = AuthResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
        user: UserResponse::from_user(&user, user.credits)?,
    };

    Ok((headers, Json(response)))
}
