use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::Identity;
use crate::config::AuthConfig;
use crate::db::models::{Role, User};
use crate::db::RepositoryError;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const USER_EXISTS: &str = "User already exists";

// -- Request / response types --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Cookie helpers --

fn session_cookie(config: &AuthConfig, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}{}",
        config.cookie_name,
        token,
        config.token_ttl_secs,
        cookie_flags(config)
    )
}

fn clear_session_cookie(config: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; Path=/; Max-Age=0{}",
        config.cookie_name,
        cookie_flags(config)
    )
}

fn cookie_flags(config: &AuthConfig) -> &'static str {
    if config.secure_cookies {
        "; Secure; SameSite=None"
    } else {
        "; SameSite=Lax"
    }
}

fn signed_in(
    state: &AppState,
    status: StatusCode,
    message: &'static str,
    user: &User,
) -> AppResult<Response> {
    let issued = state
        .tokens
        .issue(&user.id, user.role)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let cookie = session_cookie(&state.config.auth, &issued.token);

    Ok((
        status,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(AuthResponse {
            message,
            token: issued.token,
        }),
    )
        .into_response())
}

// -- Handlers --

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username, email and password are required".into(),
        ));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest(USER_EXISTS.into()));
    }

    let password_hash = hash_password(&req.password, state.config.auth.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;

    let user = User {
        id: uuid::Uuid::now_v7().to_string(),
        username,
        email,
        password_hash,
        role: req.role.unwrap_or_default(),
        created_at: Utc::now().trunc_subsecs(6),
    };

    match state.users.insert(&user).await {
        Ok(()) => {}
        // Lost a race with a concurrent registration for the same email.
        Err(RepositoryError::Conflict(_)) => return Err(AppError::BadRequest(USER_EXISTS.into())),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user.id, role = %user.role, "Registered user");
    signed_in(
        &state,
        StatusCode::CREATED,
        "User registered successfully",
        &user,
    )
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(req) = payload?;

    // Unknown email and wrong password must be indistinguishable.
    let user = state
        .users
        .find_by_email(req.email.trim())
        .await?
        .ok_or_else(|| AppError::BadRequest(INVALID_CREDENTIALS.into()))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(AppError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    tracing::info!(user_id = %user.id, "User logged in");
    signed_in(&state, StatusCode::OK, "Login successful", &user)
}

/// GET /api/auth/logout
///
/// Only clears the cookie. The token itself stays valid until it expires.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie(&state.config.auth))]),
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Json<User>> {
    let user = state
        .users
        .find_by_id(&identity.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(user))
}
