use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::token::Identity;
use crate::error::AppError;
use crate::state::AppState;

const NO_TOKEN: &str = "No token, authorization denied";
const BAD_TOKEN: &str = "Token is not valid";
const ADMIN_ONLY: &str = "Access denied, admin only";

/// Middleware that verifies the session token and attaches the caller's
/// `Identity` to the request extensions.
///
/// The session cookie wins over an `Authorization: Bearer` header.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers(), &state.config.auth.cookie_name)
        .ok_or_else(|| AppError::Unauthorized(NO_TOKEN.into()))?;

    let identity = state.tokens.verify(&token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthorized(BAD_TOKEN.into())
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Middleware that only lets admins through. Must be layered inside
/// `authenticate`; it never looks at the token itself.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    match req.extensions().get::<Identity>() {
        None => {
            tracing::error!("require_admin ran without an authenticated identity");
            Err(AppError::Unauthorized(NO_TOKEN.into()))
        }
        Some(identity) if !identity.role.is_admin() => {
            tracing::info!(user_id = %identity.user_id, "Non-admin denied");
            Err(AppError::Forbidden(ADMIN_ONLY.into()))
        }
        Some(_) => Ok(next.run(req).await),
    }
}

pub(crate) fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    cookie_value(headers, cookie_name)
        .or_else(|| bearer_token(headers))
        .map(str::to_string)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
