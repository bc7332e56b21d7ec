use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Serialize;

use crate::auth::{authenticate, require_admin, Identity};
use crate::db::models::Profile;
use crate::error::AppResult;
use crate::profiles::{Location, ProfileForm};
use crate::state::AppState;

/// Slack on top of the photo limit for the text parts and multipart framing.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(state: AppState) -> Router<AppState> {
    let read = Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/{id}", get(get_profile))
        .route("/profiles/{id}/location", get(profile_location))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    // Layers run outside-in: authenticate attaches the identity before
    // require_admin inspects it.
    let body_limit = state.config.storage.max_photo_bytes + FORM_OVERHEAD_BYTES;
    let admin = Router::new()
        .route("/profiles", post(create_profile))
        .route("/profiles/{id}", put(update_profile).delete(delete_profile))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, authenticate))
        .layer(DefaultBodyLimit::max(body_limit));

    read.merge(admin)
}

#[derive(Serialize)]
struct ProfileResponse {
    message: &'static str,
    profile: Profile,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn list_profiles(State(state): State<AppState>) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(state.profiles.list().await?))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.get(&id).await?))
}

async fn profile_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Location>> {
    Ok(Json(state.profiles.location(&id).await?))
}

async fn create_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ProfileResponse>)> {
    let form = ProfileForm::from_multipart(multipart).await?;
    let profile = state.profiles.create(form.into_new_profile()).await?;

    tracing::info!(admin = %identity.user_id, profile_id = %profile.id, "Profile created");
    Ok((
        StatusCode::CREATED,
        Json(ProfileResponse {
            message: "Profile created successfully",
            profile,
        }),
    ))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<ProfileResponse>> {
    let form = ProfileForm::from_multipart(multipart).await?;
    let profile = state.profiles.update(&id, form.into_changes()).await?;

    tracing::info!(admin = %identity.user_id, profile_id = %profile.id, "Profile updated");
    Ok(Json(ProfileResponse {
        message: "Profile updated successfully",
        profile,
    }))
}

async fn delete_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state.profiles.delete(&id).await?;

    tracing::info!(admin = %identity.user_id, profile_id = %id, "Profile deleted");
    Ok(Json(MessageResponse {
        message: "Profile deleted successfully",
    }))
}
