use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::{authenticate, handlers};
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    let session = Router::new()
        .route("/auth/me", get(handlers::me))
        .route_layer(from_fn_with_state(state, authenticate));

    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", get(handlers::logout))
        .merge(session)
}
