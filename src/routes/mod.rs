pub mod auth;
pub mod profiles;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full HTTP surface for `state`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router(state.clone()))
        .merge(profiles::router(state.clone()));

    let uploads = ServeDir::new(state.config.uploads_path());

    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .nest_service("/uploads", uploads);

    match cors_layer(&state.config.server.frontend_origin) {
        Some(cors) => app = app.layer(cors),
        None => tracing::warn!(
            origin = %state.config.server.frontend_origin,
            "Invalid frontend origin, CORS disabled"
        ),
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Credentialed CORS for exactly one origin. Wildcards are not allowed
/// alongside credentials, so the origin must be explicit.
fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = HeaderValue::from_str(origin).ok()?;
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_plain_origin() {
        assert!(cors_layer("http://localhost:5173").is_some());
    }

    #[test]
    fn cors_rejects_unencodable_origin() {
        assert!(cors_layer("http://bad\norigin").is_none());
    }
}
