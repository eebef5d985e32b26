use crate::controller::{health_check_controller, index_controller, oauth_controller};
use crate::AppState;
use axum::{routing::get, Router};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// All routes. Every request is bounded by the configured request timeout; the callback
/// enforces it itself so an expired login answers `Aborted` rather than being dropped.
pub fn define_routes(app_state: AppState) -> Router {
    let request_timeout = Duration::from_secs(app_state.config.request_timeout_secs);
    Router::new()
        .merge(index_routes(app_state.clone()))
        .merge(login_routes(app_state.clone()))
        .merge(health_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .merge(callback_routes(app_state))
}

fn index_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_controller::index))
        .with_state(app_state)
}

fn login_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/oauth/{provider}",
            get(oauth_controller::authorize).post(oauth_controller::authorize),
        )
        .with_state(app_state)
}

fn callback_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/oauth/{provider}/callback",
            get(oauth_controller::callback).post(oauth_controller::callback_form),
        )
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}
