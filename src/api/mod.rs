// REST API of the identity service

pub mod error;
mod users;

use axum::{
    Router, middleware,
    response::Json,
    routing::{get, post},
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::gate::{AuthGate, require_auth};
use crate::auth::service::UserService;

pub use error::ApiError;

/// Path prefix of the identity API.
pub const API_PREFIX: &str = "/auth/v2";

#[derive(Clone)]
pub struct AppState {
    pub service: UserService,
    pub gate: AuthGate,
}

impl AppState {
    pub fn new(service: UserService, gate: AuthGate) -> Self {
        Self { service, gate }
    }
}

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(users::me))
        .route("/users/{id}", get(users::user))
        .route("/users/{id}/token", get(users::token))
        .route("/users/{id}/papers", post(users::create_paper))
        .route("/bookmarks", post(users::bookmark))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest(API_PREFIX, protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
