use axum::{routing::get, Json, Router};

use crate::models::{ApiOk, AppState};

pub mod admin_routes;
pub mod appointment_routes;
pub mod slot_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", slot_routes::router())
        .nest("/api/v1", appointment_routes::router())
        .nest("/api/v1", admin_routes::router())
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<ApiOk<&'static str>> {
    Json(ApiOk { data: "ok" })
}
