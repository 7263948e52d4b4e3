use axum::Json;
use chrono::Utc;

use crate::dto::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

pub async fn banner() -> &'static str {
    "Boom API is running"
}
