use axum::{http::StatusCode, response::IntoResponse, Json};

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "UP" })))
}
