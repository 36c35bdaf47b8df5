use axum::Json;
use serde_json::{Value, json};

/// Health check endpoint
///
/// Returns `{"status":"OK"}` while the server is accepting requests.
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "OK"}))
}
