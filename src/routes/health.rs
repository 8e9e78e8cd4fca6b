use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Response body for `/api/health`.
#[derive(Serialize, Deserialize)]
pub struct Health {
    /// Always "OK" when the server is running.
    pub status: String,
    pub timestamp: String,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "OK".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
