use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub struct HealthController;

impl HealthController {
    /// GET /health
    pub async fn health_check() -> Json<HealthResponse> {
        debug!("Health check requested");

        Json(HealthResponse {
            status: "OK".to_string(),
        })
    }
}
