use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::adapters::{
    controllers::{
        health_controller::HealthController, poi_controller::PoiController,
        s3_proxy_controller::S3ProxyController,
    },
    state::AppState,
};

/// Every endpoint of the service, without transport layers.
pub fn router(app_state: AppState) -> Router {
    let poi_routes = Router::new()
        .route("/api/poi/create", post(PoiController::create_poi))
        .route("/api/poi/nearby", get(PoiController::find_nearest_poi))
        .route("/api/poi/delete", delete(PoiController::delete_poi));

    let s3_routes = Router::new()
        .route("/s3/files/{*path}", get(S3ProxyController::get_file))
        .route("/s3/list", get(S3ProxyController::list_files))
        .route("/s3/health", get(S3ProxyController::health_check));

    Router::new()
        .route("/health", get(HealthController::health_check))
        .merge(poi_routes)
        .merge(s3_routes)
        .with_state(app_state)
}
