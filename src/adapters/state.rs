use axum::extract::FromRef;
use std::sync::Arc;

use crate::application::services::{PoiService, StorageService};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub poi_service: Arc<PoiService>,
    pub storage_service: Arc<dyn StorageService>,
}
