pub mod poi_service;
pub mod storage_service;

pub use poi_service::PoiService;
pub use storage_service::StorageService;
