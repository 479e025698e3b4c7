pub mod health_controller;
pub mod poi_controller;
pub mod s3_proxy_controller;
