use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ListFilesParams {
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct S3FileInfo {
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListFilesResponse {
    pub files: Vec<S3FileInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct S3HealthResponse {
    pub status: String,
    pub message: String,
}
