use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{application::error::ApplicationError, domain::models::file::FileData};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub content: Vec<u8>,
    pub content_length: u64,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores the bytes under a freshly minted key and returns that key.
    async fn upload_file(&self, file_data: FileData) -> Result<String, ApplicationError>;
    /// Deleting an empty or absent key succeeds.
    async fn delete_file(&self, key: &str) -> Result<(), ApplicationError>;
    /// Fails with one aggregate error if any key could not be deleted.
    async fn delete_files(&self, keys: &[String]) -> Result<(), ApplicationError>;
    async fn get_object(&self, key: &str) -> Result<StoredObject, ApplicationError>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, ApplicationError>;
    async fn health_check(&self) -> Result<(), ApplicationError>;
}
