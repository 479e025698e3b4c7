mod error;
mod s3_storage;

pub use error::StorageError;
pub use s3_storage::{object_key, S3StorageService};
