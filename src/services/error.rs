use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

use crate::application::error::ApplicationError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Some files failed to delete: {0}")]
    PartialDelete(String),

    #[error("Storage provider error: {0}")]
    ProviderError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<StorageError> for ApplicationError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(msg) => ApplicationError::NotFound(msg),
            other => ApplicationError::Storage(other.to_string()),
        }
    }
}

impl<E, R> From<SdkError<E, R>> for StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(error: SdkError<E, R>) -> Self {
        let message = DisplayErrorContext(&error).to_string();
        match &error {
            SdkError::TimeoutError(_) => StorageError::NetworkError("Request timeout".to_string()),
            SdkError::DispatchFailure(_) => {
                StorageError::NetworkError(format!("Connection failed: {}", message))
            }
            SdkError::ServiceError(service) => match service.err().code() {
                Some("NoSuchKey") | Some("NotFound") | Some("NoSuchBucket") => {
                    StorageError::NotFound(message)
                }
                Some("AccessDenied") | Some("InvalidAccessKeyId")
                | Some("SignatureDoesNotMatch") => StorageError::Unauthorized(message),
                _ => StorageError::ProviderError(message),
            },
            _ => StorageError::InternalError(message),
        }
    }
}
