use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Builder, Credentials, Region},
    primitives::{ByteStream, DateTime as S3DateTime},
    types::{Delete, ObjectIdentifier},
    Client,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        error::ApplicationError,
        services::{
            storage_service::{ObjectSummary, StoredObject},
            StorageService,
        },
    },
    domain::{config::app::S3Config, models::file::FileData},
    services::StorageError,
};

/// S3 accepts at most this many keys per `DeleteObjects` call.
const MAX_KEYS_PER_DELETE: usize = 1000;

/// Mints `{category}/{YYYY}/{MM}/{DD}/{uuid}{.ext}` for an upload.
pub fn object_key(mime_type: &str, filename: &str, now: DateTime<Utc>, id: Uuid) -> String {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    let category = if mime_type.starts_with("image/") {
        "images"
    } else if mime_type.starts_with("audio/") {
        "audio"
    } else {
        "files"
    };

    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();

    format!("{}/{}/{}{}", category, now.format("%Y/%m/%d"), id, extension)
}

/// Object metadata travels as HTTP headers, so only printable ASCII survives.
fn header_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn to_chrono(value: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "poi-service-static",
        );

        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url())
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Creates the bucket when it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => match StorageError::from(e) {
                StorageError::NotFound(_) => {
                    self.client
                        .create_bucket()
                        .bucket(&self.bucket)
                        .send()
                        .await
                        .map_err(StorageError::from)?;
                    info!("Bucket '{}' created successfully", self.bucket);
                    Ok(())
                }
                other => Err(other),
            },
        }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, file_data: FileData) -> Result<String, ApplicationError> {
        let FileData {
            content,
            filename,
            mime_type,
        } = file_data;

        let key = object_key(&mime_type, &filename, Utc::now(), Uuid::new_v4());
        let content_length = i64::try_from(content.len())
            .map_err(|e| StorageError::InternalError(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mime_type)
            .content_length(content_length)
            .metadata("original-filename", header_safe(&filename))
            .metadata("upload-timestamp", Utc::now().to_rfc3339())
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(StorageError::from)?;

        debug!("Uploaded '{}' as {} ({} bytes)", filename, key, content_length);
        Ok(key)
    }

    async fn delete_file(&self, key: &str) -> Result<(), ApplicationError> {
        if key.is_empty() {
            return Ok(());
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn delete_files(&self, keys: &[String]) -> Result<(), ApplicationError> {
        let keys: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        let mut failures = Vec::new();
        for chunk in keys.chunks(MAX_KEYS_PER_DELETE) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(*key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::InternalError(e.to_string()))?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(false)
                .build()
                .map_err(|e| StorageError::InternalError(e.to_string()))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(StorageError::from)?;

            failures.extend(output.errors().iter().map(|e| {
                format!(
                    "Key: {}, Code: {}, Message: {}",
                    e.key().unwrap_or("<unknown>"),
                    e.code().unwrap_or("<none>"),
                    e.message().unwrap_or("")
                )
            }));
        }

        if !failures.is_empty() {
            warn!(
                "{} of {} object(s) could not be deleted",
                failures.len(),
                keys.len()
            );
            return Err(StorageError::PartialDelete(failures.join("; ")).into());
        }

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject, ApplicationError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(StorageError::from)?;

        let etag = output.e_tag().map(str::to_string);
        let last_modified = output.last_modified().and_then(to_chrono);
        let content = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(StoredObject {
            content_length: content.len() as u64,
            content,
            etag,
            last_modified,
        })
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, ApplicationError> {
        let mut summaries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(StorageError::from)?;

            summaries.extend(output.contents().iter().map(|object| ObjectSummary {
                key: object.key().unwrap_or_default().to_string(),
                size: u64::try_from(object.size().unwrap_or(0)).unwrap_or(0),
                last_modified: object.last_modified().and_then(to_chrono),
            }));

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(summaries)
    }

    async fn health_check(&self) -> Result<(), ApplicationError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
