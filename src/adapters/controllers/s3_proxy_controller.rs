use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use tracing::{error, info};

use crate::{
    adapters::{
        dto::s3_dto::{ListFilesParams, ListFilesResponse, S3FileInfo, S3HealthResponse},
        state::AppState,
    },
    application::error::ApplicationError,
};

const STATIC_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "css", "js", "pdf"];
const STATIC_CACHE_CONTROL: &str = "public, max-age=3600";

fn extension_of(path: &str) -> Option<String> {
    FsPath::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn content_type_for_path(path: &str) -> &'static str {
    match extension_of(path).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("flac") => "audio/flac",
        Some("webm") => "audio/webm",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("mkv") => "video/x-matroska",
        Some("mpeg") | Some("mpg") => "video/mpeg",
        Some("3gp") => "video/3gpp",
        Some("ts") => "video/mp2t",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

pub fn is_static_file(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| STATIC_EXTENSIONS.contains(&ext.as_str()))
}

pub struct S3ProxyController;

impl S3ProxyController {
    /// GET /s3/files/{*path}
    pub async fn get_file(
        State(app_state): State<AppState>,
        Path(object_path): Path<String>,
    ) -> Result<Response, ApplicationError> {
        let object_path = object_path.trim_start_matches('/');
        if object_path.is_empty() {
            return Err(ApplicationError::Validation(
                "File path is required".to_string(),
            ));
        }

        let object = app_state.storage_service.get_object(object_path).await?;

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type_for_path(object_path))
            .header(header::CONTENT_LENGTH, object.content_length);

        if let Some(last_modified) = object.last_modified {
            builder = builder.header(
                header::LAST_MODIFIED,
                last_modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            );
        }
        if let Some(etag) = &object.etag {
            builder = builder.header(header::ETAG, etag.as_str());
        }
        if is_static_file(object_path) {
            builder = builder.header(header::CACHE_CONTROL, STATIC_CACHE_CONTROL);
        }

        info!(
            "File served successfully: {} ({} bytes)",
            object_path, object.content_length
        );

        builder
            .body(Body::from(object.content))
            .map_err(|e| ApplicationError::Internal(format!("Failed to build response: {}", e)))
    }

    /// GET /s3/list?prefix=
    pub async fn list_files(
        State(app_state): State<AppState>,
        Query(params): Query<ListFilesParams>,
    ) -> Result<Json<ListFilesResponse>, ApplicationError> {
        let prefix = params.prefix.unwrap_or_default();
        let objects = app_state.storage_service.list_objects(&prefix).await?;

        let files: Vec<S3FileInfo> = objects
            .into_iter()
            .map(|object| S3FileInfo {
                content_type: content_type_for_path(&object.key).to_string(),
                name: object.key,
                size: object.size,
                last_modified: object.last_modified,
            })
            .collect();

        info!("Listed {} files with prefix: '{}'", files.len(), prefix);
        Ok(Json(ListFilesResponse { files }))
    }

    /// GET /s3/health
    pub async fn health_check(
        State(app_state): State<AppState>,
    ) -> (StatusCode, Json<S3HealthResponse>) {
        match app_state.storage_service.health_check().await {
            Ok(()) => (
                StatusCode::OK,
                Json(S3HealthResponse {
                    status: "healthy".to_string(),
                    message: "Connected to object storage".to_string(),
                }),
            ),
            Err(e) => {
                error!("Object storage health check failed: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(S3HealthResponse {
                        status: "error".to_string(),
                        message: "Cannot connect to object storage".to_string(),
                    }),
                )
            }
        }
    }
}
