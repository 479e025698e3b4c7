use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    application::error::ApplicationError,
    domain::models::{file::PoiFile, poi::PointOfInterest},
};

pub const DEFAULT_RADIUS_METERS: i64 = 150;

/// Success envelope shared by every `/api/poi` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: i64,
    pub s3_key: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub serial_number: i64,
    pub is_short: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PoiFile> for FileResponse {
    fn from(file: PoiFile) -> Self {
        Self {
            id: file.id,
            serial_number: file.role.serial_number(),
            is_short: file.role.is_short(),
            s3_key: file.s3_key,
            file_name: file.file_name,
            file_size: file.file_size,
            mime_type: file.mime_type,
            created_at: file.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoiResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub image_file: Option<FileResponse>,
    pub short_audio_file: Option<FileResponse>,
    pub full_audio_files: Vec<FileResponse>,
    pub interests: Vec<i64>,
}

impl From<PointOfInterest> for PoiResponse {
    fn from(poi: PointOfInterest) -> Self {
        Self {
            id: poi.id,
            name: poi.name,
            description: poi.description,
            latitude: poi.latitude,
            longitude: poi.longitude,
            created_at: poi.created_at,
            image_file: poi.image_file.map(FileResponse::from),
            short_audio_file: poi.short_audio_file.map(FileResponse::from),
            full_audio_files: poi
                .full_audio_files
                .into_iter()
                .map(FileResponse::from)
                .collect(),
            interests: poi.interests,
        }
    }
}

/// Raw query string of `GET /api/poi/nearby`; parsed by hand so that bad
/// numbers produce the JSON error body instead of axum's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct NearbyParams {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub radius: Option<String>,
    pub interests: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    pub id: Option<String>,
}

pub fn parse_required<T: std::str::FromStr>(
    value: Option<&str>,
    field: &str,
) -> Result<T, ApplicationError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApplicationError::Validation(format!("{} is required", field)))?;

    raw.parse::<T>()
        .map_err(|_| ApplicationError::Validation(format!("invalid {}: '{}'", field, raw)))
}

/// Accepts `"3"`, `"1,2"` and tolerates blanks between commas.
pub fn parse_interest_list(raw: &str) -> Result<Vec<i64>, ApplicationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                ApplicationError::Validation(format!("invalid interest id: '{}'", part))
            })
        })
        .collect()
}

impl NearbyParams {
    pub fn radius_meters(&self) -> Result<i64, ApplicationError> {
        match self.radius.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_RADIUS_METERS),
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| ApplicationError::Validation(format!("invalid radius: '{}'", raw))),
        }
    }

    pub fn interest_ids(&self) -> Result<Vec<i64>, ApplicationError> {
        self.interests
            .as_deref()
            .map(parse_interest_list)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}
