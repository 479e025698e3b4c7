use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{
    application::error::ApplicationError,
    domain::models::{
        file::{FileData, FileRole, PoiFile},
        poi::PointOfInterest,
    },
};

/// Input of a POI creation: scalar fields plus every uploaded stream.
#[derive(Debug, Clone)]
pub struct CreatePoiDTO {
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub interests: Vec<i64>,
    pub image: FileData,
    pub short_audio: Option<FileData>,
    pub full_audio: Vec<FileData>,
}

/// One row of the POI/file left join. POI columns repeat on every row,
/// file columns are all `None` when the POI owns no file.
#[derive(Debug, Clone, Default)]
pub struct PoiFileRowDTO {
    pub poi_id: i64,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub interests: Vec<i64>,
    pub file_id: Option<i64>,
    pub s3_key: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub serial_number: Option<i64>,
    pub is_short: Option<bool>,
    pub file_created_at: Option<DateTime<Utc>>,
}

impl PoiFileRowDTO {
    fn file(&self) -> Option<PoiFile> {
        let id = self.file_id?;
        Some(PoiFile {
            id,
            s3_key: self.s3_key.clone().unwrap_or_default(),
            file_name: self.file_name.clone().unwrap_or_default(),
            file_size: self.file_size.unwrap_or(0),
            mime_type: self.mime_type.clone().unwrap_or_default(),
            role: FileRole::from_columns(
                self.serial_number.unwrap_or(0),
                self.is_short.unwrap_or(false),
            ),
            created_at: self.file_created_at.unwrap_or(self.created_at),
        })
    }
}

/// Folds the rows of a single POI into one aggregate, bucketing files by role.
pub fn aggregate_poi_rows(rows: Vec<PoiFileRowDTO>) -> Result<PointOfInterest, ApplicationError> {
    let mut rows = rows.into_iter();
    let first = rows
        .next()
        .ok_or_else(|| ApplicationError::NotFound("No points of interest found".to_string()))?;

    let mut poi = PointOfInterest {
        id: first.poi_id,
        name: first.name.clone(),
        description: first.description.clone(),
        latitude: first.latitude,
        longitude: first.longitude,
        created_at: first.created_at,
        image_file: None,
        short_audio_file: None,
        full_audio_files: Vec::new(),
        interests: first.interests.clone(),
    };

    for row in std::iter::once(first).chain(rows) {
        if row.poi_id != poi.id {
            warn!(
                "Ignoring row of POI {} while aggregating POI {}",
                row.poi_id, poi.id
            );
            continue;
        }
        let Some(file) = row.file() else {
            continue;
        };

        match file.role {
            FileRole::Image if poi.image_file.is_none() => poi.image_file = Some(file),
            FileRole::ShortAudio if poi.short_audio_file.is_none() => {
                poi.short_audio_file = Some(file)
            }
            FileRole::FullAudio(_) => poi.full_audio_files.push(file),
            role => warn!(
                "POI {} has more than one {:?} file, ignoring file {}",
                poi.id, role, file.id
            ),
        }
    }

    poi.full_audio_files.sort_by_key(|f| f.role.serial_number());

    Ok(poi)
}
