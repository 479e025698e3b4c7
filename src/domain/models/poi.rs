use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::file::PoiFile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub image_file: Option<PoiFile>,
    pub short_audio_file: Option<PoiFile>,
    pub full_audio_files: Vec<PoiFile>,
    pub interests: Vec<i64>,
}

impl PointOfInterest {
    /// Every file owned by this POI: image, short audio, then full audio.
    pub fn files(&self) -> impl Iterator<Item = &PoiFile> {
        self.image_file
            .iter()
            .chain(self.short_audio_file.iter())
            .chain(self.full_audio_files.iter())
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.files()
            .filter(|f| !f.s3_key.is_empty())
            .map(|f| f.s3_key.clone())
            .collect()
    }

    pub fn file_ids(&self) -> Vec<i64> {
        self.files().map(|f| f.id).filter(|id| *id > 0).collect()
    }
}

/// Parameters of a nearest-neighbour lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i64,
    /// Empty means "any interest".
    pub interests: Vec<i64>,
}

pub fn is_valid_latitude(latitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude)
}

pub fn is_valid_longitude(longitude: f64) -> bool {
    (-180.0..=180.0).contains(&longitude)
}
