use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw upload received from a client, before it reaches the object store.
#[derive(Debug, Clone)]
pub struct FileData {
    pub content: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl FileData {
    pub fn new(content: Vec<u8>, filename: String, mime_type: String) -> Self {
        Self {
            content,
            filename,
            mime_type,
        }
    }

    pub fn validate_size(&self, max_size: u64) -> bool {
        self.size() <= max_size
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// What a file is used for within its point of interest.
///
/// Stored through the `serial_number` / `is_short` column pair:
/// `Image` is serial 0, `ShortAudio` is flagged short, and every
/// `FullAudio(n)` keeps its 1-based position as serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "order", rename_all = "snake_case")]
pub enum FileRole {
    Image,
    ShortAudio,
    FullAudio(u32),
}

impl FileRole {
    pub fn from_columns(serial_number: i64, is_short: bool) -> Self {
        if serial_number == 0 {
            FileRole::Image
        } else if is_short {
            FileRole::ShortAudio
        } else {
            FileRole::FullAudio(u32::try_from(serial_number).unwrap_or(u32::MAX))
        }
    }

    pub fn serial_number(&self) -> i64 {
        match self {
            FileRole::Image => 0,
            FileRole::ShortAudio => 1,
            FileRole::FullAudio(order) => i64::from(*order),
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, FileRole::ShortAudio)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiFile {
    /// Zero until the row is inserted.
    pub id: i64,
    /// Empty until the object store accepted the upload.
    pub s3_key: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub role: FileRole,
    pub created_at: DateTime<Utc>,
}

impl PoiFile {
    pub fn from_upload(file_data: &FileData, role: FileRole, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            s3_key: String::new(),
            file_name: file_data.filename.clone(),
            file_size: i64::try_from(file_data.size()).unwrap_or(i64::MAX),
            mime_type: file_data.mime_type.clone(),
            role,
            created_at,
        }
    }
}
