use sqlx::{postgres::PgRow, FromRow, Row};

use crate::application::dto::poi_dto::PoiFileRowDTO;

impl FromRow<'_, PgRow> for PoiFileRowDTO {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(PoiFileRowDTO {
            poi_id: row.try_get("poi_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            created_at: row.try_get("created_at")?,
            interests: row.try_get("interests")?,
            file_id: row.try_get("file_id")?,
            s3_key: row.try_get("s3_key")?,
            file_name: row.try_get("file_name")?,
            file_size: row.try_get("file_size")?,
            mime_type: row.try_get("mime_type")?,
            serial_number: row.try_get("serial_number")?,
            is_short: row.try_get("is_short")?,
            file_created_at: row.try_get("file_created_at")?,
        })
    }
}
