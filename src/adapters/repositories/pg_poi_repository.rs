use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query_as, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::{
    application::{
        dto::poi_dto::{aggregate_poi_rows, PoiFileRowDTO},
        error::ApplicationError,
        repositories::poi_repository::PoiRepository,
    },
    domain::models::{
        file::PoiFile,
        poi::{NearbyQuery, PointOfInterest},
    },
};

/// Expands the single-row `selected_poi` CTE into one row per file.
/// File rows come back short audio first, then by ascending serial number.
const SELECT_POI_WITH_FILES: &str = r#"
    SELECT
        sp.id AS poi_id, sp.name, sp.description, sp.latitude, sp.longitude, sp.created_at,
        COALESCE(
            (SELECT array_agg(t.type_of_interest_id ORDER BY t.type_of_interest_id)
             FROM points_of_interest_type t
             WHERE t.point_of_interest_id = sp.id),
            '{}'::BIGINT[]
        ) AS interests,
        f.id AS file_id, f.s3_key, f.file_name, f.file_size, f.mime_type,
        f.serial_number, f.is_short, f.created_at AS file_created_at
    FROM selected_poi sp
    LEFT JOIN poi_files f ON f.poi_id = sp.id
    ORDER BY f.is_short DESC NULLS LAST, f.serial_number ASC NULLS LAST
"#;

const NEAREST_POI: &str = r#"
    SELECT
        p.id, p.name, p.description, p.created_at,
        ST_X(p.location) AS longitude,
        ST_Y(p.location) AS latitude,
        ST_Distance(
            p.location::geography,
            ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography
        ) AS distance_meters
    FROM points_of_interest p
    WHERE ST_DWithin(
            p.location::geography,
            ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
            $3
        )
      AND (
            $4::BIGINT[] IS NULL
            OR EXISTS (
                SELECT 1 FROM points_of_interest_type t
                WHERE t.point_of_interest_id = p.id
                  AND t.type_of_interest_id = ANY($4)
            )
        )
    ORDER BY distance_meters ASC, p.id ASC
    LIMIT 1
"#;

const POI_BY_ID: &str = r#"
    SELECT
        p.id, p.name, p.description, p.created_at,
        ST_X(p.location) AS longitude,
        ST_Y(p.location) AS latitude
    FROM points_of_interest p
    WHERE p.id = $1
"#;

pub struct PgPoiRepository {
    pool: PgPool,
}

impl PgPoiRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_file(
    conn: &mut PgConnection,
    poi_id: i64,
    file: &PoiFile,
) -> Result<i64, sqlx::Error> {
    let (id,): (i64,) = query_as(
        r#"
            INSERT INTO poi_files (
                poi_id, s3_key, file_name, file_size, mime_type,
                serial_number, is_short, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
        "#,
    )
    .bind(poi_id)
    .bind(&file.s3_key)
    .bind(&file.file_name)
    .bind(file.file_size)
    .bind(&file.mime_type)
    .bind(file.role.serial_number())
    .bind(file.role.is_short())
    .bind(file.created_at)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

#[async_trait]
impl PoiRepository for PgPoiRepository {
    async fn create_poi(
        &self,
        mut poi: PointOfInterest,
        budget: Duration,
    ) -> Result<PointOfInterest, ApplicationError> {
        let mut tx = self.pool.begin().await?;

        // 0 would disable the timeout
        let timeout_ms = budget.as_millis().clamp(1, i32::MAX as u128);
        sqlx::query(&format!("SET LOCAL statement_timeout = {}", timeout_ms))
            .execute(&mut *tx)
            .await?;

        let (poi_id, created_at): (i64, DateTime<Utc>) = query_as(
            r#"
                INSERT INTO points_of_interest (name, description, location, created_at)
                VALUES ($1, $2, ST_SetSRID(ST_MakePoint($3, $4), 4326), $5)
                RETURNING id, created_at
            "#,
        )
        .bind(&poi.name)
        .bind(&poi.description)
        .bind(poi.longitude)
        .bind(poi.latitude)
        .bind(poi.created_at)
        .fetch_one(&mut *tx)
        .await?;

        poi.id = poi_id;
        poi.created_at = created_at;

        let files = poi
            .image_file
            .iter_mut()
            .chain(poi.short_audio_file.iter_mut())
            .chain(poi.full_audio_files.iter_mut());
        for file in files {
            file.id = insert_file(&mut tx, poi_id, file).await?;
        }

        if !poi.interests.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO points_of_interest_type (point_of_interest_id, type_of_interest_id) ",
            );
            builder.push_values(poi.interests.iter(), |mut row, interest_id| {
                row.push_bind(poi_id).push_bind(*interest_id);
            });
            builder.push(" ON CONFLICT (point_of_interest_id, type_of_interest_id) DO NOTHING");

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| match e.as_database_error() {
                    Some(db) if db.is_foreign_key_violation() => ApplicationError::Validation(
                        format!("unknown interest id in {:?}", poi.interests),
                    ),
                    _ => ApplicationError::from(e),
                })?;
        }

        tx.commit().await?;
        debug!("Inserted POI {} and {} file row(s)", poi_id, poi.files().count());

        Ok(poi)
    }

    async fn find_nearest_poi(
        &self,
        query: &NearbyQuery,
    ) -> Result<PointOfInterest, ApplicationError> {
        let interests = (!query.interests.is_empty()).then(|| query.interests.clone());
        let sql = format!("WITH selected_poi AS ({}) {}", NEAREST_POI, SELECT_POI_WITH_FILES);

        let rows: Vec<PoiFileRowDTO> = query_as::<_, PoiFileRowDTO>(&sql)
            .bind(query.longitude)
            .bind(query.latitude)
            .bind(query.radius_meters as f64)
            .bind(interests)
            .fetch_all(&self.pool)
            .await?;

        aggregate_poi_rows(rows)
    }

    async fn get_poi_by_id(&self, id: i64) -> Result<PointOfInterest, ApplicationError> {
        let sql = format!("WITH selected_poi AS ({}) {}", POI_BY_ID, SELECT_POI_WITH_FILES);

        let rows: Vec<PoiFileRowDTO> = query_as::<_, PoiFileRowDTO>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(ApplicationError::NotFound(format!("POI {} not found", id)));
        }
        aggregate_poi_rows(rows)
    }

    async fn delete_poi(&self, id: i64, file_ids: &[i64]) -> Result<bool, ApplicationError> {
        let mut tx = self.pool.begin().await?;

        if !file_ids.is_empty() {
            sqlx::query("DELETE FROM poi_files WHERE id = ANY($1)")
                .bind(file_ids)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM points_of_interest WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
