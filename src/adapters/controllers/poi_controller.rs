use axum::{
    extract::{multipart::Field, Multipart, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::{
    adapters::{
        dto::poi_dto::{
            parse_interest_list, parse_required, DataResponse, DeleteParams, NearbyParams,
            PoiResponse,
        },
        state::AppState,
    },
    application::{dto::poi_dto::CreatePoiDTO, error::ApplicationError},
    domain::models::file::FileData,
};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

pub struct PoiController;

impl PoiController {
    /// POST /api/poi/create
    pub async fn create_poi(
        State(app_state): State<AppState>,
        mut multipart: Multipart,
    ) -> Result<(StatusCode, Json<DataResponse<PoiResponse>>), ApplicationError> {
        let mut name: Option<String> = None;
        let mut description: Option<String> = None;
        let mut latitude: Option<String> = None;
        let mut longitude: Option<String> = None;
        let mut interests: Vec<i64> = Vec::new();
        let mut image: Option<FileData> = None;
        let mut short_audio: Option<FileData> = None;
        let mut full_audio: Vec<FileData> = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            warn!("Invalid multipart data: {}", e);
            multipart_error(e.status(), e.body_text())
        })? {
            let field_name = field.name().unwrap_or("").to_string();

            match field_name.as_str() {
                "name" => name = Some(read_text(field).await?),
                "description" => description = Some(read_text(field).await?),
                "latitude" => latitude = Some(read_text(field).await?),
                "longitude" => longitude = Some(read_text(field).await?),
                "interests" => interests.extend(parse_interest_list(&read_text(field).await?)?),
                "image" => image = Some(read_file(field).await?),
                "short_audio" => short_audio = Some(read_file(field).await?),
                "full_audio" => full_audio.push(read_file(field).await?),
                _ => {}
            }
        }

        let image = image
            .ok_or_else(|| ApplicationError::Validation("image file is required".to_string()))?;

        let request = CreatePoiDTO {
            name: name.unwrap_or_default(),
            description: description.unwrap_or_default(),
            latitude: parse_required(latitude.as_deref(), "latitude")?,
            longitude: parse_required(longitude.as_deref(), "longitude")?,
            interests,
            image,
            short_audio,
            full_audio,
        };

        info!(
            "Creating POI '{}' at ({}, {}) with {} full audio file(s)",
            request.name,
            request.latitude,
            request.longitude,
            request.full_audio.len()
        );

        let poi = app_state.poi_service.create_poi(request).await?;

        Ok((
            StatusCode::CREATED,
            Json(DataResponse::new(PoiResponse::from(poi))),
        ))
    }

    /// GET /api/poi/nearby?latitude=&longitude=&radius=&interests=
    pub async fn find_nearest_poi(
        State(app_state): State<AppState>,
        Query(params): Query<NearbyParams>,
    ) -> Result<Json<DataResponse<PoiResponse>>, ApplicationError> {
        let latitude: f64 = parse_required(params.latitude.as_deref(), "latitude")?;
        let longitude: f64 = parse_required(params.longitude.as_deref(), "longitude")?;
        let radius = params.radius_meters()?;
        let interests = params.interest_ids()?;

        let poi = app_state
            .poi_service
            .find_nearest_poi(latitude, longitude, radius, interests)
            .await?;

        Ok(Json(DataResponse::new(PoiResponse::from(poi))))
    }

    /// DELETE /api/poi/delete?id=
    pub async fn delete_poi(
        State(app_state): State<AppState>,
        Query(params): Query<DeleteParams>,
    ) -> Result<Json<DataResponse<bool>>, ApplicationError> {
        let id: i64 = parse_required(params.id.as_deref(), "id")?;

        let deleted = app_state.poi_service.delete_poi(id).await?;
        info!("Delete of POI {} finished, removed: {}", id, deleted);

        Ok(Json(DataResponse::new(deleted)))
    }
}

fn multipart_error(status: StatusCode, detail: String) -> ApplicationError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApplicationError::PayloadTooLarge("request body is too large".to_string())
    } else {
        ApplicationError::Validation(format!("invalid multipart data: {}", detail))
    }
}

async fn read_text(field: Field<'_>) -> Result<String, ApplicationError> {
    let field_name = field.name().unwrap_or("").to_string();
    field.text().await.map_err(|e| {
        warn!("Invalid '{}' field: {}", field_name, e);
        multipart_error(e.status(), e.body_text())
    })
}

async fn read_file(field: Field<'_>) -> Result<FileData, ApplicationError> {
    let field_name = field.name().unwrap_or("").to_string();
    let filename = field
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| field_name.clone());
    let mime_type = field
        .content_type()
        .unwrap_or(FALLBACK_MIME_TYPE)
        .to_string();

    let content = field.bytes().await.map_err(|e| {
        warn!("Cannot read '{}' file bytes: {}", field_name, e);
        multipart_error(e.status(), e.body_text())
    })?;

    Ok(FileData::new(content.to_vec(), filename, mime_type))
}
