use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::{
    application::{
        dto::poi_dto::CreatePoiDTO, error::ApplicationError,
        repositories::poi_repository::PoiRepository, services::StorageService,
    },
    domain::{
        config::app::UploadLimits,
        models::{
            file::{FileData, FileRole, PoiFile},
            poi::{is_valid_latitude, is_valid_longitude, NearbyQuery, PointOfInterest},
        },
    },
};

pub const SUPPORTED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
];

pub const SUPPORTED_AUDIO_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/ogg",
    "audio/aac",
    "audio/x-m4a",
];

#[derive(Debug, Clone, PartialEq)]
pub enum CompensatingAction {
    DeleteObject(String),
}

/// Undo log of a multi-file create. Every successful upload records how to
/// revert it; on failure the actions run newest first.
#[derive(Debug, Default)]
pub struct UploadSaga {
    actions: Vec<CompensatingAction>,
}

impl UploadSaga {
    pub fn record(&mut self, action: CompensatingAction) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[CompensatingAction] {
        &self.actions
    }

    /// Best effort: failures are logged and the remaining actions still run.
    pub async fn compensate(self, storage: &dyn StorageService) {
        for action in self.actions.into_iter().rev() {
            match action {
                CompensatingAction::DeleteObject(key) => {
                    if let Err(e) = storage.delete_file(&key).await {
                        warn!("Rollback could not delete object '{}': {}", key, e);
                    } else {
                        info!("Rolled back uploaded object '{}'", key);
                    }
                }
            }
        }
    }
}

pub struct PoiService {
    repository: Arc<dyn PoiRepository>,
    storage: Arc<dyn StorageService>,
    limits: UploadLimits,
    create_timeout: Duration,
}

impl PoiService {
    pub fn new(
        repository: Arc<dyn PoiRepository>,
        storage: Arc<dyn StorageService>,
        limits: UploadLimits,
        create_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            storage,
            limits,
            create_timeout,
        }
    }

    pub async fn create_poi(
        &self,
        request: CreatePoiDTO,
    ) -> Result<PointOfInterest, ApplicationError> {
        validate_poi_fields(
            &request.name,
            &request.description,
            request.latitude,
            request.longitude,
        )?;
        self.check_media(&request)?;

        let deadline = Instant::now() + self.create_timeout;
        let mut saga = UploadSaga::default();

        match self.run_create(request, deadline, &mut saga).await {
            Ok(poi) => {
                info!(
                    "Created POI {} with {} file(s)",
                    poi.id,
                    poi.files().count()
                );
                Ok(poi)
            }
            Err(e) => {
                warn!(
                    "POI creation failed, rolling back {} uploaded object(s): {}",
                    saga.actions().len(),
                    e
                );
                saga.compensate(self.storage.as_ref()).await;
                Err(e)
            }
        }
    }

    pub async fn find_nearest_poi(
        &self,
        latitude: f64,
        longitude: f64,
        radius_meters: i64,
        interests: Vec<i64>,
    ) -> Result<PointOfInterest, ApplicationError> {
        validate_coordinates(latitude, longitude)?;
        if radius_meters <= 0 {
            return Err(ApplicationError::Validation(format!(
                "radius must be a positive number of meters, got {}",
                radius_meters
            )));
        }

        let query = NearbyQuery {
            latitude,
            longitude,
            radius_meters,
            interests,
        };
        self.repository.find_nearest_poi(&query).await
    }

    pub async fn delete_poi(&self, id: i64) -> Result<bool, ApplicationError> {
        let poi = self.repository.get_poi_by_id(id).await?;

        let keys = poi.object_keys();
        self.storage.delete_files(&keys).await?;
        info!("Deleted {} object(s) of POI {}", keys.len(), id);

        self.repository.delete_poi(id, &poi.file_ids()).await
    }

    fn check_media(&self, request: &CreatePoiDTO) -> Result<(), ApplicationError> {
        check_upload(
            &request.image,
            "image",
            SUPPORTED_IMAGE_TYPES,
            self.limits.max_image_size,
        )?;
        for audio in request.short_audio.iter().chain(request.full_audio.iter()) {
            check_upload(
                audio,
                "audio",
                SUPPORTED_AUDIO_TYPES,
                self.limits.max_audio_size,
            )?;
        }
        Ok(())
    }

    async fn run_create(
        &self,
        request: CreatePoiDTO,
        deadline: Instant,
        saga: &mut UploadSaga,
    ) -> Result<PointOfInterest, ApplicationError> {
        let CreatePoiDTO {
            name,
            description,
            latitude,
            longitude,
            mut interests,
            image,
            short_audio,
            full_audio,
        } = request;
        let now = Utc::now();

        let image_file = self
            .upload(image, FileRole::Image, now, deadline, saga)
            .await?;

        let short_audio_file = match short_audio {
            Some(data) => Some(
                self.upload(data, FileRole::ShortAudio, now, deadline, saga)
                    .await?,
            ),
            None => None,
        };

        let mut full_audio_files = Vec::with_capacity(full_audio.len());
        for (index, data) in full_audio.into_iter().enumerate() {
            let order = u32::try_from(index + 1).map_err(|_| {
                ApplicationError::Validation("too many full audio files".to_string())
            })?;
            let file = self
                .upload(data, FileRole::FullAudio(order), now, deadline, saga)
                .await?;
            full_audio_files.push(file);
        }

        interests.sort_unstable();
        interests.dedup();

        let poi = PointOfInterest {
            id: 0,
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            latitude,
            longitude,
            created_at: now,
            image_file: Some(image_file),
            short_audio_file,
            full_audio_files,
            interests,
        };

        // Not raced against the deadline: a dropped COMMIT may still apply.
        // The remaining budget bounds the statements inside the transaction.
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ApplicationError::Storage(
                "deadline exceeded before saving the POI".to_string(),
            ));
        }
        self.repository.create_poi(poi, remaining).await
    }

    async fn upload(
        &self,
        data: FileData,
        role: FileRole,
        now: DateTime<Utc>,
        deadline: Instant,
        saga: &mut UploadSaga,
    ) -> Result<PoiFile, ApplicationError> {
        let mut file = PoiFile::from_upload(&data, role, now);

        let key = match timeout_at(deadline, self.storage.upload_file(data)).await {
            Ok(result) => result.inspect_err(|e| {
                warn!("Upload of '{}' ({:?}) failed: {}", file.file_name, role, e)
            })?,
            Err(_) => {
                warn!(
                    "Upload of '{}' ({:?}) abandoned at the deadline, its object may still be written and will not be rolled back",
                    file.file_name, role
                );
                return Err(ApplicationError::Storage(format!(
                    "deadline exceeded while uploading '{}'",
                    file.file_name
                )));
            }
        };

        saga.record(CompensatingAction::DeleteObject(key.clone()));
        file.s3_key = key;
        Ok(file)
    }
}

pub fn validate_poi_fields(
    name: &str,
    description: &str,
    latitude: f64,
    longitude: f64,
) -> Result<(), ApplicationError> {
    if name.trim().is_empty() {
        return Err(ApplicationError::Validation("name is required".to_string()));
    }
    if description.trim().is_empty() {
        return Err(ApplicationError::Validation(
            "description is required".to_string(),
        ));
    }
    validate_coordinates(latitude, longitude)
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ApplicationError> {
    if !is_valid_latitude(latitude) {
        return Err(ApplicationError::Validation(format!(
            "invalid latitude {}: must be between -90 and 90",
            latitude
        )));
    }
    if !is_valid_longitude(longitude) {
        return Err(ApplicationError::Validation(format!(
            "invalid longitude {}: must be between -180 and 180",
            longitude
        )));
    }
    Ok(())
}

fn check_upload(
    file: &FileData,
    kind: &str,
    allowed_types: &[&str],
    max_size: u64,
) -> Result<(), ApplicationError> {
    if !file.validate_size(max_size) {
        return Err(ApplicationError::PayloadTooLarge(format!(
            "{} '{}' is {} bytes, maximum allowed is {}",
            kind,
            file.filename,
            file.size(),
            max_size
        )));
    }

    let essence = file
        .mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !allowed_types.contains(&essence.as_str()) {
        return Err(ApplicationError::UnsupportedMedia(format!(
            "unsupported {} type: {}",
            kind, file.mime_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{image, mp3, InMemoryPoiRepository, InMemoryStorage};

    fn service(
        repository: Arc<InMemoryPoiRepository>,
        storage: Arc<InMemoryStorage>,
    ) -> PoiService {
        PoiService::new(
            repository,
            storage,
            UploadLimits::default(),
            Duration::from_secs(5),
        )
    }

    fn kremlin() -> CreatePoiDTO {
        CreatePoiDTO {
            name: "Kremlin".to_string(),
            description: "Historic fortified complex".to_string(),
            latitude: 55.7558,
            longitude: 37.6173,
            interests: vec![2, 1, 2],
            image: image("kremlin.jpg", 2 << 20),
            short_audio: Some(mp3("intro.mp3", 1 << 20)),
            full_audio: vec![mp3("part1.mp3", 10), mp3("part2.mp3", 10)],
        }
    }

    #[tokio::test]
    async fn create_assigns_distinct_ids_and_keys() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::default());
        let service = service(repository.clone(), storage.clone());

        let poi = service.create_poi(kremlin()).await.unwrap();

        assert!(poi.id > 0);
        let mut ids = poi.file_ids();
        assert_eq!(ids.len(), 4);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert!(poi.files().all(|f| !f.s3_key.is_empty()));
        assert_eq!(poi.interests, vec![1, 2]);
        assert_eq!(
            poi.full_audio_files.iter().map(|f| f.role).collect::<Vec<_>>(),
            vec![FileRole::FullAudio(1), FileRole::FullAudio(2)]
        );
        assert_eq!(storage.keys().len(), 4);
    }

    #[tokio::test]
    async fn failed_audio_upload_rolls_back_previous_objects() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::failing_upload_at(3));
        let service = service(repository.clone(), storage.clone());

        let err = service.create_poi(kremlin()).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Storage(_)));
        assert!(storage.keys().is_empty());
        assert_eq!(storage.deleted_keys().len(), 2);
        assert_eq!(repository.count(), 0);
    }

    #[tokio::test]
    async fn failed_database_write_rolls_back_every_object() {
        let repository = Arc::new(InMemoryPoiRepository::failing_create());
        let storage = Arc::new(InMemoryStorage::default());
        let service = service(repository.clone(), storage.clone());

        let err = service.create_poi(kremlin()).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Storage(_)));
        assert!(storage.keys().is_empty());
        assert_eq!(storage.deleted_keys().len(), 4);
        assert_eq!(repository.count(), 0);
    }

    #[tokio::test]
    async fn rollback_failure_does_not_mask_original_error() {
        let repository = Arc::new(InMemoryPoiRepository::failing_create());
        let storage = Arc::new(InMemoryStorage::failing_deletes());
        let service = service(repository, storage);

        let err = service.create_poi(kremlin()).await.unwrap_err();

        assert_eq!(
            err,
            ApplicationError::Storage("Database error: simulated failure".to_string())
        );
    }

    #[tokio::test]
    async fn deadline_abandons_slow_upload_and_rolls_back() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::slow_upload_at(2, Duration::from_secs(10)));
        let service = PoiService::new(
            repository.clone(),
            storage.clone(),
            UploadLimits::default(),
            Duration::from_millis(50),
        );

        let err = service.create_poi(kremlin()).await.unwrap_err();

        assert!(
            matches!(&err, ApplicationError::Storage(msg) if msg.contains("deadline") && msg.contains("intro.mp3")),
            "got {:?}",
            err
        );
        assert!(storage.keys().is_empty());
        assert_eq!(repository.count(), 0);
        assert!(repository.budgets().is_empty());
    }

    #[tokio::test]
    async fn commit_outlasting_the_deadline_keeps_row_and_objects() {
        let repository = Arc::new(InMemoryPoiRepository::stalling_after_commit(
            Duration::from_millis(200),
        ));
        let storage = Arc::new(InMemoryStorage::default());
        let service = PoiService::new(
            repository.clone(),
            storage.clone(),
            UploadLimits::default(),
            Duration::from_millis(50),
        );

        let poi = service.create_poi(kremlin()).await.unwrap();

        assert_eq!(repository.count(), 1);
        assert_eq!(storage.keys().len(), 4);
        assert!(storage.deleted_keys().is_empty());
        assert!(poi.files().all(|f| storage.keys().contains(&f.s3_key)));

        let budgets = repository.budgets();
        assert_eq!(budgets.len(), 1);
        assert!(budgets[0] > Duration::ZERO && budgets[0] <= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn exhausted_budget_skips_the_write_and_rolls_back() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::default());
        let service = PoiService::new(
            repository.clone(),
            storage.clone(),
            UploadLimits::default(),
            Duration::ZERO,
        );

        let err = service.create_poi(kremlin()).await.unwrap_err();

        assert_eq!(
            err,
            ApplicationError::Storage("deadline exceeded before saving the POI".to_string())
        );
        assert!(repository.budgets().is_empty());
        assert_eq!(repository.count(), 0);
        assert!(storage.keys().is_empty());
        assert_eq!(storage.deleted_keys().len(), 4);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_stores() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::default());
        let service = service(repository.clone(), storage.clone());

        let mut bad_latitude = kremlin();
        bad_latitude.latitude = 91.0;
        let mut blank_name = kremlin();
        blank_name.name = "   ".to_string();

        for request in [bad_latitude, blank_name] {
            let err = service.create_poi(request).await.unwrap_err();
            assert!(matches!(err, ApplicationError::Validation(_)));
        }
        assert_eq!(storage.upload_count(), 0);
        assert_eq!(repository.count(), 0);
    }

    #[tokio::test]
    async fn rejected_media_causes_no_writes() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::default());
        let service = service(repository.clone(), storage.clone());

        let mut wrong_type = kremlin();
        wrong_type.full_audio.push(FileData::new(
            vec![0; 4],
            "notes.txt".to_string(),
            "text/plain".to_string(),
        ));
        let err = service.create_poi(wrong_type).await.unwrap_err();
        assert!(matches!(err, ApplicationError::UnsupportedMedia(_)));

        let mut too_big = kremlin();
        too_big.image = image("huge.png", (10 << 20) + 1);
        let err = service.create_poi(too_big).await.unwrap_err();
        assert!(matches!(err, ApplicationError::PayloadTooLarge(_)));

        assert_eq!(storage.upload_count(), 0);
    }

    #[tokio::test]
    async fn mime_parameters_are_ignored_when_checking_types() {
        let service = service(
            Arc::new(InMemoryPoiRepository::default()),
            Arc::new(InMemoryStorage::default()),
        );
        let mut request = kremlin();
        request.image.mime_type = "Image/JPEG; q=0.9".to_string();

        assert!(service.create_poi(request).await.is_ok());
    }

    #[tokio::test]
    async fn nearest_finds_created_poi_and_misses_far_away() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let service = service(repository, Arc::new(InMemoryStorage::default()));
        let created = service.create_poi(kremlin()).await.unwrap();

        let found = service
            .find_nearest_poi(55.7558, 37.6173, 150, vec![])
            .await
            .unwrap();
        assert_eq!(found.id, created.id);

        let err = service
            .find_nearest_poi(0.0, 0.0, 150, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    fn poi_at(name: &str, latitude: f64, longitude: f64, interests: Vec<i64>) -> CreatePoiDTO {
        CreatePoiDTO {
            name: name.to_string(),
            latitude,
            longitude,
            interests,
            short_audio: None,
            full_audio: vec![],
            ..kremlin()
        }
    }

    #[tokio::test]
    async fn nearest_picks_the_closest_in_range_and_honours_interests() {
        let service = service(
            Arc::new(InMemoryPoiRepository::default()),
            Arc::new(InMemoryStorage::default()),
        );
        // ~111 m, ~11 m and ~467 m north of the query point
        let far = service
            .create_poi(poi_at("far", 55.7568, 37.6173, vec![1]))
            .await
            .unwrap();
        let near = service
            .create_poi(poi_at("near", 55.7559, 37.6173, vec![2]))
            .await
            .unwrap();
        service
            .create_poi(poi_at("outside", 55.7600, 37.6173, vec![3]))
            .await
            .unwrap();

        let found = service
            .find_nearest_poi(55.7558, 37.6173, 150, vec![])
            .await
            .unwrap();
        assert_eq!(found.id, near.id);

        let found = service
            .find_nearest_poi(55.7558, 37.6173, 150, vec![1])
            .await
            .unwrap();
        assert_eq!(found.id, far.id);

        let found = service
            .find_nearest_poi(55.7558, 37.6173, 150, vec![1, 2])
            .await
            .unwrap();
        assert_eq!(found.id, near.id);

        let err = service
            .find_nearest_poi(55.7558, 37.6173, 150, vec![3])
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));

        let found = service
            .find_nearest_poi(55.7558, 37.6173, 500, vec![3])
            .await
            .unwrap();
        assert_eq!(found.name, "outside");
    }

    #[tokio::test]
    async fn equal_distance_resolves_to_the_lowest_id() {
        let service = service(
            Arc::new(InMemoryPoiRepository::default()),
            Arc::new(InMemoryStorage::default()),
        );
        let first = service
            .create_poi(poi_at("first", 55.7562, 37.6180, vec![]))
            .await
            .unwrap();
        let second = service
            .create_poi(poi_at("second", 55.7562, 37.6180, vec![]))
            .await
            .unwrap();
        assert!(first.id < second.id);

        for _ in 0..3 {
            let found = service
                .find_nearest_poi(55.7562, 37.6180, 150, vec![])
                .await
                .unwrap();
            assert_eq!(found.id, first.id);
        }
    }

    #[tokio::test]
    async fn nearest_rejects_out_of_range_input() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let service = service(repository.clone(), Arc::new(InMemoryStorage::default()));

        for (lat, lng, radius) in [(-90.5, 0.0, 150), (0.0, 181.0, 150), (0.0, 0.0, 0)] {
            let err = service
                .find_nearest_poi(lat, lng, radius, vec![])
                .await
                .unwrap_err();
            assert!(matches!(err, ApplicationError::Validation(_)));
        }
        assert_eq!(repository.query_count(), 0);
    }

    #[tokio::test]
    async fn delete_removes_objects_and_row() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::default());
        let service = service(repository.clone(), storage.clone());
        let created = service.create_poi(kremlin()).await.unwrap();

        assert!(service.delete_poi(created.id).await.unwrap());

        assert!(storage.keys().is_empty());
        let err = service
            .find_nearest_poi(55.7558, 37.6173, 150, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found_and_deletes_nothing() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::default());
        let service = service(repository.clone(), storage.clone());
        service.create_poi(kremlin()).await.unwrap();

        let err = service.delete_poi(999).await.unwrap_err();

        assert!(matches!(err, ApplicationError::NotFound(_)));
        assert_eq!(storage.keys().len(), 4);
        assert_eq!(repository.count(), 1);
    }

    #[tokio::test]
    async fn partial_object_delete_failure_keeps_the_row() {
        let repository = Arc::new(InMemoryPoiRepository::default());
        let storage = Arc::new(InMemoryStorage::failing_deletes());
        let service = service(repository.clone(), storage);
        let created = service.create_poi(kremlin()).await.unwrap();

        let err = service.delete_poi(created.id).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Storage(_)));
        assert_eq!(repository.count(), 1);
    }

    #[tokio::test]
    async fn compensation_runs_newest_first() {
        let storage = InMemoryStorage::default();
        let mut saga = UploadSaga::default();
        saga.record(CompensatingAction::DeleteObject("a".to_string()));
        saga.record(CompensatingAction::DeleteObject("b".to_string()));

        saga.compensate(&storage).await;

        assert_eq!(storage.deleted_keys(), vec!["b".to_string(), "a".to_string()]);
    }
}
