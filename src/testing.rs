//! In-memory stand-ins for the object store and the POI store.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    adapters::{routes, state::AppState},
    application::{
        error::ApplicationError,
        repositories::poi_repository::PoiRepository,
        services::{
            storage_service::{ObjectSummary, StoredObject},
            PoiService, StorageService,
        },
    },
    domain::{
        config::app::UploadLimits,
        models::{
            file::FileData,
            poi::{NearbyQuery, PointOfInterest},
        },
    },
    services::object_key,
};

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

pub fn image(name: &str, size: usize) -> FileData {
    FileData::new(vec![0xff; size], name.to_string(), "image/jpeg".to_string())
}

pub fn mp3(name: &str, size: usize) -> FileData {
    FileData::new(vec![0x49; size], name.to_string(), "audio/mpeg".to_string())
}

pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

/// Full router over the in-memory stores, default limits and a 30 s deadline.
pub fn test_router(
    repository: Arc<InMemoryPoiRepository>,
    storage: Arc<InMemoryStorage>,
) -> Router {
    let poi_service = PoiService::new(
        repository,
        storage.clone(),
        UploadLimits::default(),
        Duration::from_secs(30),
    );
    routes::router(AppState {
        poi_service: Arc::new(poi_service),
        storage_service: storage,
    })
}

#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<BTreeMap<String, FileData>>,
    deleted: Mutex<Vec<String>>,
    uploads: AtomicUsize,
    fail_upload_at: Option<usize>,
    slow_upload_at: Option<(usize, Duration)>,
    fail_deletes: bool,
}

impl InMemoryStorage {
    /// The `n`-th upload (1-based) fails.
    pub fn failing_upload_at(n: usize) -> Self {
        Self {
            fail_upload_at: Some(n),
            ..Default::default()
        }
    }

    pub fn slow_upload_at(n: usize, delay: Duration) -> Self {
        Self {
            slow_upload_at: Some((n, delay)),
            ..Default::default()
        }
    }

    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Default::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
    }
}

#[async_trait]
impl StorageService for InMemoryStorage {
    async fn upload_file(&self, file_data: FileData) -> Result<String, ApplicationError> {
        let attempt = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_upload_at == Some(attempt) {
            return Err(ApplicationError::Storage(
                "simulated upload failure".to_string(),
            ));
        }
        if let Some((n, delay)) = self.slow_upload_at {
            if n == attempt {
                tokio::time::sleep(delay).await;
            }
        }

        let key = object_key(
            &file_data.mime_type,
            &file_data.filename,
            Utc::now(),
            Uuid::new_v4(),
        );
        self.objects.lock().unwrap().insert(key.clone(), file_data);
        Ok(key)
    }

    async fn delete_file(&self, key: &str) -> Result<(), ApplicationError> {
        if key.is_empty() {
            return Ok(());
        }
        if self.fail_deletes {
            return Err(ApplicationError::Storage(format!(
                "simulated delete failure for {}",
                key
            )));
        }
        self.remove(key);
        Ok(())
    }

    async fn delete_files(&self, keys: &[String]) -> Result<(), ApplicationError> {
        let keys: Vec<&String> = keys.iter().filter(|k| !k.is_empty()).collect();
        if keys.is_empty() {
            return Ok(());
        }
        if self.fail_deletes {
            return Err(ApplicationError::Storage(format!(
                "some files failed to delete: Key: {}, Code: InternalError",
                keys[0]
            )));
        }
        for key in keys {
            self.remove(key);
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StoredObject, ApplicationError> {
        let objects = self.objects.lock().unwrap();
        let data = objects
            .get(key)
            .ok_or_else(|| ApplicationError::NotFound(format!("File not found: {}", key)))?;
        Ok(StoredObject {
            content: data.content.clone(),
            content_length: data.size(),
            etag: Some("\"etag\"".to_string()),
            last_modified: Some(Utc::now()),
        })
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, ApplicationError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ObjectSummary {
                key: key.clone(),
                size: data.size(),
                last_modified: None,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<(), ApplicationError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPoiRepository {
    pois: Mutex<Vec<PointOfInterest>>,
    next_id: AtomicI64,
    queries: AtomicUsize,
    fail_create: bool,
    stall_after_commit: Option<Duration>,
    budgets: Mutex<Vec<Duration>>,
}

impl InMemoryPoiRepository {
    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Default::default()
        }
    }

    /// Commits, then keeps the caller waiting for `delay` before returning.
    pub fn stalling_after_commit(delay: Duration) -> Self {
        Self {
            stall_after_commit: Some(delay),
            ..Default::default()
        }
    }

    /// Statement budgets handed to every `create_poi` call.
    pub fn budgets(&self) -> Vec<Duration> {
        self.budgets.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.pois.lock().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl PoiRepository for InMemoryPoiRepository {
    async fn create_poi(
        &self,
        mut poi: PointOfInterest,
        budget: Duration,
    ) -> Result<PointOfInterest, ApplicationError> {
        self.budgets.lock().unwrap().push(budget);
        if self.fail_create {
            return Err(ApplicationError::Storage(
                "Database error: simulated failure".to_string(),
            ));
        }

        poi.id = self.next_id();
        let files = poi
            .image_file
            .iter_mut()
            .chain(poi.short_audio_file.iter_mut())
            .chain(poi.full_audio_files.iter_mut());
        for file in files {
            file.id = self.next_id();
        }

        self.pois.lock().unwrap().push(poi.clone());
        if let Some(delay) = self.stall_after_commit {
            tokio::time::sleep(delay).await;
        }
        Ok(poi)
    }

    async fn find_nearest_poi(
        &self,
        query: &NearbyQuery,
    ) -> Result<PointOfInterest, ApplicationError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let pois = self.pois.lock().unwrap();

        pois.iter()
            .filter(|p| {
                query.interests.is_empty()
                    || p.interests.iter().any(|i| query.interests.contains(i))
            })
            .map(|p| {
                let distance =
                    haversine_meters(query.latitude, query.longitude, p.latitude, p.longitude);
                (distance, p)
            })
            .filter(|(distance, _)| *distance <= query.radius_meters as f64)
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)))
            .map(|(_, p)| p.clone())
            .ok_or_else(|| ApplicationError::NotFound("No points of interest found".to_string()))
    }

    async fn get_poi_by_id(&self, id: i64) -> Result<PointOfInterest, ApplicationError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.pois
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| ApplicationError::NotFound(format!("POI {} not found", id)))
    }

    async fn delete_poi(&self, id: i64, _file_ids: &[i64]) -> Result<bool, ApplicationError> {
        let mut pois = self.pois.lock().unwrap();
        let before = pois.len();
        pois.retain(|p| p.id != id);
        Ok(pois.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_matches_known_distance() {
        // Red Square to the Bolshoi Theatre is roughly 700 m.
        let d = haversine_meters(55.7539, 37.6208, 55.7601, 37.6186);
        assert!((600.0..800.0).contains(&d), "got {}", d);
        assert_eq!(haversine_meters(10.0, 10.0, 10.0, 10.0), 0.0);
    }
}
