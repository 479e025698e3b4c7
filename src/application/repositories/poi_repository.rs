use std::time::Duration;

use async_trait::async_trait;

use crate::{
    application::error::ApplicationError,
    domain::models::poi::{NearbyQuery, PointOfInterest},
};

#[async_trait]
pub trait PoiRepository: Send + Sync {
    /// Persists the POI, its files and interest tags atomically and returns
    /// it with every id assigned. `budget` bounds the statements of the
    /// transaction on the database side; the commit outcome is always awaited.
    async fn create_poi(
        &self,
        poi: PointOfInterest,
        budget: Duration,
    ) -> Result<PointOfInterest, ApplicationError>;

    /// Closest POI within `query.radius_meters`, or `NotFound`.
    async fn find_nearest_poi(
        &self,
        query: &NearbyQuery,
    ) -> Result<PointOfInterest, ApplicationError>;

    async fn get_poi_by_id(&self, id: i64) -> Result<PointOfInterest, ApplicationError>;

    /// Removes the given file rows and the POI row in one transaction.
    /// Returns whether the POI row existed.
    async fn delete_poi(&self, id: i64, file_ids: &[i64]) -> Result<bool, ApplicationError>;
}
