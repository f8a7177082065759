//! Tracking store - current location per vehicle
//!
//! One record per vehicle identifier in the tracking collection, holding a
//! `location` geo-point. Location writes are merges so any other fields on
//! the record survive. Subscriptions are live document listeners.

use crate::domain::types::{GeoPoint, VehicleId};
use crate::domain::Resource;
use crate::error::BackendError;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::backend::{Document, DocumentBackend, DocumentSnapshot, WriteMode};
use crate::io::feed::LiveFeed;
use crate::services::live_query::{open_live_query, report_listener_failure, NOT_FOUND};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Field holding the geo-point on a tracking record
pub const LOCATION_FIELD: &str = "location";

/// Write and watch the current location of a vehicle
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Merge `location` into the vehicle's record; false on any failure
    async fn write_location(&self, vehicle: &VehicleId, latitude: f64, longitude: f64) -> bool;

    /// Live location of a vehicle: `Loading`, then one item per change
    fn subscribe_location(&self, vehicle: &VehicleId) -> LiveFeed<Resource<GeoPoint>>;
}

/// `TrackingStore` on top of a document backend
pub struct TrackingRepository {
    backend: Arc<dyn DocumentBackend>,
    collection: String,
    metrics: Arc<Metrics>,
}

impl TrackingRepository {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        collection: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { backend, collection: collection.into(), metrics }
    }

    pub fn from_config(
        backend: Arc<dyn DocumentBackend>,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::new(backend, config.tracking_collection(), metrics)
    }
}

/// Interpret one change notification
fn location_from_snapshot(snapshot: &DocumentSnapshot) -> Resource<GeoPoint> {
    snapshot
        .get(LOCATION_FIELD)
        .and_then(|value| serde_json::from_value::<GeoPoint>(value.clone()).ok())
        .map_or_else(|| Resource::error(NOT_FOUND), Resource::Success)
}

#[async_trait]
impl TrackingStore for TrackingRepository {
    async fn write_location(&self, vehicle: &VehicleId, latitude: f64, longitude: f64) -> bool {
        if vehicle.is_blank() {
            warn!("location_write_blank_vehicle");
            return false;
        }

        let point = GeoPoint::new(latitude, longitude);
        let value = match serde_json::to_value(point) {
            Ok(value) => value,
            Err(e) => {
                warn!(vehicle = %vehicle, error = %e, "location_encode_failed");
                return false;
            }
        };
        let mut data = Document::new();
        data.insert(LOCATION_FIELD.to_string(), value);

        match self.backend.set(&self.collection, vehicle.as_str(), data, WriteMode::Merge).await {
            Ok(()) => {
                debug!(vehicle = %vehicle, point = %point, "location_written");
                true
            }
            Err(e) => {
                warn!(vehicle = %vehicle, error = %e, "location_write_failed");
                false
            }
        }
    }

    fn subscribe_location(&self, vehicle: &VehicleId) -> LiveFeed<Resource<GeoPoint>> {
        let metrics = self.metrics.clone();
        let key = vehicle.to_string();

        open_live_query("tracking_location", vehicle.as_str(), self.metrics.clone(), |tx| {
            self.backend.add_document_listener(
                &self.collection,
                vehicle.as_str(),
                Box::new(move |event: Result<DocumentSnapshot, BackendError>| {
                    let item = match event {
                        Ok(snapshot) => location_from_snapshot(&snapshot),
                        Err(e) => Resource::Error(report_listener_failure(
                            &metrics,
                            "tracking_location",
                            &key,
                            &e,
                        )),
                    };
                    tx.send(item);
                }),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::MemoryBackend;
    use serde_json::json;

    fn repo() -> (Arc<MemoryBackend>, TrackingRepository, Arc<Metrics>) {
        let backend = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(Metrics::new());
        let repo = TrackingRepository::new(backend.clone(), "tracking", metrics.clone());
        (backend, repo, metrics)
    }

    #[tokio::test]
    async fn test_write_merges_location() {
        let (backend, repo, _) = repo();
        backend
            .set(
                "tracking",
                "ABC123",
                json!({ "name": "Route 4" }).as_object().cloned().unwrap(),
                WriteMode::Overwrite,
            )
            .await
            .unwrap();

        assert!(repo.write_location(&VehicleId::new("ABC123"), 10.0, 20.0).await);

        let stored = backend.peek("tracking", "ABC123").unwrap();
        assert_eq!(stored["name"], "Route 4");
        assert_eq!(stored["location"], json!({ "latitude": 10.0, "longitude": 20.0 }));
    }

    #[tokio::test]
    async fn test_write_failure_is_false() {
        let (backend, repo, _) = repo();
        backend.set_fail_writes(true);
        assert!(!repo.write_location(&VehicleId::new("ABC123"), 1.0, 2.0).await);
        assert!(!repo.write_location(&VehicleId::new(" "), 1.0, 2.0).await);
    }

    #[tokio::test]
    async fn test_subscribe_existing_then_changes() {
        let (_backend, repo, _) = repo();
        let vehicle = VehicleId::new("ABC123");
        repo.write_location(&vehicle, 10.0, 20.0).await;

        let mut feed = repo.subscribe_location(&vehicle);
        assert_eq!(feed.recv().await, Some(Resource::Loading));
        assert_eq!(feed.recv().await, Some(Resource::Success(GeoPoint::new(10.0, 20.0))));

        repo.write_location(&vehicle, 10.1, 20.1).await;
        assert_eq!(feed.recv().await, Some(Resource::Success(GeoPoint::new(10.1, 20.1))));
    }

    #[tokio::test]
    async fn test_record_without_location_is_not_found() {
        let (backend, repo, _) = repo();
        backend
            .set(
                "tracking",
                "ABC123",
                json!({ "name": "x" }).as_object().cloned().unwrap(),
                WriteMode::Merge,
            )
            .await
            .unwrap();

        let mut feed = repo.subscribe_location(&VehicleId::new("ABC123"));
        assert_eq!(feed.recv().await, Some(Resource::Loading));
        assert_eq!(feed.recv().await, Some(Resource::error(NOT_FOUND)));
    }

    #[tokio::test]
    async fn test_listener_failure_keeps_stream() {
        let (backend, repo, metrics) = repo();
        let vehicle = VehicleId::new("ABC123");
        let mut feed = repo.subscribe_location(&vehicle);
        assert_eq!(feed.recv().await, Some(Resource::Loading));
        assert_eq!(feed.recv().await, Some(Resource::error(NOT_FOUND)));

        backend.inject_listener_error("tracking", "ABC123", "");
        repo.write_location(&vehicle, 3.0, 4.0).await;

        assert_eq!(feed.recv().await, Some(Resource::error("Something went wrong")));
        assert_eq!(feed.recv().await, Some(Resource::Success(GeoPoint::new(3.0, 4.0))));
        assert_eq!(metrics.listener_errors_total(), 1);
    }

    #[tokio::test]
    async fn test_cancel_detaches_listener() {
        let (backend, repo, metrics) = repo();
        let mut feed = repo.subscribe_location(&VehicleId::new("ABC123"));
        assert_eq!(backend.listener_count(), 1);
        assert_eq!(metrics.active_subscriptions(), 1);

        feed.cancel();
        feed.cancel();
        assert_eq!(backend.listener_count(), 0);
        assert_eq!(metrics.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_registration_failure_is_single_error() {
        let (backend, repo, _) = repo();
        backend.set_fail_registrations(true);

        let mut feed = repo.subscribe_location(&VehicleId::new("ABC123"));
        assert_eq!(feed.recv().await, Some(Resource::Loading));
        assert!(matches!(feed.recv().await, Some(Resource::Error(_))));
        assert_eq!(feed.try_recv(), None);
        assert_eq!(backend.listener_count(), 0);
    }
}
