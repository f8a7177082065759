//! Tracking subscriber - observer side of a vehicle's location
//!
//! Each call opens its own backend listener, so concurrent observers of the
//! same vehicle are fully independent.

use crate::domain::profile::{observes_location, UserProfile, UserRole};
use crate::domain::types::{GeoPoint, VehicleId};
use crate::domain::Resource;
use crate::io::feed::LiveFeed;
use crate::services::tracking_repo::TrackingStore;
use std::sync::Arc;
use tracing::{debug, info};

pub type LocationFeed = LiveFeed<Resource<GeoPoint>>;

#[derive(Clone)]
pub struct TrackingSubscriber {
    store: Arc<dyn TrackingStore>,
}

impl TrackingSubscriber {
    pub fn new(store: Arc<dyn TrackingStore>) -> Self {
        Self { store }
    }

    /// Live location of `vehicle`
    pub fn observe(&self, vehicle: &VehicleId) -> LocationFeed {
        debug!(vehicle = %vehicle, "observe_location");
        self.store.subscribe_location(vehicle)
    }

    /// Role-aware observation
    ///
    /// A driver watches its own vehicle (echo of what it publishes); a parent
    /// watches the vehicle it follows. Both read the same record.
    pub fn observe_for(&self, role: UserRole, vehicle: &VehicleId) -> Option<LocationFeed> {
        if !observes_location(role) {
            return None;
        }
        match role {
            UserRole::Driver => info!(vehicle = %vehicle, "observe_own_vehicle"),
            UserRole::Parent => info!(vehicle = %vehicle, "observe_followed_vehicle"),
        }
        Some(self.observe(vehicle))
    }

    /// Observe the vehicle linked to a profile; `None` if it has none
    pub fn observe_profile(&self, profile: &UserProfile) -> Option<LocationFeed> {
        let vehicle = profile.vehicle()?;
        self.observe_for(profile.role, &vehicle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::metrics::Metrics;
    use crate::io::memory::MemoryBackend;
    use crate::services::tracking_repo::TrackingRepository;

    fn subscriber() -> (Arc<MemoryBackend>, Arc<TrackingRepository>, TrackingSubscriber) {
        let backend = Arc::new(MemoryBackend::new());
        let repo = Arc::new(TrackingRepository::new(backend.clone(), "tracking", Arc::new(Metrics::new())));
        (backend, repo.clone(), TrackingSubscriber::new(repo))
    }

    #[tokio::test]
    async fn test_independent_observers() {
        let (backend, repo, subscriber) = subscriber();
        let vehicle = VehicleId::new("ABC123");
        let mut a = subscriber.observe(&vehicle);
        let mut b = subscriber.observe(&vehicle);
        assert_eq!(backend.listener_count(), 2);

        a.cancel();
        repo.write_location(&vehicle, 1.0, 2.0).await;

        assert_eq!(b.recv().await, Some(Resource::Loading));
        assert!(b.recv().await.unwrap().message().is_some());
        assert_eq!(b.recv().await, Some(Resource::Success(GeoPoint::new(1.0, 2.0))));
        assert_eq!(a.recv().await, None);
        assert_eq!(backend.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_profile_without_vehicle() {
        let (_backend, _repo, subscriber) = subscriber();
        let parent = UserProfile::new("p1", "Ana", "Kos", "a@b.c", UserRole::Parent);
        assert!(subscriber.observe_profile(&parent).is_none());

        let parent = parent.with_vehicle_plates("XYZ999");
        let mut feed = subscriber.observe_profile(&parent).unwrap();
        assert_eq!(feed.recv().await, Some(Resource::Loading));
    }

    #[tokio::test]
    async fn test_driver_echo() {
        let (_backend, repo, subscriber) = subscriber();
        let vehicle = VehicleId::new("ABC123");
        repo.write_location(&vehicle, 5.0, 6.0).await;

        let mut feed = subscriber.observe_for(UserRole::Driver, &vehicle).unwrap();
        assert_eq!(feed.recv().await, Some(Resource::Loading));
        assert_eq!(feed.recv().await, Some(Resource::Success(GeoPoint::new(5.0, 6.0))));
    }
}
