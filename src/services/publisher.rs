//! Tracking publisher - acquisition samples to store writes
//!
//! Every sample triggers a location write and yields a display item right
//! away. Writes run as their own tasks so a slow store never holds back the
//! next sample; several writes may be in flight at once and may land out of
//! order. Write outcomes only feed logs and metrics. Cancelling a session
//! stops taking samples; writes already started are left to finish.

use crate::domain::types::{GeoPoint, LocationSample, VehicleId};
use crate::infra::metrics::Metrics;
use crate::services::tracking_repo::TrackingStore;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One published sample, ready for presentation
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedLocation {
    pub point: GeoPoint,
    /// e.g. `10.0º N, 20.0º E`
    pub display: String,
}

#[derive(Clone)]
pub struct TrackingPublisher {
    store: Arc<dyn TrackingStore>,
    metrics: Arc<Metrics>,
}

impl TrackingPublisher {
    pub fn new(store: Arc<dyn TrackingStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Bind `samples` to the store under `vehicle`
    ///
    /// The returned stream ends when `samples` ends or `cancel` fires; writes
    /// still in flight at that point run to completion.
    pub fn publish<S>(
        &self,
        vehicle: VehicleId,
        samples: S,
        cancel: CancellationToken,
    ) -> impl Stream<Item = PublishedLocation> + Send + 'static
    where
        S: Stream<Item = LocationSample> + Send + 'static,
    {
        let store = self.store.clone();
        let metrics = self.metrics.clone();
        let stop = cancel.cancelled_owned();

        samples
            .map(move |sample| {
                metrics.record_sample();
                let point = sample.point();
                debug!(
                    vehicle = %vehicle,
                    point = %point,
                    acquired_at = %sample.acquired_at(),
                    "sample_published"
                );
                spawn_write(store.clone(), metrics.clone(), vehicle.clone(), point);
                PublishedLocation { point, display: sample.to_formatted_string() }
            })
            .take_until(stop)
    }
}

fn spawn_write(store: Arc<dyn TrackingStore>, metrics: Arc<Metrics>, vehicle: VehicleId, point: GeoPoint) {
    tokio::spawn(async move {
        let started = Instant::now();
        let ok = store.write_location(&vehicle, point.latitude, point.longitude).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        on_write_complete(&metrics, &vehicle, point, ok, latency_ms);
    });
}

/// Completion callback: report only, never touches acquisition
fn on_write_complete(metrics: &Metrics, vehicle: &VehicleId, point: GeoPoint, ok: bool, latency_ms: u64) {
    metrics.record_write(ok, latency_ms);
    if ok {
        debug!(vehicle = %vehicle, point = %point, latency_ms = %latency_ms, "location_sent");
    } else {
        warn!(vehicle = %vehicle, point = %point, latency_ms = %latency_ms, "location_send_failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Resource;
    use crate::io::feed::LiveFeed;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Store whose writes take a fixed time and can be told to fail
    #[derive(Default)]
    struct SlowStore {
        delay: Duration,
        fail: bool,
        written: Mutex<Vec<GeoPoint>>,
    }

    #[async_trait]
    impl TrackingStore for SlowStore {
        async fn write_location(&self, _vehicle: &VehicleId, latitude: f64, longitude: f64) -> bool {
            tokio::time::sleep(self.delay).await;
            self.written.lock().push(GeoPoint::new(latitude, longitude));
            !self.fail
        }

        fn subscribe_location(&self, _vehicle: &VehicleId) -> LiveFeed<Resource<GeoPoint>> {
            let (_tx, rx) = crate::io::feed::feed_channel();
            LiveFeed::new(rx, crate::io::feed::Detach::noop())
        }
    }

    fn samples() -> Vec<LocationSample> {
        vec![
            LocationSample::new(10.0, 20.0),
            LocationSample::new(10.1, 20.1),
            LocationSample::new(10.2, 20.2),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_display_does_not_wait_for_writes() {
        let store = Arc::new(SlowStore { delay: Duration::from_secs(30), ..Default::default() });
        let metrics = Arc::new(Metrics::new());
        let publisher = TrackingPublisher::new(store.clone(), metrics.clone());

        let published: Vec<_> = publisher
            .publish(VehicleId::new("ABC123"), futures::stream::iter(samples()), CancellationToken::new())
            .collect()
            .await;

        let displays: Vec<_> = published.iter().map(|p| p.display.as_str()).collect();
        assert_eq!(displays, vec!["10.0º N, 20.0º E", "10.1º N, 20.1º E", "10.2º N, 20.2º E"]);
        assert_eq!(metrics.samples_total(), 3);
        assert!(store.written.lock().is_empty());

        // All three writes were in flight together
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.written.lock().len(), 3);
        assert_eq!(metrics.writes_ok_total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_writes_do_not_drop_samples() {
        let store = Arc::new(SlowStore { fail: true, ..Default::default() });
        let metrics = Arc::new(Metrics::new());
        let publisher = TrackingPublisher::new(store, metrics.clone());

        let published: Vec<_> = publisher
            .publish(VehicleId::new("ABC123"), futures::stream::iter(samples()), CancellationToken::new())
            .collect()
            .await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(published.len(), 3);
        assert_eq!(metrics.writes_failed_total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_ends_stream_and_lets_writes_finish() {
        let store = Arc::new(SlowStore { delay: Duration::from_secs(30), ..Default::default() });
        let metrics = Arc::new(Metrics::new());
        let publisher = TrackingPublisher::new(store.clone(), metrics.clone());
        let cancel = CancellationToken::new();

        let mut stream = Box::pin(publisher.publish(
            VehicleId::new("ABC123"),
            futures::stream::iter(samples()),
            cancel.clone(),
        ));
        assert!(stream.next().await.is_some());

        cancel.cancel();
        assert!(stream.next().await.is_none());

        // Only the first sample was taken; its write still lands
        assert!(store.written.lock().is_empty());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(*store.written.lock(), vec![GeoPoint::new(10.0, 20.0)]);
        assert_eq!(metrics.writes_ok_total(), 1);
        assert_eq!(metrics.samples_total(), 1);
    }
}
