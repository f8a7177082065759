//! Location providers that do not need a device
//!
//! - `SimulatedLocationProvider` replays a fixed route on a timer (demo binary)
//! - `ManualLocationProvider` delivers fixes only when told to (tests)

use crate::domain::types::{GeoPoint, LocationSample};
use crate::io::location::{
    LocationCallback, LocationProvider, LocationResult, ProviderKind, RequestId, UpdateRequest,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Platform switches shared by both providers
#[derive(Debug, Clone, Copy)]
struct Switches {
    permission: bool,
    gps: bool,
    network: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Self { permission: true, gps: true, network: true }
    }
}

impl Switches {
    fn enabled(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Gps => self.gps,
            ProviderKind::Network => self.network,
        }
    }

    fn set(&mut self, kind: ProviderKind, enabled: bool) {
        match kind {
            ProviderKind::Gps => self.gps = enabled,
            ProviderKind::Network => self.network = enabled,
        }
    }
}

/// Replays a route, one fix per interval, on the tokio runtime
///
/// Each registration gets its own replay task; the route is walked once and
/// the task then idles until removed.
pub struct SimulatedLocationProvider {
    switches: Switches,
    route: Vec<GeoPoint>,
    next_id: AtomicU64,
    tasks: Mutex<FxHashMap<u64, JoinHandle<()>>>,
}

impl SimulatedLocationProvider {
    pub fn new(route: Vec<GeoPoint>) -> Self {
        Self {
            switches: Switches::default(),
            route,
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn with_permission(mut self, granted: bool) -> Self {
        self.switches.permission = granted;
        self
    }

    pub fn with_provider(mut self, kind: ProviderKind, enabled: bool) -> Self {
        self.switches.set(kind, enabled);
        self
    }

    /// Registrations whose replay task is still alive
    pub fn active_requests(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl LocationProvider for SimulatedLocationProvider {
    fn has_location_permission(&self) -> bool {
        self.switches.permission
    }

    fn is_provider_enabled(&self, kind: ProviderKind) -> bool {
        self.switches.enabled(kind)
    }

    fn request_location_updates(
        &self,
        request: UpdateRequest,
        callback: LocationCallback,
    ) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let route = self.route.clone();
        // tokio::time::interval panics on a zero period
        let period = request.interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            for point in route {
                ticker.tick().await;
                if callback.is_closed() {
                    return;
                }
                callback.on_location_result(LocationResult::fix(LocationSample::new(
                    point.latitude,
                    point.longitude,
                )));
            }
            info!(request_id = %id, "simulated_route_finished");
            std::future::pending::<()>().await;
        });

        self.tasks.lock().insert(id, handle);
        RequestId(id)
    }

    fn remove_location_updates(&self, id: RequestId) {
        if let Some(handle) = self.tasks.lock().remove(&id.0) {
            handle.abort();
            debug!(request_id = %id, "simulated_replay_stopped");
        }
    }
}

/// Provider driven by explicit `push` calls
///
/// Fixes are fanned out to every live registration. Counters expose how many
/// registrations were made and removed so callers can check teardown.
#[derive(Default)]
pub struct ManualLocationProvider {
    switches: Mutex<Switches>,
    next_id: AtomicU64,
    requests_made: AtomicU64,
    removals: AtomicU64,
    callbacks: Mutex<FxHashMap<u64, LocationCallback>>,
    last_interval: Mutex<Option<Duration>>,
}

impl ManualLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permission(self, granted: bool) -> Self {
        self.switches.lock().permission = granted;
        self
    }

    pub fn with_provider(self, kind: ProviderKind, enabled: bool) -> Self {
        self.switches.lock().set(kind, enabled);
        self
    }

    /// Flip permission at runtime; live registrations are unaffected
    pub fn set_permission(&self, granted: bool) {
        self.switches.lock().permission = granted;
    }

    /// Deliver a fix to every registration
    pub fn push(&self, sample: LocationSample) {
        self.deliver(LocationResult::fix(sample));
    }

    /// Deliver a callback that carries no fix
    pub fn push_empty(&self) {
        self.deliver(LocationResult::empty());
    }

    fn deliver(&self, result: LocationResult) {
        let callbacks: Vec<LocationCallback> = self.callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback.on_location_result(result);
        }
    }

    pub fn requests_made(&self) -> u64 {
        self.requests_made.load(Ordering::Relaxed)
    }

    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    pub fn active_requests(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Interval of the most recent registration
    pub fn requested_interval(&self) -> Option<Duration> {
        *self.last_interval.lock()
    }
}

impl LocationProvider for ManualLocationProvider {
    fn has_location_permission(&self) -> bool {
        self.switches.lock().permission
    }

    fn is_provider_enabled(&self, kind: ProviderKind) -> bool {
        self.switches.lock().enabled(kind)
    }

    fn request_location_updates(
        &self,
        request: UpdateRequest,
        callback: LocationCallback,
    ) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests_made.fetch_add(1, Ordering::Relaxed);
        *self.last_interval.lock() = Some(request.interval);
        self.callbacks.lock().insert(id, callback);
        RequestId(id)
    }

    fn remove_location_updates(&self, id: RequestId) {
        if self.callbacks.lock().remove(&id.0).is_some() {
            self.removals.fetch_add(1, Ordering::Relaxed);
        }
    }
}
