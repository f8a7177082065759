//! Tracking service - background lifecycle of location publishing
//!
//! The service runs as its own task, independent of whoever issues
//! commands. Callers talk to it through a `TrackingServiceHandle` over an
//! mpsc command channel; state and the last published location are exposed
//! as watch values. The service task is the only writer of its state.
//!
//! State machine: `Idle` → `Starting` → `Tracking` → `Idle` (on stop).
//! While tracking, a pipeline task drives acquisition → publish and feeds
//! every display string into the foreground presence.

use crate::domain::types::{GeoPoint, VehicleId};
use crate::error::StartError;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::location::LocationClient;
use crate::services::publisher::{PublishedLocation, TrackingPublisher};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Starting,
    Tracking,
}

impl ServiceState {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Idle => "idle",
            ServiceState::Starting => "starting",
            ServiceState::Tracking => "tracking",
        }
    }
}

/// Content of the ongoing tracking notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePayload {
    pub title: String,
    pub body: String,
}

/// Host-side indicator that background work is intentionally running
pub trait ForegroundPresence: Send + Sync {
    fn start_foreground(&self, payload: &PresencePayload);
    fn update(&self, payload: &PresencePayload);
    fn stop_foreground(&self);
}

/// Presence that only writes to the log
pub struct LogPresence;

impl ForegroundPresence for LogPresence {
    fn start_foreground(&self, payload: &PresencePayload) {
        info!(title = %payload.title, body = %payload.body, "presence_started");
    }

    fn update(&self, payload: &PresencePayload) {
        info!(title = %payload.title, body = %payload.body, "presence_updated");
    }

    fn stop_foreground(&self) {
        info!("presence_stopped");
    }
}

/// Observable tracking state for presentation layers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackedLocation {
    /// Vehicle of the current or most recent session
    pub vehicle: Option<VehicleId>,
    /// Last point handed to the store in that session
    pub last_point: Option<GeoPoint>,
    pub is_driving: bool,
}

enum Command {
    Start { vehicle: VehicleId, reply: oneshot::Sender<Result<(), StartError>> },
    Stop { reply: oneshot::Sender<()> },
}

/// Running acquisition → publish session
///
/// Dropping a session without `stop` (the service future was dropped or its
/// task aborted) still cancels it, which detaches acquisition.
struct Session {
    vehicle: VehicleId,
    cancel: CancellationToken,
    pipeline: JoinHandle<()>,
    _teardown: DropGuard,
}

/// Background worker owning the tracking state machine
pub struct TrackingService {
    cmd_rx: mpsc::Receiver<Command>,
    location: LocationClient,
    publisher: TrackingPublisher,
    presence: Arc<dyn ForegroundPresence>,
    metrics: Arc<Metrics>,
    interval: Duration,
    presence_title: String,
    unknown_text: String,
    state_tx: watch::Sender<ServiceState>,
    tracked_tx: Arc<watch::Sender<TrackedLocation>>,
    shutdown: CancellationToken,
    session: Option<Session>,
}

impl TrackingService {
    /// Process commands until shutdown or until every handle is gone
    pub async fn run(mut self) {
        info!(interval_ms = %self.interval.as_millis(), "tracking_service_started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Start { vehicle, reply }) => {
                        let result = self.start(vehicle);
                        let _ = reply.send(result);
                    }
                    Some(Command::Stop { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                    }
                    None => break,
                },
            }
        }

        self.stop().await;
        info!("tracking_service_stopped");
    }

    fn state(&self) -> ServiceState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ServiceState) {
        self.state_tx.send_replace(state);
        debug!(state = %state.as_str(), "tracking_state_changed");
    }

    fn start(&mut self, vehicle: VehicleId) -> Result<(), StartError> {
        if self.state() != ServiceState::Idle {
            let active = self.session.as_ref().map(|s| s.vehicle.to_string()).unwrap_or_default();
            info!(requested = %vehicle, active = %active, "tracking_start_ignored");
            return Ok(());
        }
        if vehicle.is_blank() {
            warn!("tracking_start_blank_vehicle");
            return Err(StartError::BlankVehicle);
        }

        self.set_state(ServiceState::Starting);

        let samples = match self.location.location_updates(self.interval) {
            Ok(samples) => samples,
            Err(e) => {
                self.metrics.record_start_failure();
                warn!(vehicle = %vehicle, error = %e, "tracking_start_failed");
                self.set_state(ServiceState::Idle);
                return Err(e.into());
            }
        };

        self.presence.start_foreground(&PresencePayload {
            title: self.presence_title.clone(),
            body: self.unknown_text.clone(),
        });

        let cancel = self.shutdown.child_token();
        let published = self.publisher.publish(vehicle.clone(), samples, cancel.clone());
        let pipeline = spawn_pipeline(
            vehicle.clone(),
            published,
            self.presence.clone(),
            self.presence_title.clone(),
            self.tracked_tx.clone(),
            self.metrics.clone(),
        );

        self.tracked_tx.send_replace(TrackedLocation {
            vehicle: Some(vehicle.clone()),
            last_point: None,
            is_driving: true,
        });
        self.metrics.record_service_start();
        info!(vehicle = %vehicle, "tracking_started");

        let teardown = cancel.clone().drop_guard();
        self.session = Some(Session { vehicle, cancel, pipeline, _teardown: teardown });
        self.set_state(ServiceState::Tracking);
        Ok(())
    }

    /// Tear down the running session; no-op when idle
    async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("tracking_stop_idle");
            return;
        };

        session.cancel.cancel();
        // The pipeline owns the acquisition feed, so it is detached once this returns
        if let Err(e) = session.pipeline.await {
            warn!(vehicle = %session.vehicle, error = %e, "pipeline_join_failed");
        }

        self.presence.stop_foreground();
        self.tracked_tx.send_modify(|tracked| tracked.is_driving = false);
        self.metrics.record_service_stop();
        info!(vehicle = %session.vehicle, "tracking_stopped");
        self.set_state(ServiceState::Idle);
    }
}

/// Drive published locations into presence and the tracked value
///
/// A panic inside the pipeline is contained here: it is logged and counted,
/// and the session stays up until stopped.
fn spawn_pipeline<S>(
    vehicle: VehicleId,
    published: S,
    presence: Arc<dyn ForegroundPresence>,
    title: String,
    tracked_tx: Arc<watch::Sender<TrackedLocation>>,
    metrics: Arc<Metrics>,
) -> JoinHandle<()>
where
    S: Stream<Item = PublishedLocation> + Send + 'static,
{
    let inner = tokio::spawn(async move {
        let mut published = Box::pin(published);
        while let Some(location) = published.next().await {
            presence.update(&PresencePayload { title: title.clone(), body: location.display });
            tracked_tx.send_modify(|tracked| tracked.last_point = Some(location.point));
        }
    });

    tokio::spawn(async move {
        match inner.await {
            Ok(()) => debug!(vehicle = %vehicle, "pipeline_finished"),
            Err(e) if e.is_panic() => {
                metrics.record_pipeline_failure();
                error!(vehicle = %vehicle, "pipeline_panicked");
            }
            Err(e) => warn!(vehicle = %vehicle, error = %e, "pipeline_aborted"),
        }
    })
}

/// Command side of the tracking service
///
/// Dropping the handle shuts the service down, tearing down any session.
pub struct TrackingServiceHandle {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ServiceState>,
    tracked_rx: watch::Receiver<TrackedLocation>,
    shutdown: CancellationToken,
}

impl TrackingServiceHandle {
    /// Start tracking `vehicle`
    ///
    /// Ignored (and `Ok`) while a session is starting or running, whatever
    /// its vehicle. Fails when acquisition preconditions are not met.
    pub async fn start(&self, vehicle: impl Into<VehicleId>) -> Result<(), StartError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Start { vehicle: vehicle.into(), reply })
            .await
            .map_err(|_| StartError::ServiceGone)?;
        rx.await.map_err(|_| StartError::ServiceGone)?
    }

    /// Stop tracking; safe to call in any state, any number of times
    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Stop { reply }).await.is_err() {
            debug!("tracking_stop_service_gone");
            return;
        }
        let _ = rx.await;
    }

    pub fn state(&self) -> ServiceState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ServiceState> {
        self.state_rx.clone()
    }

    pub fn tracked_location(&self) -> watch::Receiver<TrackedLocation> {
        self.tracked_rx.clone()
    }

    /// Ask the service task to tear down and exit
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TrackingServiceHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Create a tracking service and its handle
///
/// Returns the handle (for callers) and the service (to be spawned)
pub fn create_tracking_service(
    location: LocationClient,
    publisher: TrackingPublisher,
    presence: Arc<dyn ForegroundPresence>,
    config: &Config,
    metrics: Arc<Metrics>,
) -> (TrackingServiceHandle, TrackingService) {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer());
    let (state_tx, state_rx) = watch::channel(ServiceState::Idle);
    let (tracked_tx, tracked_rx) = watch::channel(TrackedLocation::default());
    let shutdown = CancellationToken::new();

    let service = TrackingService {
        cmd_rx,
        location,
        publisher,
        presence,
        metrics,
        interval: config.location_interval(),
        presence_title: config.presence_title().to_string(),
        unknown_text: config.presence_unknown_text().to_string(),
        state_tx,
        tracked_tx: Arc::new(tracked_tx),
        shutdown: shutdown.clone(),
        session: None,
    };
    let handle = TrackingServiceHandle { cmd_tx, state_rx, tracked_rx, shutdown };
    (handle, service)
}
