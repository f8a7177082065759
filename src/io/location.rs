//! Location acquisition
//!
//! `LocationProvider` is the narrow platform seam (permission check, provider
//! status, callback registration). `LocationClient` turns it into a
//! cancellable `LocationStream` of raw samples.
//!
//! Preconditions are checked when acquisition starts, not when the client is
//! built, and a failed check is terminal for that attempt: the client never
//! polls for permission or provider changes.

use crate::domain::types::LocationSample;
use crate::error::LocationError;
use crate::io::feed::{feed_channel, Detach, FeedSender, LiveFeed};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Position sources the platform may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Satellite positioning
    Gps,
    /// Cell / Wi-Fi based positioning
    Network,
}

/// Handle for one platform registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters of an update registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest {
    pub interval: Duration,
}

/// Payload of one platform callback; the fix may be absent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationResult {
    pub last_location: Option<LocationSample>,
}

impl LocationResult {
    pub fn fix(sample: LocationSample) -> Self {
        Self { last_location: Some(sample) }
    }

    pub fn empty() -> Self {
        Self { last_location: None }
    }
}

/// Callback the platform invokes on every tick
#[derive(Debug, Clone)]
pub struct LocationCallback {
    tx: FeedSender<LocationSample>,
}

impl LocationCallback {
    /// Forward the tick's fix, if it carries one
    pub fn on_location_result(&self, result: LocationResult) {
        if let Some(sample) = result.last_location {
            self.tx.send(sample);
        }
    }

    /// The consuming stream has been cancelled or dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Platform position-fix capability
pub trait LocationProvider: Send + Sync {
    fn has_location_permission(&self) -> bool;

    fn is_provider_enabled(&self, kind: ProviderKind) -> bool;

    /// Begin delivering fixes to `callback` until removed
    fn request_location_updates(
        &self,
        request: UpdateRequest,
        callback: LocationCallback,
    ) -> RequestId;

    fn remove_location_updates(&self, id: RequestId);
}

/// Infinite stream of samples, detached from the platform on cancel/drop
pub type LocationStream = LiveFeed<LocationSample>;

/// Starts acquisition against a platform provider
#[derive(Clone)]
pub struct LocationClient {
    provider: Arc<dyn LocationProvider>,
}

impl LocationClient {
    pub fn new(provider: Arc<dyn LocationProvider>) -> Self {
        Self { provider }
    }

    /// Validate preconditions and register for updates every `interval`
    ///
    /// Samples are yielded raw, in callback order, with no smoothing or
    /// deduplication.
    pub fn location_updates(&self, interval: Duration) -> Result<LocationStream, LocationError> {
        if !self.provider.has_location_permission() {
            warn!("location_permission_denied");
            return Err(LocationError::PermissionDenied);
        }

        let gps = self.provider.is_provider_enabled(ProviderKind::Gps);
        let network = self.provider.is_provider_enabled(ProviderKind::Network);
        if !gps && !network {
            warn!("location_providers_disabled");
            return Err(LocationError::ProviderUnavailable);
        }

        let (tx, rx) = feed_channel();
        let id = self
            .provider
            .request_location_updates(UpdateRequest { interval }, LocationCallback { tx });

        info!(
            request_id = %id,
            interval_ms = %interval.as_millis(),
            gps = %gps,
            network = %network,
            "location_updates_requested"
        );

        let provider = self.provider.clone();
        let detach = Detach::new(move || {
            provider.remove_location_updates(id);
            debug!(request_id = %id, "location_updates_removed");
        });

        Ok(LiveFeed::new(rx, detach))
    }
}
