//! Shared plumbing for backend listeners exposed as `Resource` feeds
//!
//! Both repositories open listeners the same way: queue `Loading`, register,
//! and hand back a `LiveFeed` whose teardown removes the registration. A
//! registration that fails is reported as a single `Error` item on a feed
//! that stays open until the caller cancels it.

use crate::domain::Resource;
use crate::error::BackendError;
use crate::infra::metrics::Metrics;
use crate::io::backend::ListenerRegistration;
use crate::io::feed::{feed_channel, Detach, FeedSender, LiveFeed};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reported when a watched record is missing or has no usable value
pub const NOT_FOUND: &str = "Vehicle not found!";

/// Reported when a backend failure carries no message
pub const FALLBACK_FAILURE: &str = "Something went wrong";

/// Text shown to callers for a backend failure
pub fn failure_message(err: &BackendError) -> String {
    let message = match err {
        BackendError::Unavailable(m)
        | BackendError::Rejected(m)
        | BackendError::Listener(m)
        | BackendError::Registration(m) => m,
    };
    if message.trim().is_empty() {
        FALLBACK_FAILURE.to_string()
    } else {
        message.clone()
    }
}

/// Count and log a failure pushed to an attached listener
pub fn report_listener_failure(metrics: &Metrics, query: &str, key: &str, err: &BackendError) -> String {
    metrics.record_listener_error();
    let message = failure_message(err);
    warn!(query = %query, key = %key, error = %message, "listener_failure");
    message
}

/// Open a listener-backed feed
///
/// `register` receives the producer side and must deliver the current state
/// synchronously; `Loading` is queued before it runs so it is always first.
pub fn open_live_query<T, F>(
    query: &'static str,
    key: &str,
    metrics: Arc<Metrics>,
    register: F,
) -> LiveFeed<Resource<T>>
where
    T: Send + 'static,
    F: FnOnce(FeedSender<Resource<T>>) -> Result<ListenerRegistration, BackendError>,
{
    let (tx, rx) = feed_channel();
    tx.send(Resource::Loading);

    match register(tx.clone()) {
        Ok(mut registration) => {
            metrics.record_subscription_opened();
            debug!(query = %query, key = %key, "live_query_attached");
            let key = key.to_string();
            LiveFeed::new(
                rx,
                Detach::new(move || {
                    registration.remove();
                    metrics.record_subscription_closed();
                    debug!(query = %query, key = %key, "live_query_detached");
                }),
            )
        }
        Err(e) => {
            metrics.record_subscription_setup_failure();
            let message = failure_message(&e);
            warn!(query = %query, key = %key, error = %e, "live_query_setup_failed");
            tx.send(Resource::Error(message));
            // Holding the sender keeps the feed open until cancelled
            LiveFeed::new(rx, Detach::new(move || drop(tx)))
        }
    }
}
