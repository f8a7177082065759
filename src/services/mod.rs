//! Services - business logic and state management
//!
//! - `tracking_repo` - Tracking store (merge writes, live location feeds)
//! - `users_repo` - User profiles and driver lookup by plates
//! - `publisher` - Acquisition samples to store writes and display strings
//! - `subscriber` - Observer-side location feeds
//! - `tracking_service` - Background start/stop lifecycle
//! - `session` - Auto start from the signed-in profile
//! - `live_query` - Listener-to-feed plumbing shared by the repositories

pub mod live_query;
pub mod publisher;
pub mod session;
pub mod subscriber;
pub mod tracking_repo;
pub mod tracking_service;
pub mod users_repo;

// Re-export commonly used types
pub use publisher::{PublishedLocation, TrackingPublisher};
pub use session::{auto_start, AutoStart, SessionProvider, StaticSession};
pub use subscriber::{LocationFeed, TrackingSubscriber};
pub use tracking_repo::{TrackingRepository, TrackingStore};
pub use tracking_service::{
    create_tracking_service, ForegroundPresence, LogPresence, PresencePayload, ServiceState,
    TrackedLocation, TrackingService, TrackingServiceHandle,
};
pub use users_repo::UsersRepository;
