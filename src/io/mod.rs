//! IO modules - external system interfaces
//!
//! - `feed` - Cancellable push streams with exactly-once teardown
//! - `location` - Platform location seam and the acquisition client
//! - `simulated` - Route replay and manually driven location providers
//! - `backend` - Real-time document database abstraction
//! - `memory` - In-memory document backend with fault injection

pub mod backend;
pub mod feed;
pub mod location;
pub mod memory;
pub mod simulated;

// Re-export commonly used types
pub use backend::{DocumentBackend, DocumentSnapshot, FieldFilter, ListenerRegistration, WriteMode};
pub use feed::{Detach, LiveFeed};
pub use location::{LocationClient, LocationProvider, LocationStream, ProviderKind};
pub use memory::MemoryBackend;
pub use simulated::{ManualLocationProvider, SimulatedLocationProvider};
