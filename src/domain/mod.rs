//! Domain models - value types shared by publishers and observers
//!
//! - `types` - `VehicleId`, `GeoPoint`, `LocationSample`, coordinate formatting
//! - `resource` - `Resource<T>`, the Loading / Success / Error feed state
//! - `profile` - `UserRole`, `UserProfile` and role dispatch

pub mod profile;
pub mod resource;
pub mod types;

// Re-export commonly used types at module level
pub use profile::{UserProfile, UserRole};
pub use resource::Resource;
pub use types::{GeoPoint, LocationSample, VehicleId};
