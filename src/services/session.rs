//! Session-driven auto start
//!
//! On launch, a signed-in driver resumes publishing for the vehicle on their
//! profile. Parents never publish.

use crate::domain::profile::publishes_location;
use crate::domain::types::VehicleId;
use crate::error::{BackendError, StartError};
use crate::services::tracking_service::TrackingServiceHandle;
use crate::services::users_repo::UsersRepository;
use tracing::{info, warn};

/// Identity source; authentication happens elsewhere
pub trait SessionProvider: Send + Sync {
    fn has_active_session(&self) -> bool;

    /// Id of the signed-in user; empty when signed out
    fn current_user_id(&self) -> String;
}

/// Fixed identity, for the demo binary and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user_id: Option<String>,
}

impl StaticSession {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()) }
    }

    pub fn signed_out() -> Self {
        Self { user_id: None }
    }
}

impl SessionProvider for StaticSession {
    fn has_active_session(&self) -> bool {
        self.user_id.is_some()
    }

    fn current_user_id(&self) -> String {
        self.user_id.clone().unwrap_or_default()
    }
}

/// What `auto_start` decided
#[derive(Debug, Clone, PartialEq)]
pub enum AutoStart {
    NoSession,
    ProfileMissing,
    ProfileUnavailable(BackendError),
    /// The user only observes
    Observer,
    /// Driver without a linked vehicle
    NoVehicle,
    Started(VehicleId),
    Failed(StartError),
}

pub async fn auto_start(
    session: &dyn SessionProvider,
    users: &UsersRepository,
    service: &TrackingServiceHandle,
) -> AutoStart {
    if !session.has_active_session() {
        return AutoStart::NoSession;
    }
    let user_id = session.current_user_id();

    let profile = match users.get_user_data(&user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            warn!(user_id = %user_id, "auto_start_profile_missing");
            return AutoStart::ProfileMissing;
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "auto_start_profile_unavailable");
            return AutoStart::ProfileUnavailable(e);
        }
    };

    if !publishes_location(profile.role) {
        info!(user_id = %user_id, role = %profile.role, "auto_start_observer");
        return AutoStart::Observer;
    }
    let Some(vehicle) = profile.vehicle() else {
        info!(user_id = %user_id, "auto_start_no_vehicle");
        return AutoStart::NoVehicle;
    };

    match service.start(vehicle.clone()).await {
        Ok(()) => {
            info!(user_id = %user_id, vehicle = %vehicle, "auto_start_tracking");
            AutoStart::Started(vehicle)
        }
        Err(e) => {
            warn!(user_id = %user_id, vehicle = %vehicle, error = %e, "auto_start_failed");
            AutoStart::Failed(e)
        }
    }
}
