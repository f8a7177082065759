//! Error types shared across layers

/// Terminal failures of a location acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission not granted!")]
    PermissionDenied,

    #[error("GPS is disabled!")]
    ProviderUnavailable,
}

/// Failures reported by a document backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    /// Reported to an already-registered listener
    #[error("{0}")]
    Listener(String),

    /// Raised while registering a listener
    #[error("listener registration failed: {0}")]
    Registration(String),
}

/// Reasons `TrackingServiceHandle::start` can fail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    #[error("vehicle identifier is blank")]
    BlankVehicle,

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("tracking service is not running")]
    ServiceGone,
}
