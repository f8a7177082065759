//! User profile and role model
//!
//! Profiles are stored as loosely-typed documents (every field defaults to an
//! empty string). `StoredProfile` is that wire shape; `UserProfile` is the
//! validated form the rest of the crate works with.

use crate::domain::types::VehicleId;
use serde::{Deserialize, Serialize};

/// Which side of the tracking relationship a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserRole {
    Parent,
    Driver,
}

impl UserRole {
    /// Stored representation ("PARENT" / "DRIVER")
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Parent => "PARENT",
            UserRole::Driver => "DRIVER",
        }
    }

    /// Display label ("Parent" / "Driver")
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Parent => "Parent",
            UserRole::Driver => "Driver",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PARENT" => Some(UserRole::Parent),
            "DRIVER" => Some(UserRole::Driver),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Drivers publish their own position
pub fn publishes_location(role: UserRole) -> bool {
    matches!(role, UserRole::Driver)
}

/// Both roles can watch a vehicle: parents the one they follow, drivers their own
pub fn observes_location(role: UserRole) -> bool {
    match role {
        UserRole::Parent | UserRole::Driver => true,
    }
}

/// Validated user profile
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub role: UserRole,
    pub photo_url: String,
    pub vehicle_plates: String,
}

impl UserProfile {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        surname: impl Into<String>,
        email: impl Into<String>,
        role: UserRole,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            surname: surname.into(),
            email: email.into(),
            role,
            photo_url: String::new(),
            vehicle_plates: String::new(),
        }
    }

    pub fn with_vehicle_plates(mut self, plates: impl Into<String>) -> Self {
        self.vehicle_plates = plates.into();
        self
    }

    /// Vehicle this user is linked to, if any
    pub fn vehicle(&self) -> Option<VehicleId> {
        let id = VehicleId::new(self.vehicle_plates.clone());
        (!id.is_blank()).then_some(id)
    }
}

/// Profile document as persisted in the users collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredProfile {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub user_type: String,
    pub photo_url: String,
    pub vehicle_plates: String,
}

impl StoredProfile {
    /// Validate into a `UserProfile`; blank ids and unknown roles are rejected
    pub fn into_profile(self) -> Option<UserProfile> {
        if self.id.trim().is_empty() {
            return None;
        }
        let role = UserRole::parse(&self.user_type)?;
        Some(UserProfile {
            id: self.id,
            name: self.name,
            surname: self.surname,
            email: self.email,
            role,
            photo_url: self.photo_url,
            vehicle_plates: self.vehicle_plates,
        })
    }
}

impl From<&UserProfile> for StoredProfile {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            surname: profile.surname.clone(),
            email: profile.email.clone(),
            user_type: profile.role.as_str().to_string(),
            photo_url: profile.photo_url.clone(),
            vehicle_plates: profile.vehicle_plates.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_strings() {
        assert_eq!(UserRole::parse("DRIVER"), Some(UserRole::Driver));
        assert_eq!(UserRole::parse("PARENT"), Some(UserRole::Parent));
        assert_eq!(UserRole::parse("driver"), None);
        assert_eq!(UserRole::Driver.label(), "Driver");
        assert_eq!(UserRole::Parent.to_string(), "Parent");
    }

    #[test]
    fn test_role_dispatch() {
        assert!(publishes_location(UserRole::Driver));
        assert!(!publishes_location(UserRole::Parent));
        assert!(observes_location(UserRole::Parent));
    }

    #[test]
    fn test_stored_profile_validation() {
        let stored = StoredProfile {
            id: "u1".into(),
            user_type: "DRIVER".into(),
            vehicle_plates: "ABC123".into(),
            ..Default::default()
        };
        let profile = stored.clone().into_profile().unwrap();
        assert_eq!(profile.role, UserRole::Driver);
        assert_eq!(profile.vehicle(), Some(VehicleId::new("ABC123")));

        let blank_id = StoredProfile { id: " ".into(), ..stored.clone() };
        assert!(blank_id.into_profile().is_none());

        let bad_role = StoredProfile { user_type: "ADMIN".into(), ..stored };
        assert!(bad_role.into_profile().is_none());
    }

    #[test]
    fn test_stored_profile_camel_case() {
        let profile = UserProfile::new("u2", "Ana", "Kos", "ana@example.com", UserRole::Parent)
            .with_vehicle_plates("XYZ999");
        let json = serde_json::to_value(StoredProfile::from(&profile)).unwrap();
        assert_eq!(json["userType"], "PARENT");
        assert_eq!(json["vehiclePlates"], "XYZ999");
        assert_eq!(json["photoUrl"], "");
    }

    #[test]
    fn test_missing_plates_is_no_vehicle() {
        let profile = UserProfile::new("u3", "B", "C", "d@e.f", UserRole::Driver);
        assert!(profile.vehicle().is_none());
    }
}
