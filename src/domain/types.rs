//! Shared value types for location tracking

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// RFC 3339 rendering of an epoch-ms instant, for logs
pub fn format_epoch_ms(ms: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| ms.to_string())
}

/// Human-readable coordinate pair, e.g. `10.0º N, 20.5º E`
///
/// Coordinates are printed as-is: the hemisphere letters are fixed and the
/// sign of the value is kept. `{:?}` keeps the trailing `.0` on whole
/// degrees; very small or large magnitudes come out in Rust's exponent form
/// (`1e-7`), which real coordinates never reach.
pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{:?}º N, {:?}º E", latitude, longitude)
}

/// Shared key linking one driver to any number of observing parents
///
/// Opaque: compared by string equality only, never format-checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(plates: impl Into<String>) -> Self {
        Self(plates.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier cannot address a record
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VehicleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Backend-resident geographic point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_coordinates(self.latitude, self.longitude))
    }
}

/// One position fix, produced once per acquisition tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Acquisition instant (epoch ms)
    pub timestamp_ms: u64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, timestamp_ms: epoch_ms() }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn to_formatted_string(&self) -> String {
        format_coordinates(self.latitude, self.longitude)
    }

    pub fn acquired_at(&self) -> String {
        format_epoch_ms(self.timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_coordinates() {
        assert_eq!(format_coordinates(10.0, 20.0), "10.0º N, 20.0º E");
        assert_eq!(format_coordinates(10.1, -20.25), "10.1º N, -20.25º E");
        assert_eq!(format_coordinates(1e-7, 0.0), "1e-7º N, 0.0º E");
    }

    #[test]
    fn test_sample_and_point_format_match() {
        let sample = LocationSample::new(45.5, 12.25);
        assert_eq!(sample.to_formatted_string(), sample.point().to_string());
        assert!(sample.timestamp_ms > 0);
    }

    #[test]
    fn test_vehicle_id_blank() {
        assert!(VehicleId::new("").is_blank());
        assert!(VehicleId::new("   ").is_blank());
        assert!(!VehicleId::new("ABC123").is_blank());
        assert_eq!(VehicleId::from("ABC123"), VehicleId::new("ABC123".to_string()));
    }

    #[test]
    fn test_format_epoch_ms() {
        assert_eq!(format_epoch_ms(0), "1970-01-01T00:00:00Z");
        assert!(format_epoch_ms(1_700_000_000_000).starts_with("2023-11-14T22:13:20"));
    }

    #[test]
    fn test_geo_point_serde_shape() {
        let json = serde_json::to_value(GeoPoint::new(1.5, 2.5)).unwrap();
        assert_eq!(json, serde_json::json!({ "latitude": 1.5, "longitude": 2.5 }));
    }
}
