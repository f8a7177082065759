//! Integration tests for configuration loading

use ride_tracker::domain::GeoPoint;
use ride_tracker::infra::Config;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[location]
interval_ms = 2500

[presence]
title = "Sharing bus location"
unknown_text = "Waiting for GPS"

[store]
tracking_collection = "tracking_test"
users_collection = "users_test"

[service]
command_buffer = 4

[metrics]
interval_secs = 0

[simulation]
permission_granted = false
gps_enabled = false
vehicle = "ZG1234AB"
route = [[45.81, 15.98], [45.82, 15.99]]
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.location_interval(), Duration::from_millis(2500));
    assert_eq!(config.presence_title(), "Sharing bus location");
    assert_eq!(config.presence_unknown_text(), "Waiting for GPS");
    assert_eq!(config.tracking_collection(), "tracking_test");
    assert_eq!(config.users_collection(), "users_test");
    assert_eq!(config.command_buffer(), 4);
    assert_eq!(config.metrics_interval_secs(), 0);
    assert!(!config.sim_permission_granted());
    assert!(!config.sim_gps_enabled());
    assert!(config.sim_network_enabled());
    assert_eq!(config.sim_vehicle(), "ZG1234AB");
    assert_eq!(config.sim_route(), &[GeoPoint::new(45.81, 15.98), GeoPoint::new(45.82, 15.99)]);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_invalid_file_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[location]\ninterval_ms = \"soon\"\n").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.location_interval_ms(), 5000);
    assert_eq!(config.tracking_collection(), "tracking");
    assert_eq!(config.presence_unknown_text(), "Location unknown");
    assert_eq!(config.config_file(), "default");
}
