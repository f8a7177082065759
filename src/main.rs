//! Ride tracker - driver/parent location sharing demo
//!
//! Runs both roles in one process against the in-memory backend: a driver
//! publishes a simulated route, a parent watches the same vehicle.
//!
//! Module structure:
//! - `domain/` - Core types (VehicleId, GeoPoint, Resource, profiles)
//! - `io/` - External interfaces (location providers, document backend)
//! - `services/` - Business logic (repositories, publisher, subscriber, service)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use futures::StreamExt;
use ride_tracker::domain::{Resource, UserProfile, UserRole};
use ride_tracker::infra::{Config, Metrics};
use ride_tracker::io::{LocationClient, MemoryBackend, ProviderKind, SimulatedLocationProvider};
use ride_tracker::services::{
    auto_start, create_tracking_service, LogPresence, StaticSession, TrackingPublisher,
    TrackingRepository, TrackingSubscriber, UsersRepository,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Ride tracker - real-time vehicle location sharing
#[derive(Parser, Debug)]
#[command(name = "ride-tracker", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml")]
    config: String,

    /// Vehicle plates to publish under (overrides the config)
    #[arg(long)]
    vehicle: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default: INFO, use RUST_LOG=debug for per-write visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "ride-tracker starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);
    let plates = args.vehicle.unwrap_or_else(|| config.sim_vehicle().to_string());

    info!(
        config_file = %config.config_file(),
        interval_ms = %config.location_interval_ms(),
        tracking_collection = %config.tracking_collection(),
        users_collection = %config.users_collection(),
        vehicle = %plates,
        route_points = %config.sim_route().len(),
        "config_loaded"
    );

    // Shared components
    let metrics = Arc::new(Metrics::new());
    let backend = Arc::new(MemoryBackend::new());
    let users = UsersRepository::from_config(backend.clone(), &config, metrics.clone());
    let store = Arc::new(TrackingRepository::from_config(backend, &config, metrics.clone()));

    let provider = SimulatedLocationProvider::new(config.sim_route().to_vec())
        .with_permission(config.sim_permission_granted())
        .with_provider(ProviderKind::Gps, config.sim_gps_enabled())
        .with_provider(ProviderKind::Network, config.sim_network_enabled());

    // Seed one driver and one parent sharing the vehicle
    let driver_id = Uuid::now_v7().to_string();
    let parent_id = Uuid::now_v7().to_string();
    let driver = UserProfile::new(&driver_id, "Demo", "Driver", "driver@example.com", UserRole::Driver)
        .with_vehicle_plates(&plates);
    let parent = UserProfile::new(&parent_id, "Demo", "Parent", "parent@example.com", UserRole::Parent)
        .with_vehicle_plates(&plates);
    if !users.add_user_data(&driver).await || !users.add_user_data(&parent).await {
        anyhow::bail!("failed to seed demo profiles");
    }

    // Tracking service (background lifecycle)
    let (service, worker) = create_tracking_service(
        LocationClient::new(Arc::new(provider)),
        TrackingPublisher::new(store.clone(), metrics.clone()),
        Arc::new(LogPresence),
        &config,
        metrics.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // Parent side: driver lookup and live location
    let mut driver_feed = users.driver_feed(&plates);
    tokio::spawn(async move {
        while let Some(update) = driver_feed.next().await {
            match update {
                Resource::Success(driver) => {
                    info!(name = %driver.name, surname = %driver.surname, "parent_driver_found")
                }
                Resource::Error(message) => warn!(error = %message, "parent_driver_lookup"),
                Resource::Loading => {}
            }
        }
    });

    let subscriber = TrackingSubscriber::new(store);
    if let Some(mut feed) = subscriber.observe_profile(&parent) {
        tokio::spawn(async move {
            while let Some(update) = feed.next().await {
                match &update {
                    Resource::Success(point) => info!(location = %point, "parent_location_update"),
                    Resource::Error(message) => warn!(error = %message, "parent_location_error"),
                    Resource::Loading => info!(state = %update.as_str(), "parent_location_update"),
                }
            }
        });
    }

    // Start metrics reporter
    let metrics_interval = config.metrics_interval_secs();
    if metrics_interval > 0 {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                metrics_clone.report().log();
            }
        });
    }

    // Driver side: resume tracking from the signed-in profile
    let outcome = auto_start(&StaticSession::signed_in(&driver_id), &users, &service).await;
    info!(outcome = ?outcome, "auto_start_done");

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");

    service.stop().await;
    service.shutdown();
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "tracking_service_join_failed");
    }

    metrics.report().log();
    info!("ride-tracker shutdown complete");
    Ok(())
}
