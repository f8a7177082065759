//! User profile store
//!
//! Profiles live in the users collection keyed by user id. The only link
//! between a parent and a driver is the `vehiclePlates` field both carry.

use crate::domain::profile::{StoredProfile, UserProfile, UserRole};
use crate::domain::Resource;
use crate::error::BackendError;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::backend::{Document, DocumentBackend, FieldFilter, QuerySnapshot, WriteMode};
use crate::io::feed::LiveFeed;
use crate::services::live_query::{open_live_query, report_listener_failure, NOT_FOUND};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const PLATES_FIELD: &str = "vehiclePlates";
const ROLE_FIELD: &str = "userType";

pub struct UsersRepository {
    backend: Arc<dyn DocumentBackend>,
    collection: String,
    metrics: Arc<Metrics>,
}

fn decode(doc: Document) -> Option<UserProfile> {
    match serde_json::from_value::<StoredProfile>(Value::Object(doc)) {
        Ok(stored) => stored.into_profile(),
        Err(e) => {
            debug!(error = %e, "profile_decode_failed");
            None
        }
    }
}

fn encode(profile: &UserProfile) -> Option<Document> {
    match serde_json::to_value(StoredProfile::from(profile)) {
        Ok(Value::Object(doc)) => Some(doc),
        Ok(_) => None,
        Err(e) => {
            warn!(user_id = %profile.id, error = %e, "profile_encode_failed");
            None
        }
    }
}

/// First decodable driver in a query result
fn driver_from_snapshot(snapshot: QuerySnapshot) -> Resource<UserProfile> {
    snapshot
        .documents
        .into_iter()
        .filter_map(|doc| doc.data.and_then(decode))
        .next()
        .map_or_else(|| Resource::error(NOT_FOUND), Resource::Success)
}

impl UsersRepository {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        collection: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { backend, collection: collection.into(), metrics }
    }

    pub fn from_config(
        backend: Arc<dyn DocumentBackend>,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::new(backend, config.users_collection(), metrics)
    }

    /// Load a profile; `None` when missing or not a valid profile
    pub async fn get_user_data(&self, user_id: &str) -> Result<Option<UserProfile>, BackendError> {
        let doc = self.backend.get(&self.collection, user_id).await?;
        Ok(doc.and_then(decode))
    }

    /// Create a profile document
    pub async fn add_user_data(&self, profile: &UserProfile) -> bool {
        self.write_profile(profile, "profile_added").await
    }

    /// Replace a profile document
    pub async fn edit_user_data(&self, profile: &UserProfile) -> bool {
        self.write_profile(profile, "profile_edited").await
    }

    async fn write_profile(&self, profile: &UserProfile, event: &'static str) -> bool {
        let Some(doc) = encode(profile) else {
            return false;
        };
        match self.backend.set(&self.collection, &profile.id, doc, WriteMode::Overwrite).await {
            Ok(()) => {
                info!(user_id = %profile.id, role = %profile.role, event = %event, "profile_written");
                true
            }
            Err(e) => {
                warn!(user_id = %profile.id, error = %e, event = %event, "profile_write_failed");
                false
            }
        }
    }

    /// Link a user to a vehicle; the profile must already exist
    pub async fn set_vehicle_plates(&self, user_id: &str, plates: &str) -> bool {
        let mut fields = Document::new();
        fields.insert(PLATES_FIELD.to_string(), Value::String(plates.to_string()));

        match self.backend.update(&self.collection, user_id, fields).await {
            Ok(()) => {
                info!(user_id = %user_id, plates = %plates, "vehicle_plates_set");
                true
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "vehicle_plates_set_failed");
                false
            }
        }
    }

    /// Live lookup of the driver registered for `plates`
    pub fn driver_feed(&self, plates: &str) -> LiveFeed<Resource<UserProfile>> {
        let metrics = self.metrics.clone();
        let key = plates.to_string();
        let filters = vec![
            FieldFilter::eq(PLATES_FIELD, plates),
            FieldFilter::eq(ROLE_FIELD, UserRole::Driver.as_str()),
        ];

        open_live_query("driver_by_plates", plates, self.metrics.clone(), |tx| {
            self.backend.add_query_listener(
                &self.collection,
                filters,
                Box::new(move |event: Result<QuerySnapshot, BackendError>| {
                    let item = match event {
                        Ok(snapshot) => driver_from_snapshot(snapshot),
                        Err(e) => Resource::Error(report_listener_failure(
                            &metrics,
                            "driver_by_plates",
                            &key,
                            &e,
                        )),
                    };
                    tx.send(item);
                }),
            )
        })
    }
}
