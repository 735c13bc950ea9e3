use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::platform::{DocumentStore, SERVER_TIMESTAMP};
use crate::services::registrar::DeviceRegistrar;
use crate::store::DeviceStore;

/// Maintains the remote subscription record for this device.
///
/// The record is keyed by device id and written with merge semantics, so
/// every write is an idempotent upsert: subscribing twice with the same
/// token leaves the record unchanged, and unsubscribing never erases the
/// stored token.
pub struct SubscriptionManager {
    docs: Arc<dyn DocumentStore>,
    device: DeviceStore,
    registrar: Arc<DeviceRegistrar>,
    users_collection: String,
    platform_name: String,
    // Subscription writes from this device serialize; last write wins.
    write_lock: Mutex<()>,
}

impl SubscriptionManager {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        device: DeviceStore,
        registrar: Arc<DeviceRegistrar>,
        config: &Config,
    ) -> Self {
        SubscriptionManager {
            docs,
            device,
            registrar,
            users_collection: config.remote.users_collection.clone(),
            platform_name: config.push.platform.clone(),
            write_lock: Mutex::new(()),
        }
    }

    /// Subscribe this device to alerts. With no token, registration runs
    /// first and its failure propagates unchanged.
    pub async fn subscribe(&self, token: Option<String>) -> AppResult<()> {
        let token = match token {
            Some(token) => token,
            None => self.registrar.register().await?,
        };

        let _guard = self.write_lock.lock().await;

        let device_id = self.device.ensure_device_id().await?;
        self.docs
            .upsert(
                &self.users_collection,
                &device_id,
                json!({
                    "expoPushToken": token,
                    "subscribedToAlerts": true,
                    "platform": self.platform_name,
                    "updatedAt": SERVER_TIMESTAMP,
                }),
            )
            .await?;

        // The remote record is the source of truth; the local copy is a
        // cache and a failed refresh only warrants a warning.
        if let Err(e) = self.device.store_push_token(&token).await {
            warn!("failed to cache push token locally: {}", e);
        }
        if let Err(e) = self.device.set_subscribed(true).await {
            warn!("failed to cache subscription flag locally: {}", e);
        }

        info!("device {} subscribed to alerts", device_id);
        Ok(())
    }

    /// Unsubscribe this device. Without a device id there is nothing to
    /// undo and `NotRegistered` is returned. The stored token is preserved
    /// so a later re-subscribe needs no re-registration.
    pub async fn unsubscribe(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        let device_id = self
            .device
            .device_id()
            .await?
            .ok_or(AppError::NotRegistered)?;

        self.docs
            .upsert(
                &self.users_collection,
                &device_id,
                json!({
                    "subscribedToAlerts": false,
                    "updatedAt": SERVER_TIMESTAMP,
                }),
            )
            .await?;

        if let Err(e) = self.device.set_subscribed(false).await {
            warn!("failed to cache subscription flag locally: {}", e);
        }

        info!("device {} unsubscribed from alerts", device_id);
        Ok(())
    }
}
