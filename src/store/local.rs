use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppResult;
use crate::platform::LocalStore;
use crate::store::models::DeviceRegistration;

const KEY_DEVICE_ID: &str = "deviceId";
const KEY_PUSH_TOKEN: &str = "pushToken";
const KEY_SUBSCRIBED: &str = "subscribedToAlerts";

/// Typed access to the device registration kept in the durable local
/// key-value store. Only single-key atomicity is assumed of the backend.
#[derive(Clone)]
pub struct DeviceStore {
    store: Arc<dyn LocalStore>,
}

impl DeviceStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        DeviceStore { store }
    }

    pub async fn device_id(&self) -> AppResult<Option<String>> {
        self.store.get(KEY_DEVICE_ID).await
    }

    /// Return the device id, generating and persisting one on first use.
    ///
    /// Ids come from the OS random source via UUIDv4, so collisions across
    /// installations are negligible. The id is persisted before being
    /// returned so the first remote write already uses a durable key.
    pub async fn ensure_device_id(&self) -> AppResult<String> {
        if let Some(id) = self.store.get(KEY_DEVICE_ID).await? {
            return Ok(id);
        }
        let id = format!("device_{}", Uuid::new_v4().simple());
        self.store.set(KEY_DEVICE_ID, &id).await?;
        Ok(id)
    }

    pub async fn push_token(&self) -> AppResult<Option<String>> {
        self.store.get(KEY_PUSH_TOKEN).await
    }

    pub async fn store_push_token(&self, token: &str) -> AppResult<()> {
        self.store.set(KEY_PUSH_TOKEN, token).await
    }

    pub async fn subscribed(&self) -> AppResult<bool> {
        Ok(self
            .store
            .get(KEY_SUBSCRIBED)
            .await?
            .map(|v| v == "true")
            .unwrap_or(false))
    }

    pub async fn set_subscribed(&self, subscribed: bool) -> AppResult<()> {
        self.store
            .set(KEY_SUBSCRIBED, if subscribed { "true" } else { "false" })
            .await
    }

    /// Snapshot of the whole registration, absent until a device id exists.
    pub async fn registration(&self) -> AppResult<Option<DeviceRegistration>> {
        let device_id = match self.device_id().await? {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(Some(DeviceRegistration {
            device_id,
            push_token: self.push_token().await?,
            subscribed: self.subscribed().await?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::MemoryStore;

    #[tokio::test]
    async fn device_id_is_generated_once() {
        let device = DeviceStore::new(Arc::new(MemoryStore::new()));

        assert_eq!(device.device_id().await.unwrap(), None);
        let first = device.ensure_device_id().await.unwrap();
        assert!(first.starts_with("device_"));

        let second = device.ensure_device_id().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn registration_snapshot() {
        let device = DeviceStore::new(Arc::new(MemoryStore::new()));
        assert!(device.registration().await.unwrap().is_none());

        let id = device.ensure_device_id().await.unwrap();
        device.store_push_token("tok-1").await.unwrap();
        device.set_subscribed(true).await.unwrap();

        let reg = device.registration().await.unwrap().unwrap();
        assert_eq!(reg.device_id, id);
        assert_eq!(reg.push_token.as_deref(), Some("tok-1"));
        assert!(reg.subscribed);
    }
}
