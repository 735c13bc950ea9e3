use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::platform::{ChannelSpec, NotificationPlatform, PermissionState, TokenScope};
use crate::store::DeviceStore;

/// Negotiates notification permission and obtains the device push token.
///
/// Ordering is fixed: channel setup, then permission resolution, then token
/// acquisition, then local persistence. A denied permission is terminal for
/// the session; the registrar never prompts twice.
pub struct DeviceRegistrar {
    platform: Arc<dyn NotificationPlatform>,
    device: DeviceStore,
    channel: ChannelSpec,
    project_id: Option<String>,
    prompted: AtomicBool,
}

impl DeviceRegistrar {
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        device: DeviceStore,
        config: &Config,
    ) -> Self {
        DeviceRegistrar {
            platform,
            device,
            channel: ChannelSpec::from(&config.channel),
            project_id: config.push.project_id.clone(),
            prompted: AtomicBool::new(false),
        }
    }

    /// Register for push notifications and return the platform token.
    pub async fn register(&self) -> AppResult<String> {
        // Safe to call every launch; the platform treats it as a no-op when
        // the channel already exists.
        if let Err(e) = self.platform.create_channel(&self.channel).await {
            warn!("failed to ensure notification channel {}: {}", self.channel.id, e);
        }

        if !self.platform.is_physical_device() {
            info!("push registration skipped: not a physical device");
            return Err(AppError::UnsupportedDevice);
        }

        let mut status = self.platform.permission_state().await;
        if status != PermissionState::Granted {
            if self.prompted.swap(true, Ordering::SeqCst) {
                // Already prompted this session; do not ask again.
                return Err(AppError::PermissionDenied);
            }
            status = self.platform.request_permission().await;
        }
        if status != PermissionState::Granted {
            return Err(AppError::PermissionDenied);
        }

        let token = self.issue_token().await?;

        // Local persistence is a cache: the token is re-derivable from the
        // platform next launch, so a failed write only warrants a warning.
        if let Err(e) = self.device.store_push_token(&token).await {
            warn!("failed to persist push token locally: {}", e);
        }

        Ok(token)
    }

    /// Prefer project-scoped issuance, falling back to an unscoped request
    /// when the build lacks project configuration.
    async fn issue_token(&self) -> AppResult<String> {
        if let Some(project_id) = &self.project_id {
            match self
                .platform
                .issue_token(TokenScope::Project(project_id.clone()))
                .await
            {
                Ok(token) => return Ok(token),
                Err(e) => {
                    warn!(
                        "project-scoped token issuance failed ({}), retrying unscoped",
                        e
                    );
                }
            }
        }
        self.platform.issue_token(TokenScope::Unscoped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryPlatform, MemoryStore};

    fn registrar_with(platform: Arc<MemoryPlatform>) -> (DeviceRegistrar, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let device = DeviceStore::new(store.clone());
        let registrar = DeviceRegistrar::new(platform, device, &Config::default());
        (registrar, store)
    }

    #[tokio::test]
    async fn registers_and_persists_token() {
        let platform = Arc::new(MemoryPlatform::new());
        let (registrar, store) = registrar_with(platform.clone());

        let token = registrar.register().await.unwrap();
        assert_eq!(token, "ExponentPushToken[mem-device]");

        let device = DeviceStore::new(store);
        assert_eq!(device.push_token().await.unwrap(), Some(token));
        assert_eq!(platform.created_channels().len(), 1);
    }

    #[tokio::test]
    async fn channel_creation_is_idempotent_across_launches() {
        let platform = Arc::new(MemoryPlatform::new());
        let (registrar, _) = registrar_with(platform.clone());

        registrar.register().await.unwrap();
        registrar.register().await.unwrap();
        assert_eq!(platform.created_channels().len(), 1);
    }

    #[tokio::test]
    async fn simulator_fails_fast_without_token_request() {
        let platform = Arc::new(MemoryPlatform::simulator());
        let (registrar, _) = registrar_with(platform.clone());

        let err = registrar.register().await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedDevice));
        assert!(platform.token_requests().is_empty());
        assert_eq!(platform.prompt_count(), 0);
    }

    #[tokio::test]
    async fn prompts_once_then_denial_is_terminal() {
        let platform = Arc::new(
            MemoryPlatform::new()
                .with_permission(PermissionState::Undetermined)
                .denying_requests(),
        );
        let (registrar, _) = registrar_with(platform.clone());

        let first = registrar.register().await.unwrap_err();
        assert!(matches!(first, AppError::PermissionDenied));
        assert_eq!(platform.prompt_count(), 1);

        // Second attempt in the same session must not re-prompt.
        let second = registrar.register().await.unwrap_err();
        assert!(matches!(second, AppError::PermissionDenied));
        assert_eq!(platform.prompt_count(), 1);
    }

    #[tokio::test]
    async fn denied_state_is_prompted_and_can_recover() {
        // The platform remembers a past denial, but the user grants when
        // asked again this session.
        let platform = Arc::new(MemoryPlatform::new().with_permission(PermissionState::Denied));
        let (registrar, _) = registrar_with(platform.clone());

        let token = registrar.register().await.unwrap();
        assert_eq!(token, "ExponentPushToken[mem-device]");
        assert_eq!(platform.prompt_count(), 1);

        // Permission is granted now; no further prompts.
        registrar.register().await.unwrap();
        assert_eq!(platform.prompt_count(), 1);
    }

    #[tokio::test]
    async fn granted_permission_skips_prompt() {
        let platform = Arc::new(MemoryPlatform::new());
        let (registrar, _) = registrar_with(platform.clone());

        registrar.register().await.unwrap();
        assert_eq!(platform.prompt_count(), 0);
    }

    #[tokio::test]
    async fn project_scope_falls_back_to_unscoped() {
        let platform = Arc::new(MemoryPlatform::new().failing_project_scope());
        let store = Arc::new(MemoryStore::new());
        let device = DeviceStore::new(store);
        let config = Config {
            push: crate::config::PushConfig {
                project_id: Some("proj-1".to_string()),
                platform: "android".to_string(),
            },
            ..Config::default()
        };
        let registrar = DeviceRegistrar::new(platform.clone(), device, &config);

        let token = registrar.register().await.unwrap();
        assert_eq!(token, "ExponentPushToken[mem-device]");

        let requests = platform.token_requests();
        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[0], TokenScope::Project(_)));
        assert_eq!(requests[1], TokenScope::Unscoped);
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_token() {
        let platform = Arc::new(MemoryPlatform::new());
        let store = Arc::new(MemoryStore::new());
        store.fail_writes();
        let device = DeviceStore::new(store);
        let registrar = DeviceRegistrar::new(platform, device, &Config::default());

        let token = registrar.register().await.unwrap();
        assert_eq!(token, "ExponentPushToken[mem-device]");
    }
}
