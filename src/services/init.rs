//! Startup wiring for the alert pipeline:
//! - constructs the services over the supplied collaborators
//! - applies the process-wide foreground notification policy
//! - starts the notification router
//! - re-syncs the remote subscription after a possible token refresh
//!
//! Registration failures at startup are logged, never fatal: a denied
//! permission must not prevent the app from browsing alerts.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::config::Config;
use crate::platform::{
    DocumentStore, EventSource, ForegroundPolicy, LocalStore, NotificationPlatform,
};
use crate::services::alerts::AlertRepository;
use crate::services::demo::DemoFeed;
use crate::services::registrar::DeviceRegistrar;
use crate::services::router::{NotificationRouter, RouterGuard};
use crate::services::subscriptions::SubscriptionManager;
use crate::store::models::NotificationEvent;
use crate::store::DeviceStore;

/// The assembled core: every service the presentation layer talks to.
pub struct Core {
    pub device: DeviceStore,
    pub registrar: Arc<DeviceRegistrar>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub alerts: Arc<AlertRepository>,
    pub router: Arc<NotificationRouter>,
    pub demo: Arc<DemoFeed>,
    events: Arc<dyn EventSource>,
}

impl Core {
    pub fn build(
        platform: Arc<dyn NotificationPlatform>,
        local: Arc<dyn LocalStore>,
        docs: Arc<dyn DocumentStore>,
        events: Arc<dyn EventSource>,
        config: &Config,
    ) -> Self {
        let device = DeviceStore::new(local);
        let registrar = Arc::new(DeviceRegistrar::new(
            platform.clone(),
            device.clone(),
            config,
        ));
        let subscriptions = Arc::new(SubscriptionManager::new(
            docs.clone(),
            device.clone(),
            registrar.clone(),
            config,
        ));
        let alerts = Arc::new(AlertRepository::new(docs.clone(), config));
        let router = Arc::new(NotificationRouter::new(events.clone()));
        let demo = Arc::new(DemoFeed::new(platform, docs, config));

        Core {
            device,
            registrar,
            subscriptions,
            alerts,
            router,
            demo,
            events,
        }
    }
}

/// Run the once-at-startup sequence. Returns the router guard (keep it alive
/// for the session) and the tap that caused a cold start, if any.
pub async fn initialize<F>(core: &Core, on_tap: F) -> (RouterGuard, Option<NotificationEvent>)
where
    F: Fn(String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    core.events
        .set_foreground_policy(&ForegroundPolicy::default());
    let guard = core.router.start(on_tap);

    sync_registration(core).await;

    let cold_start = core.router.last_tapped();
    if cold_start.is_some() {
        info!("process was launched by a notification tap");
    }

    (guard, cold_start)
}

/// Register with the platform and, if this device was already subscribed,
/// re-sync the remote record so a refreshed token is picked up.
async fn sync_registration(core: &Core) {
    let token = match core.registrar.register().await {
        Ok(token) => token,
        Err(e) if e.is_terminal() => {
            info!("push registration unavailable: {}", e);
            return;
        }
        Err(e) => {
            warn!("push registration failed: {}", e);
            return;
        }
    };

    let subscribed = core.device.subscribed().await.unwrap_or(false);
    if subscribed {
        if let Err(e) = core.subscriptions.subscribe(Some(token)).await {
            warn!("failed to re-sync subscription at startup: {}", e);
        }
    }
}
