use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amber_alerts::platform::memory::{MemoryDocs, MemoryEvents, MemoryPlatform, MemoryStore};
use amber_alerts::services::init;
use amber_alerts::{Config, Core};

/// Simulation driver: runs the whole pipeline against in-memory
/// collaborators. Scheduled demo notifications are "tapped" automatically so
/// the router path is exercised end-to-end without a backend.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amber_alerts=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Amber Alerts simulation");

    let platform = Arc::new(MemoryPlatform::new());
    let local = Arc::new(MemoryStore::new());
    let docs = Arc::new(MemoryDocs::new());
    let events = Arc::new(MemoryEvents::new());

    let core = Core::build(
        platform.clone(),
        local,
        docs,
        events.clone(),
        &config,
    );

    let alerts = core.alerts.clone();
    let on_tap = move |alert_id: String| -> BoxFuture<'static, ()> {
        let alerts = alerts.clone();
        Box::pin(async move {
            match alerts.get_by_id(&alert_id).await {
                Some(alert) => tracing::info!(
                    "tapped alert {}: {} missing near {}",
                    alert.id,
                    alert.subject_name,
                    alert.location
                ),
                None => tracing::info!("tapped alert {} is no longer available", alert_id),
            }
        })
    };
    let (mut guard, cold_start) = init::initialize(&core, on_tap).await;

    if let Some(event) = cold_start {
        tracing::info!("cold start from notification: {:?}", event.alert_id());
    }

    if config.demo.enabled {
        core.demo.enable();
    } else {
        tracing::info!("demo feed disabled; set DEMO_FEED_ENABLED=true to generate alerts");
    }

    // Pump scheduled local notifications back in as taps, standing in for
    // the user tapping each demo notification.
    let pump = {
        let platform = platform.clone();
        let events = events.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                for scheduled in platform.take_scheduled() {
                    tokio::time::sleep(scheduled.delay).await;
                    tracing::debug!("delivering scheduled notification: {}", scheduled.title);
                    events.emit_received(scheduled.payload.clone());
                    events.emit_tapped(scheduled.payload);
                }
            }
        })
    };

    let recent = core.alerts.list_recent(config.alerts.default_list_limit).await;
    tracing::info!("{} recent alert(s) at startup", recent.len());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    core.demo.disable();
    pump.abort();
    guard.stop();

    tracing::info!("Shutdown complete");
    Ok(())
}
