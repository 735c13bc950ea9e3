use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::platform::{DocumentStore, NotificationPlatform};

// Synthetic subjects for the simulation feed. Never shipped down the
// production delivery path.
const SAMPLE_SUBJECTS: &[&str] = &["Emily Carter", "Noah Reyes", "Ava Nguyen", "Liam Brooks"];
const SAMPLE_LOCATIONS: &[&str] = &[
    "Maple Street, Springfield",
    "Riverside Park, Fairview",
    "Oak Mall, Centerville",
    "Highway 9 rest stop",
];
const SAMPLE_DESCRIPTIONS: &[&str] = &[
    "Last seen wearing a red jacket and jeans.",
    "Believed to be travelling in a grey sedan.",
    "Left on foot heading north around noon.",
    "May be accompanied by an unknown adult.",
];

/// Produces a synthetic alert on a fixed period while enabled, writing it to
/// the alert store and scheduling a matching local notification so the tap
/// flow can be exercised end-to-end without a backend.
///
/// Simulation-only: not part of the production delivery path.
pub struct DemoFeed {
    platform: Arc<dyn NotificationPlatform>,
    docs: Arc<dyn DocumentStore>,
    collection: String,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DemoFeed {
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        docs: Arc<dyn DocumentStore>,
        config: &Config,
    ) -> Self {
        DemoFeed {
            platform,
            docs,
            collection: config.remote.alerts_collection.clone(),
            period: Duration::from_secs(config.demo.period_seconds),
            task: Mutex::new(None),
        }
    }

    /// Start the feed: one alert immediately, then one per period. No-op if
    /// already enabled.
    pub fn enable(&self) {
        let mut slot = self.task.lock().unwrap();
        if slot.is_some() {
            return;
        }

        info!("demo feed enabled, period {:?}", self.period);
        let platform = Arc::clone(&self.platform);
        let docs = Arc::clone(&self.docs);
        let collection = self.collection.clone();
        let period = self.period;

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                emit_synthetic_alert(&*platform, &*docs, &collection).await;
            }
        }));
    }

    /// Stop the feed. Synchronous and idempotent; no timer survives this.
    pub fn disable(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
            info!("demo feed disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }
}

impl Drop for DemoFeed {
    fn drop(&mut self) {
        self.disable();
    }
}

async fn emit_synthetic_alert(
    platform: &dyn NotificationPlatform,
    docs: &dyn DocumentStore,
    collection: &str,
) {
    let id = format!("demo_{}", Uuid::new_v4().simple());
    let (subject, location, description) = {
        let mut rng = rand::thread_rng();
        (
            SAMPLE_SUBJECTS[rng.gen_range(0..SAMPLE_SUBJECTS.len())],
            SAMPLE_LOCATIONS[rng.gen_range(0..SAMPLE_LOCATIONS.len())],
            SAMPLE_DESCRIPTIONS[rng.gen_range(0..SAMPLE_DESCRIPTIONS.len())],
        )
    };

    let fields = json!({
        "kind": "amber_alert",
        "subjectName": subject,
        "location": location,
        "description": description,
        "timestamp": Utc::now().to_rfc3339(),
        "demo": true,
    });

    if let Err(e) = docs.upsert(collection, &id, fields).await {
        warn!("demo feed failed to write alert {}: {}", id, e);
        return;
    }

    // Mirror the real delivery path: the scheduled notification carries the
    // same alert id the router will extract on tap.
    let body = format!("{} missing near {}", subject, location);
    if let Err(e) = platform
        .schedule_local_notification(
            "Amber Alert (demo)",
            &body,
            json!({ "alertId": id, "demo": true }),
            Duration::from_secs(1),
        )
        .await
    {
        warn!("demo feed failed to schedule notification for {}: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryDocs, MemoryPlatform};

    fn feed(
        platform: Arc<MemoryPlatform>,
        docs: Arc<MemoryDocs>,
        period_seconds: u64,
    ) -> DemoFeed {
        let config = Config {
            demo: crate::config::DemoConfig {
                enabled: true,
                period_seconds,
            },
            ..Config::default()
        };
        DemoFeed::new(platform, docs, &config)
    }

    #[tokio::test(start_paused = true)]
    async fn produces_one_alert_immediately_then_one_per_period() {
        let platform = Arc::new(MemoryPlatform::new());
        let docs = Arc::new(MemoryDocs::new());
        let feed = feed(platform.clone(), docs.clone(), 30);

        feed.enable();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(docs.count("alerts"), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(docs.count("alerts"), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(docs.count("alerts"), 4);
        assert_eq!(platform.scheduled_notifications().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_notification_carries_the_alert_id() {
        let platform = Arc::new(MemoryPlatform::new());
        let docs = Arc::new(MemoryDocs::new());
        let feed = feed(platform.clone(), docs.clone(), 30);

        feed.enable();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let scheduled = platform.scheduled_notifications();
        assert_eq!(scheduled.len(), 1);
        let alert_id = scheduled[0].payload["alertId"].as_str().unwrap();
        assert!(docs.record("alerts", alert_id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn disable_stops_production() {
        let platform = Arc::new(MemoryPlatform::new());
        let docs = Arc::new(MemoryDocs::new());
        let feed = feed(platform, docs.clone(), 30);

        feed.enable();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(docs.count("alerts"), 1);

        feed.disable();
        assert!(!feed.is_enabled());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(docs.count("alerts"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn enable_and_disable_are_idempotent() {
        let platform = Arc::new(MemoryPlatform::new());
        let docs = Arc::new(MemoryDocs::new());
        let feed = feed(platform, docs.clone(), 30);

        feed.enable();
        feed.enable();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(docs.count("alerts"), 1);

        feed.disable();
        feed.disable();
        assert!(!feed.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_releases_the_timer() {
        let platform = Arc::new(MemoryPlatform::new());
        let docs = Arc::new(MemoryDocs::new());
        let feed = feed(platform, docs.clone(), 30);

        feed.enable();
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(feed);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(docs.count("alerts"), 1);
    }
}
