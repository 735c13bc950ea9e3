use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{broadcast, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::platform::EventSource;
use crate::store::models::{EventKind, NotificationEvent};

/// Routes notification events to the caller.
///
/// One listener task consumes both RECEIVED and TAPPED events. RECEIVED only
/// updates a last-seen marker (display is the platform's job); TAPPED hands
/// the embedded alert id to the caller's resolution callback. The two kinds
/// are independent: no ordering between them is assumed for the same alert.
pub struct NotificationRouter {
    events: Arc<dyn EventSource>,
    last_received: Arc<RwLock<Option<NotificationEvent>>>,
    // At most one live registration; re-starting releases the previous one
    // so hot re-initialization cannot double-dispatch.
    active: std::sync::Mutex<Option<AbortHandle>>,
}

/// Disposer for a listener registration. Releases the receive and tap
/// handling together on `stop` or drop.
pub struct RouterGuard {
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl RouterGuard {
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for RouterGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

impl NotificationRouter {
    pub fn new(events: Arc<dyn EventSource>) -> Self {
        NotificationRouter {
            events,
            last_received: Arc::new(RwLock::new(None)),
            active: std::sync::Mutex::new(None),
        }
    }

    /// Start listening. The returned guard releases the registration; it
    /// must be kept alive for as long as events should be dispatched.
    pub fn start<F>(&self, on_tap: F) -> RouterGuard
    where
        F: Fn(String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let mut rx = self.events.subscribe();
        let last_received = Arc::clone(&self.last_received);

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => dispatch(event, &last_received, &on_tap).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("notification listener lagged, {} event(s) dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut active = self.active.lock().unwrap();
        if let Some(previous) = active.replace(handle.abort_handle()) {
            debug!("router already listening, releasing previous registration");
            previous.abort();
        }

        RouterGuard {
            handle: Some(handle),
        }
    }

    /// The most recent RECEIVED event seen while foregrounded, if any.
    pub async fn last_received(&self) -> Option<NotificationEvent> {
        self.last_received.read().await.clone()
    }

    /// Cold-start query: the tap that launched the process, if any.
    /// Independent of the live listeners.
    pub fn last_tapped(&self) -> Option<NotificationEvent> {
        self.events.last_tapped()
    }
}

async fn dispatch<F>(
    event: NotificationEvent,
    last_received: &RwLock<Option<NotificationEvent>>,
    on_tap: &F,
) where
    F: Fn(String) -> BoxFuture<'static, ()> + Send + Sync,
{
    match event.kind {
        EventKind::Received => {
            *last_received.write().await = Some(event);
        }
        EventKind::Tapped => match event.require_alert_id() {
            Ok(alert_id) => {
                let alert_id = alert_id.to_string();
                on_tap(alert_id).await;
            }
            Err(e) => {
                debug!("discarding tapped notification: {}", e);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::platform::memory::{MemoryDocs, MemoryEvents};
    use crate::platform::DocumentStore;
    use crate::services::alerts::AlertRepository;
    use crate::store::models::Alert;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    fn collector() -> (
        Arc<Mutex<Vec<String>>>,
        impl Fn(String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let on_tap = move |alert_id: String| -> BoxFuture<'static, ()> {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().await.push(alert_id);
            })
        };
        (seen, on_tap)
    }

    #[tokio::test]
    async fn tap_resolves_to_exact_alert() {
        let events = Arc::new(MemoryEvents::new());
        let docs = Arc::new(MemoryDocs::new());
        docs.upsert(
            "alerts",
            "42",
            json!({
                "kind": "missing_child",
                "subjectName": "Jane Doe",
                "location": "Springfield",
                "description": "Last seen downtown",
                "timestamp": "2024-03-01T10:00:00Z",
            }),
        )
        .await
        .unwrap();
        let repository = Arc::new(AlertRepository::new(docs, &Config::default()));

        let resolved: Arc<Mutex<Vec<Option<Alert>>>> = Arc::new(Mutex::new(Vec::new()));
        let router = NotificationRouter::new(events.clone());
        let _guard = {
            let resolved = resolved.clone();
            let repository = repository.clone();
            router.start(move |alert_id: String| -> BoxFuture<'static, ()> {
                let resolved = resolved.clone();
                let repository = repository.clone();
                Box::pin(async move {
                    let alert = repository.get_by_id(&alert_id).await;
                    resolved.lock().await.push(alert);
                })
            })
        };

        events.emit_tapped(json!({ "alertId": "42" }));
        events.emit_tapped(json!({ "alertId": "missing" }));
        settle().await;

        let resolved = resolved.lock().await;
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].as_ref().unwrap().id, "42");
        assert_eq!(resolved[0].as_ref().unwrap().subject_name, "Jane Doe");
        assert!(resolved[1].is_none());
    }

    #[tokio::test]
    async fn malformed_tap_never_reaches_callback() {
        let events = Arc::new(MemoryEvents::new());
        let router = NotificationRouter::new(events.clone());
        let (seen, on_tap) = collector();
        let _guard = router.start(on_tap);

        events.emit_tapped(json!({ "type": "amber_alert" }));
        events.emit_tapped(json!({ "alertId": 42 }));
        settle().await;

        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn received_updates_last_seen_only() {
        let events = Arc::new(MemoryEvents::new());
        let router = NotificationRouter::new(events.clone());
        let (seen, on_tap) = collector();
        let _guard = router.start(on_tap);

        events.emit_received(json!({ "alertId": "7" }));
        settle().await;

        assert!(seen.lock().await.is_empty());
        let last = router.last_received().await.unwrap();
        assert_eq!(last.alert_id(), Some("7"));
    }

    #[tokio::test]
    async fn restart_does_not_double_dispatch() {
        let events = Arc::new(MemoryEvents::new());
        let router = NotificationRouter::new(events.clone());
        let (seen, on_tap) = collector();
        let _first = router.start(on_tap);

        let (seen_again, on_tap_again) = collector();
        let _second = router.start(on_tap_again);
        settle().await;

        events.emit_tapped(json!({ "alertId": "42" }));
        settle().await;

        assert!(seen.lock().await.is_empty());
        assert_eq!(*seen_again.lock().await, vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn dropping_the_guard_releases_the_listener() {
        let events = Arc::new(MemoryEvents::new());
        let router = NotificationRouter::new(events.clone());
        let (seen, on_tap) = collector();
        let guard = router.start(on_tap);

        events.emit_tapped(json!({ "alertId": "1" }));
        settle().await;
        drop(guard);
        settle().await;

        events.emit_tapped(json!({ "alertId": "2" }));
        settle().await;

        assert_eq!(*seen.lock().await, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn cold_start_query_is_independent_of_listeners() {
        let events = Arc::new(MemoryEvents::new());
        events.set_cold_start(NotificationEvent::tapped(json!({ "alertId": "boot" })));

        let router = NotificationRouter::new(events);
        let launch = router.last_tapped().unwrap();
        assert_eq!(launch.alert_id(), Some("boot"));
    }
}
