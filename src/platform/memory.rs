//! In-memory collaborator implementations. The simulation binary runs the
//! whole pipeline against these; tests use them with the failure knobs to
//! exercise degraded paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::{AppError, AppResult};
use crate::platform::{
    ChannelSpec, Direction, Document, DocumentStore, EventSource, ForegroundPolicy, LocalStore,
    NotificationPlatform, PermissionState, TokenScope, SERVER_TIMESTAMP,
};
use crate::store::models::NotificationEvent;

/// A local notification captured by [`MemoryPlatform`] instead of being
/// displayed.
#[derive(Debug, Clone)]
pub struct ScheduledNotification {
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub delay: Duration,
}

pub struct MemoryPlatform {
    physical: bool,
    permission: Mutex<PermissionState>,
    grant_on_request: bool,
    fail_project_scope: AtomicBool,
    token: Mutex<String>,
    prompt_count: AtomicUsize,
    token_requests: Mutex<Vec<TokenScope>>,
    channels: Mutex<Vec<ChannelSpec>>,
    scheduled: Mutex<Vec<ScheduledNotification>>,
}

impl MemoryPlatform {
    /// A physical device with permission already granted.
    pub fn new() -> Self {
        MemoryPlatform {
            physical: true,
            permission: Mutex::new(PermissionState::Granted),
            grant_on_request: true,
            fail_project_scope: AtomicBool::new(false),
            token: Mutex::new("ExponentPushToken[mem-device]".to_string()),
            prompt_count: AtomicUsize::new(0),
            token_requests: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    pub fn simulator() -> Self {
        MemoryPlatform {
            physical: false,
            ..MemoryPlatform::new()
        }
    }

    pub fn with_permission(self, state: PermissionState) -> Self {
        *self.permission.lock().unwrap() = state;
        self
    }

    /// Prompts resolve to Denied instead of Granted.
    pub fn denying_requests(mut self) -> Self {
        self.grant_on_request = false;
        self
    }

    /// Project-scoped token issuance fails, forcing the unscoped fallback.
    pub fn failing_project_scope(self) -> Self {
        self.fail_project_scope.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_token(&self, token: &str) {
        *self.token.lock().unwrap() = token.to_string();
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_count.load(Ordering::SeqCst)
    }

    pub fn token_requests(&self) -> Vec<TokenScope> {
        self.token_requests.lock().unwrap().clone()
    }

    pub fn created_channels(&self) -> Vec<ChannelSpec> {
        self.channels.lock().unwrap().clone()
    }

    pub fn scheduled_notifications(&self) -> Vec<ScheduledNotification> {
        self.scheduled.lock().unwrap().clone()
    }

    /// Drain captured notifications, oldest first.
    pub fn take_scheduled(&self) -> Vec<ScheduledNotification> {
        std::mem::take(&mut *self.scheduled.lock().unwrap())
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        MemoryPlatform::new()
    }
}

#[async_trait]
impl NotificationPlatform for MemoryPlatform {
    fn is_physical_device(&self) -> bool {
        self.physical
    }

    async fn permission_state(&self) -> PermissionState {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> PermissionState {
        self.prompt_count.fetch_add(1, Ordering::SeqCst);
        let state = if self.grant_on_request {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        *self.permission.lock().unwrap() = state;
        state
    }

    async fn issue_token(&self, scope: TokenScope) -> AppResult<String> {
        self.token_requests.lock().unwrap().push(scope.clone());
        if matches!(scope, TokenScope::Project(_)) && self.fail_project_scope.load(Ordering::SeqCst)
        {
            return Err(AppError::Transient(
                "project-scoped token issuance not configured".to_string(),
            ));
        }
        Ok(self.token.lock().unwrap().clone())
    }

    async fn create_channel(&self, spec: &ChannelSpec) -> AppResult<()> {
        let mut channels = self.channels.lock().unwrap();
        if !channels.iter().any(|c| c.id == spec.id) {
            channels.push(spec.clone());
        }
        Ok(())
    }

    async fn schedule_local_notification(
        &self,
        title: &str,
        body: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> AppResult<()> {
        self.scheduled.lock().unwrap().push(ScheduledNotification {
            title: title.to_string(),
            body: body.to_string(),
            payload,
            delay,
        });
        Ok(())
    }
}

pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// All subsequent writes fail with a storage error.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("write failed".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct MemoryDocs {
    collections: Mutex<HashMap<String, BTreeMap<String, serde_json::Value>>>,
    // Server clock floor: assigned timestamps never decrease.
    last_assigned: Mutex<DateTime<Utc>>,
    fail: AtomicBool,
}

impl MemoryDocs {
    pub fn new() -> Self {
        MemoryDocs {
            collections: Mutex::new(HashMap::new()),
            last_assigned: Mutex::new(DateTime::<Utc>::MIN_UTC),
            fail: AtomicBool::new(false),
        }
    }

    /// All subsequent reads and writes fail with a transient error.
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn record(&self, collection: &str, key: &str) -> Option<serde_json::Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    fn server_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.last_assigned.lock().unwrap();
        let now = Utc::now().max(*last);
        *last = now;
        now
    }

    fn check_available(&self) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Transient("document store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryDocs {
    fn default() -> Self {
        MemoryDocs::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocs {
    async fn upsert(
        &self,
        collection: &str,
        key: &str,
        fields: serde_json::Value,
    ) -> AppResult<()> {
        self.check_available()?;

        let incoming = match fields {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(AppError::Transient(format!(
                    "upsert fields must be an object, got {}",
                    other
                )))
            }
        };

        let mut collections = self.collections.lock().unwrap();
        let docs = collections.entry(collection.to_string()).or_default();
        let entry = docs
            .entry(key.to_string())
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        let target = entry
            .as_object_mut()
            .ok_or_else(|| AppError::Transient("existing document is not an object".to_string()))?;

        for (name, value) in incoming {
            let value = match &value {
                serde_json::Value::String(s) if s == SERVER_TIMESTAMP => {
                    serde_json::Value::String(self.server_timestamp().to_rfc3339())
                }
                _ => value,
            };
            target.insert(name, value);
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
        limit: usize,
    ) -> AppResult<Vec<Document>> {
        self.check_available()?;

        let collections = self.collections.lock().unwrap();
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let sort_key = |doc: &Document| -> Option<DateTime<Utc>> {
            doc.fields
                .get(order_by)
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
        };
        docs.sort_by_key(sort_key);
        if direction == Direction::Descending {
            docs.reverse();
        }
        docs.truncate(limit);

        Ok(docs)
    }

    async fn get_one(&self, collection: &str, key: &str) -> AppResult<Option<Document>> {
        self.check_available()?;

        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|fields| Document {
                id: key.to_string(),
                fields: fields.clone(),
            }))
    }
}

pub struct MemoryEvents {
    tx: broadcast::Sender<NotificationEvent>,
    cold_start: Mutex<Option<NotificationEvent>>,
    policy: Mutex<Option<ForegroundPolicy>>,
}

impl MemoryEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        MemoryEvents {
            tx,
            cold_start: Mutex::new(None),
            policy: Mutex::new(None),
        }
    }

    pub fn emit_received(&self, payload: serde_json::Value) {
        let _ = self.tx.send(NotificationEvent::received(payload));
    }

    pub fn emit_tapped(&self, payload: serde_json::Value) {
        let _ = self.tx.send(NotificationEvent::tapped(payload));
    }

    /// Pretend the process was launched by tapping this notification.
    pub fn set_cold_start(&self, event: NotificationEvent) {
        *self.cold_start.lock().unwrap() = Some(event);
    }

    pub fn foreground_policy(&self) -> Option<ForegroundPolicy> {
        *self.policy.lock().unwrap()
    }
}

impl Default for MemoryEvents {
    fn default() -> Self {
        MemoryEvents::new()
    }
}

impl EventSource for MemoryEvents {
    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.tx.subscribe()
    }

    fn last_tapped(&self) -> Option<NotificationEvent> {
        self.cold_start.lock().unwrap().clone()
    }

    fn set_foreground_policy(&self, policy: &ForegroundPolicy) {
        *self.policy.lock().unwrap() = Some(*policy);
    }
}
