//! Interfaces to the external collaborators the core depends on: the
//! permission/token platform, the durable local key-value store, the remote
//! document store, and the notification event source. The presentation layer
//! supplies real implementations; `memory` holds in-memory ones used by the
//! simulation binary and the tests.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::AppResult;
use crate::store::models::NotificationEvent;

/// Sentinel value for fields that the remote store must fill with its own
/// clock on write. Server assignment keeps `updatedAt` monotonically
/// non-decreasing per record regardless of client clock skew.
pub const SERVER_TIMESTAMP: &str = "__server_timestamp__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Undetermined,
}

/// Scope hint for push-token issuance. Project-scoped issuance is preferred;
/// the registrar falls back to unscoped when it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenScope {
    Project(String),
    Unscoped,
}

/// Notification channel metadata, created idempotently on every launch.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    pub importance: u8,
    pub vibration_pattern: Vec<u64>,
    pub light_color: String,
}

impl From<&crate::config::ChannelConfig> for ChannelSpec {
    fn from(config: &crate::config::ChannelConfig) -> Self {
        ChannelSpec {
            id: config.id.clone(),
            name: config.name.clone(),
            importance: config.importance,
            vibration_pattern: config.vibration_pattern.clone(),
            light_color: config.light_color.clone(),
        }
    }
}

/// Process-wide handling for notifications that arrive while the app is
/// foregrounded. Applied once at startup, never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct ForegroundPolicy {
    pub show_alert: bool,
    pub play_sound: bool,
    pub set_badge: bool,
}

impl Default for ForegroundPolicy {
    fn default() -> Self {
        ForegroundPolicy {
            show_alert: true,
            play_sound: true,
            set_badge: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A record read from the remote document store. Field values are JSON;
/// timestamps travel as RFC 3339 strings.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub fields: serde_json::Value,
}

/// Platform push/permission facilities.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Emulators and simulators without push capability report false; the
    /// registrar fails fast on them without touching the network.
    fn is_physical_device(&self) -> bool;

    async fn permission_state(&self) -> PermissionState;

    /// Prompt the user. Resolves to `Granted` or `Denied`, never
    /// `Undetermined`.
    async fn request_permission(&self) -> PermissionState;

    async fn issue_token(&self, scope: TokenScope) -> AppResult<String>;

    /// No-op if the channel already exists.
    async fn create_channel(&self, spec: &ChannelSpec) -> AppResult<()>;

    /// Schedule a local notification after `delay`. Used only by the demo
    /// feed to mirror the real delivery path without a backend.
    async fn schedule_local_notification(
        &self,
        title: &str,
        body: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> AppResult<()>;
}

/// Durable local key-value storage. Single-key atomicity only.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}

/// Remote document store holding subscription records and alert records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Merge `fields` into the document at `key`, creating it if missing.
    /// Fields not named are left untouched. String values equal to
    /// [`SERVER_TIMESTAMP`] are replaced with a server-assigned instant.
    async fn upsert(
        &self,
        collection: &str,
        key: &str,
        fields: serde_json::Value,
    ) -> AppResult<()>;

    async fn query(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
        limit: usize,
    ) -> AppResult<Vec<Document>>;

    async fn get_one(&self, collection: &str, key: &str) -> AppResult<Option<Document>>;
}

/// Source of notification events. RECEIVED and TAPPED arrive on the same
/// stream, tagged by kind; subscribers get an independent receiver each.
pub trait EventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent>;

    /// The tap that caused a cold start, if the process was launched by one.
    /// Independent of the live stream; queried once at startup.
    fn last_tapped(&self) -> Option<NotificationEvent>;

    fn set_foreground_policy(&self, policy: &ForegroundPolicy);
}
