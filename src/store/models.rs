use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Per-device state held in the local key-value store. `device_id` is
/// generated once and never changes for the life of the installation; the
/// push token may be refreshed by the platform at any time and re-persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub device_id: String,
    pub push_token: Option<String>,
    pub subscribed: bool,
}

/// Remote subscription record, keyed by device id in the users collection.
/// Writes are merges: a write never erases fields it does not name, so an
/// unsubscribe preserves the stored token. `updated_at` is server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    #[serde(rename = "expoPushToken")]
    pub push_token: Option<String>,
    #[serde(rename = "subscribedToAlerts")]
    pub subscribed: bool,
    pub platform: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Category of a public-safety alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "amber_alert")]
    AmberAlert,
    #[serde(rename = "missing_child")]
    MissingChild,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::AmberAlert => "amber_alert",
            AlertKind::MissingChild => "missing_child",
        }
    }
}

/// An alert record as read from the remote store. Immutable once fetched;
/// this crate only ever reads alerts. `timestamp` is always present: records
/// missing one get the retrieval moment substituted on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub subject_name: String,
    pub location: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Received,
    Tapped,
}

/// A notification event as delivered by the platform. Ephemeral: it exists
/// only for the duration of dispatch from the platform callback to the
/// router handler and is never persisted.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl NotificationEvent {
    pub fn received(payload: serde_json::Value) -> Self {
        NotificationEvent {
            kind: EventKind::Received,
            payload,
        }
    }

    pub fn tapped(payload: serde_json::Value) -> Self {
        NotificationEvent {
            kind: EventKind::Tapped,
            payload,
        }
    }

    /// The alert id embedded in the payload, if any. Missing or non-string
    /// ids mark the event as malformed and it is discarded by the router.
    pub fn alert_id(&self) -> Option<&str> {
        self.payload.get("alertId")?.as_str()
    }

    /// Like [`alert_id`](Self::alert_id), but classifying absence as a
    /// malformed event for callers that want the taxonomy error.
    pub fn require_alert_id(&self) -> AppResult<&str> {
        self.alert_id()
            .ok_or_else(|| AppError::MalformedEvent("payload missing alertId".to_string()))
    }
}
