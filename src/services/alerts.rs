use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::platform::{Direction, Document, DocumentStore};
use crate::store::models::{Alert, AlertKind};

/// Read-only access to alert records in the remote store.
///
/// Retrieval failures are logged and surfaced as empty/absent results, never
/// as errors: the UI treats "no data" as ambiguous between "truly empty" and
/// "fetch failed" by design.
pub struct AlertRepository {
    docs: Arc<dyn DocumentStore>,
    collection: String,
}

/// Wire shape of an alert document; `timestamp` may be absent on a record
/// and is substituted with the retrieval moment.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertFields {
    kind: AlertKind,
    subject_name: String,
    location: String,
    description: String,
    timestamp: Option<DateTime<Utc>>,
}

impl AlertRepository {
    pub fn new(docs: Arc<dyn DocumentStore>, config: &Config) -> Self {
        AlertRepository {
            docs,
            collection: config.remote.alerts_collection.clone(),
        }
    }

    /// The most recent alerts, newest first, at most `limit` of them.
    pub async fn list_recent(&self, limit: usize) -> Vec<Alert> {
        let documents = match self
            .docs
            .query(&self.collection, "timestamp", Direction::Descending, limit)
            .await
        {
            Ok(documents) => documents,
            Err(e) => {
                warn!("failed to fetch recent alerts: {}", e);
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut alerts: Vec<Alert> = documents
            .iter()
            .filter_map(|doc| decode_alert(doc, now))
            .collect();

        // The store already orders by timestamp, but substituted timestamps
        // can perturb that; re-sort so callers always see newest first.
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit);
        alerts
    }

    /// A single alert by id. Absent both when the id does not exist and when
    /// the read fails; callers cannot distinguish the two.
    pub async fn get_by_id(&self, id: &str) -> Option<Alert> {
        match self.docs.get_one(&self.collection, id).await {
            Ok(Some(document)) => decode_alert(&document, Utc::now()),
            Ok(None) => None,
            Err(e) => {
                warn!("failed to fetch alert {}: {}", id, e);
                None
            }
        }
    }
}

fn decode_alert(document: &Document, now: DateTime<Utc>) -> Option<Alert> {
    match serde_json::from_value::<AlertFields>(document.fields.clone()) {
        Ok(fields) => Some(Alert {
            id: document.id.clone(),
            kind: fields.kind,
            subject_name: fields.subject_name,
            location: fields.location,
            description: fields.description,
            timestamp: fields.timestamp.unwrap_or(now),
        }),
        Err(e) => {
            debug!("skipping undecodable alert record {}: {}", document.id, e);
            None
        }
    }
}
