use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub channel: ChannelConfig,
    pub push: PushConfig,
    pub remote: RemoteConfig,
    pub alerts: AlertsConfig,
    pub demo: DemoConfig,
}

/// Platform notification channel metadata. Created (idempotently) on every
/// launch so that alert notifications arrive at maximum importance.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
    /// Channel importance, 0 (none) to 5 (max). Alerts default to 5.
    pub importance: u8,
    /// Vibration pattern in milliseconds (delay, vibrate, delay, vibrate, ...).
    pub vibration_pattern: Vec<u64>,
    /// Notification light color, hex RGB.
    pub light_color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Project id for project-scoped token issuance. When absent, tokens are
    /// requested unscoped from the start.
    pub project_id: Option<String>,
    /// Platform label written into the remote subscription record.
    pub platform: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Collection holding one subscription record per device.
    pub users_collection: String,
    /// Collection holding alert records, read-only for this crate.
    pub alerts_collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Default limit for recent-alert listings.
    pub default_list_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    /// Whether the simulation feed starts enabled in the demo binary.
    pub enabled: bool,
    /// Period between synthetic alerts.
    pub period_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            channel: ChannelConfig {
                id: env::var("ALERT_CHANNEL_ID").unwrap_or_else(|_| "amber-alerts".to_string()),
                name: env::var("ALERT_CHANNEL_NAME").unwrap_or_else(|_| "Amber Alerts".to_string()),
                importance: env::var("ALERT_CHANNEL_IMPORTANCE")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("ALERT_CHANNEL_IMPORTANCE".to_string()))?,
                vibration_pattern: parse_pattern(
                    &env::var("ALERT_CHANNEL_VIBRATION")
                        .unwrap_or_else(|_| "0,250,250,250".to_string()),
                )
                .ok_or_else(|| ConfigError::InvalidValue("ALERT_CHANNEL_VIBRATION".to_string()))?,
                light_color: env::var("ALERT_CHANNEL_LIGHT_COLOR")
                    .unwrap_or_else(|_| "#FF6347".to_string()),
            },
            push: PushConfig {
                project_id: env::var("PUSH_PROJECT_ID").ok(),
                platform: env::var("PUSH_PLATFORM")
                    .unwrap_or_else(|_| env::consts::OS.to_string()),
            },
            remote: RemoteConfig {
                users_collection: env::var("REMOTE_USERS_COLLECTION")
                    .unwrap_or_else(|_| "users".to_string()),
                alerts_collection: env::var("REMOTE_ALERTS_COLLECTION")
                    .unwrap_or_else(|_| "alerts".to_string()),
            },
            alerts: AlertsConfig {
                default_list_limit: env::var("ALERTS_LIST_LIMIT")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            demo: DemoConfig {
                enabled: match env::var("DEMO_FEED_ENABLED") {
                    Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
                    Err(_) => false,
                },
                period_seconds: env::var("DEMO_FEED_PERIOD_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
        })
    }
}

/// Parse a comma-separated list of millisecond durations.
fn parse_pattern(raw: &str) -> Option<Vec<u64>> {
    raw.split(',')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            channel: ChannelConfig {
                id: "amber-alerts".to_string(),
                name: "Amber Alerts".to_string(),
                importance: 5,
                vibration_pattern: vec![0, 250, 250, 250],
                light_color: "#FF6347".to_string(),
            },
            push: PushConfig {
                project_id: None,
                platform: env::consts::OS.to_string(),
            },
            remote: RemoteConfig {
                users_collection: "users".to_string(),
                alerts_collection: "alerts".to_string(),
            },
            alerts: AlertsConfig {
                default_list_limit: 10,
            },
            demo: DemoConfig {
                enabled: false,
                period_seconds: 30,
            },
        }
    }
}
