//! Subscription and delivery core for time-critical public-safety alerts:
//! device registration, push-token lifecycle, remote subscription records,
//! alert retrieval, and routing of tapped notifications back to alert
//! records. Platform facilities are traits in [`platform`]; the presentation
//! layer supplies real implementations and consumes the services in
//! [`services`].

pub mod config;
pub mod error;
pub mod platform;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::{init::initialize, Core, RouterGuard};
pub use store::models::{Alert, AlertKind, NotificationEvent};
