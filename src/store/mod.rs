pub mod local;
pub mod models;

pub use local::DeviceStore;
pub use models::{Alert, AlertKind, DeviceRegistration, EventKind, NotificationEvent, SubscriptionRecord};
