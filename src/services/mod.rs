pub mod alerts;
pub mod demo;
pub mod init;
pub mod registrar;
pub mod router;
pub mod subscriptions;

pub use alerts::AlertRepository;
pub use demo::DemoFeed;
pub use init::Core;
pub use registrar::DeviceRegistrar;
pub use router::{NotificationRouter, RouterGuard};
pub use subscriptions::SubscriptionManager;
