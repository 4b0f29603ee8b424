//! Embassy async tasks
//!
//! All tasks share the bridge through [`crate::bridge::SharedBridge`].

pub mod service;
pub mod sync;
pub mod telemetry;

pub use service::service_task;
pub use sync::sync_task;
pub use telemetry::telemetry_task;
