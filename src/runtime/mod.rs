//! Runtime surface: introspection listing and the periodic ticker.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod ticker;

pub use api::{list_tasks, ScheduleSnapshot, TaskSnapshot};
#[cfg(feature = "tokio-runtime")]
pub use ticker::spawn_ticker;
