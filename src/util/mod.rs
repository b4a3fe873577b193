pub mod clock;
pub mod telemetry;
pub mod time;

pub use clock::*;
pub use telemetry::*;
pub use time::*;
