mod builder;
mod dispatch;
mod metrics;
mod timer;
mod wheel;
pub mod callback;

pub use builder::{BuildError, TimerWheelBuilder};
pub use metrics::stats::Metrics;
pub use timer::TimerWheel;
