//! Process-wide `tracing` setup shared by the FleetWatch binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_with_directive};
