//! Event sink contract consumed by the monitor.
//!
//! The monitor hands every completed check's [`Event`] to the configured
//! emitter on a spawned task and never waits for it. Implementations are
//! expected to deal with their own failures (log and move on).

use crate::types::Event;

#[async_trait::async_trait]
pub trait EventEmitter: Send + Sync {
    /// Deliver an event, best effort
    async fn send(&self, event: Event);
}
