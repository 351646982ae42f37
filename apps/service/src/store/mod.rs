/// Device store - bootstrap source of the devices to monitor
///
/// The monitor only reads the store at startup; nothing in the engine
/// depends on it afterwards.
pub mod couch;

pub use couch::CouchStore;

use fleetwatch::Device;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("device {0} not found")]
    NotFound(String),
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid store address: {0}")]
    Address(String),
}

#[async_trait::async_trait]
pub trait DeviceStore: Send + Sync {
    /// A single device by name
    async fn get_device(&self, name: &str) -> Result<Device, StoreError>;

    /// Every device monitored centrally, with its checker configuration
    async fn get_all_devices(&self) -> Result<Vec<Device>, StoreError>;

    /// Devices of one room
    async fn get_room_devices(&self, room: &str) -> Result<Vec<Device>, StoreError>;
}
