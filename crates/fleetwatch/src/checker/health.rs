//! Backend health checker.
//!
//! Devices of the same room share one health report served by the room's
//! control backend at `GET <base>/api/v1/room/<room>/health`. Reports are
//! fetched through a [`Coalescer`] so a fan-out over every device in a room
//! results in a single request per TTL window.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::debug;
use url::Url;

use super::Checker;
use crate::cache::Coalescer;
use crate::device::Device;
use crate::types::{CheckResult, Event};
use crate::DEFAULT_CACHE_TTL;

pub const EVENT_KEY: &str = "responsive";
pub const RESPONSIVE: &str = "Ok";
pub const NO_RESPONSE: &str = "No Response";

/// Faults while fetching a room health report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("health request failed: {0}")]
    Request(String),
    #[error("health endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unable to parse health report: {0}")]
    Parse(String),
    #[error("health refresh aborted: {0}")]
    Aborted(String),
}

impl From<JoinError> for FetchError {
    fn from(e: JoinError) -> Self {
        FetchError::Aborted(e.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Request(e.to_string())
    }
}

/// Health report for every device of a room, keyed by device name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomHealth {
    #[serde(default)]
    pub devices: HashMap<String, DeviceHealth>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceHealth {
    /// `None` when the backend has no health probe for the device
    #[serde(default)]
    pub healthy: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Where room health reports come from
#[async_trait::async_trait]
pub trait HealthSource: Send + Sync + 'static {
    async fn fetch(&self, room: &str) -> Result<RoomHealth, FetchError>;
}

/// Fetches room health reports over HTTP
#[derive(Debug, Clone)]
pub struct HttpHealthSource {
    client: reqwest::Client,
    base: Url,
}

impl HttpHealthSource {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Health endpoint of `room` under the configured base address
    pub fn endpoint(&self, room: &str) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Request(format!("{} cannot be used as a base address", self.base)))?
            .pop_if_empty()
            .extend(["api", "v1", "room", room, "health"]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl HealthSource for HttpHealthSource {
    async fn fetch(&self, room: &str) -> Result<RoomHealth, FetchError> {
        let url = self.endpoint(room)?;
        debug!(%url, "fetching room health");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), body });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

/// Checker reading each device's state out of its room's health report
pub struct HealthChecker<S = HttpHealthSource> {
    source: Arc<S>,
    cache: Coalescer<String, Arc<RoomHealth>, FetchError>,
}

impl<S: HealthSource> HealthChecker<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self { source: Arc::new(source), cache: Coalescer::new(ttl) }
    }

    async fn room_health(&self, room: &str, force_recheck: bool) -> Result<Arc<RoomHealth>, FetchError> {
        let source = Arc::clone(&self.source);
        let owned_room = room.to_string();
        let fetch = move || async move { source.fetch(&owned_room).await.map(Arc::new) };

        if force_recheck {
            self.cache.refresh(room.to_string(), fetch).await
        } else {
            self.cache.get(room.to_string(), fetch).await
        }
    }
}

#[async_trait::async_trait]
impl<S: HealthSource> Checker for HealthChecker<S> {
    async fn check(&self, device: &Arc<Device>, force_recheck: bool) -> CheckResult {
        let result = CheckResult::new(Event::new(device.clone(), EVENT_KEY, RESPONSIVE));

        let Some(room) = device.room.as_deref() else {
            return result.with_message("Device has no room, no health report to read");
        };

        let report = match self.room_health(room, force_recheck).await {
            Ok(report) => report,
            Err(e) => return result.failure(e.to_string(), NO_RESPONSE),
        };

        match report.devices.get(&device.name) {
            None => result.with_message("Device not found in room"),
            Some(DeviceHealth { healthy: None, .. }) => result.with_message("No health check implemented"),
            Some(DeviceHealth { healthy: Some(true), .. }) => result.with_message("Healthy"),
            Some(DeviceHealth { healthy: Some(false), error }) => {
                let error = error.as_deref().filter(|e| !e.is_empty()).unwrap_or("Unhealthy");
                result.with_message("Unhealthy").failure(error, NO_RESPONSE)
            }
        }
    }

    fn event_key(&self) -> &str {
        EVENT_KEY
    }
}
