use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fleetwatch::{Event, EventEmitter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::log_event;

/// Building and room of a device named `BLDG-ROOM-DEVICE`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    #[serde(rename = "buildingID", default, skip_serializing_if = "String::is_empty")]
    pub building_id: String,
    #[serde(rename = "roomID", default, skip_serializing_if = "String::is_empty")]
    pub room_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(flatten)]
    pub room: RoomInfo,
    #[serde(rename = "deviceID", default, skip_serializing_if = "String::is_empty")]
    pub device_id: String,
}

impl DeviceInfo {
    /// Split a device name following the `BLDG-ROOM-DEVICE` convention.
    /// Names that don't follow it only carry the device id.
    pub fn from_name(name: &str) -> Self {
        let parts: Vec<&str> = name.split('-').collect();
        let room = match parts.as_slice() {
            [building, room, device] if !building.is_empty() && !room.is_empty() && !device.is_empty() => RoomInfo {
                building_id: building.to_string(),
                room_id: format!("{building}-{room}"),
            },
            _ => RoomInfo::default(),
        };

        Self { room, device_id: name.to_string() }
    }
}

/// Event as accepted by the event hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubEvent {
    pub generating_system: String,
    pub timestamp: DateTime<Utc>,
    pub target_device: DeviceInfo,
    pub affected_room: RoomInfo,
    pub key: String,
    pub value: String,
}

impl HubEvent {
    pub fn new(generating_system: &str, event: &Event) -> Self {
        let target_device = DeviceInfo::from_name(&event.device.name);
        Self {
            generating_system: generating_system.to_string(),
            timestamp: Utc::now(),
            affected_room: target_device.room.clone(),
            target_device,
            key: event.key.clone(),
            value: event.value.clone(),
        }
    }
}

/// Logs every event and forwards it to the event hub, best effort
pub struct HubEmitter {
    client: reqwest::Client,
    endpoint: Url,
    generating_system: String,
}

impl HubEmitter {
    pub fn new(address: &str, generating_system: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut endpoint = Url::parse(address).with_context(|| format!("invalid event hub address {address}"))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("event hub address {address} cannot be a base"))?
            .pop_if_empty()
            .push("event");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build event hub client")?;

        Ok(Self { client, endpoint, generating_system: generating_system.into() })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn publish(&self, event: &HubEvent) -> Result<()> {
        self.client
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await
            .context("event hub unreachable")?
            .error_for_status()
            .context("event hub rejected event")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventEmitter for HubEmitter {
    async fn send(&self, event: Event) {
        log_event(&event);

        let hub_event = HubEvent::new(&self.generating_system, &event);
        match self.publish(&hub_event).await {
            Ok(()) => debug!(device = %event.device.name, key = %event.key, "event published"),
            Err(e) => warn!(device = %event.device.name, key = %event.key, "failed to publish event: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;
    use fleetwatch::Device;
    use serde_json::Value;
    use std::sync::Arc;

    fn event(name: &str) -> Event {
        Event::new(Arc::new(Device::new(name, "10.5.34.12")), "online", "Offline")
    }

    #[test]
    fn test_device_info_from_name() {
        let info = DeviceInfo::from_name("ITB-1101-D1");
        assert_eq!(info.room.building_id, "ITB");
        assert_eq!(info.room.room_id, "ITB-1101");
        assert_eq!(info.device_id, "ITB-1101-D1");

        let odd = DeviceInfo::from_name("printer");
        assert_eq!(odd.room, RoomInfo::default());
        assert_eq!(odd.device_id, "printer");
    }

    #[test]
    fn test_hub_event_shape() {
        let hub_event = HubEvent::new("ITB-1101-CP1", &event("ITB-1101-D1"));
        let value = serde_json::to_value(&hub_event).unwrap();

        assert_eq!(value["generatingSystem"], "ITB-1101-CP1");
        assert_eq!(value["targetDevice"]["buildingID"], "ITB");
        assert_eq!(value["targetDevice"]["roomID"], "ITB-1101");
        assert_eq!(value["targetDevice"]["deviceID"], "ITB-1101-D1");
        assert_eq!(value["affectedRoom"]["roomID"], "ITB-1101");
        assert_eq!(value["key"], "online");
        assert_eq!(value["value"], "Offline");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_endpoint_appends_event_path() {
        let emitter = HubEmitter::new("http://hub.local:7100/", "ITB-1101-CP1", Duration::from_secs(1)).unwrap();
        assert_eq!(emitter.endpoint().as_str(), "http://hub.local:7100/event");
    }

    #[tokio::test]
    async fn test_send_posts_event() {
        let (address, server) = serve_once("200 OK", "").await;
        let emitter = HubEmitter::new(&address, "ITB-1101-CP1", Duration::from_secs(5)).unwrap();

        emitter.send(event("ITB-1101-D1")).await;
        let request = server.await.unwrap();

        assert_eq!(request.request_line, "POST /event HTTP/1.1");
        let body: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["targetDevice"]["deviceID"], "ITB-1101-D1");
        assert_eq!(body["value"], "Offline");
    }

    #[tokio::test]
    async fn test_send_swallows_hub_errors() {
        let (address, _server) = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let emitter = HubEmitter::new(&address, "ITB-1101-CP1", Duration::from_secs(5)).unwrap();

        emitter.send(event("ITB-1101-D1")).await;
    }
}
