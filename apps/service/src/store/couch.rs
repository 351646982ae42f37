use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{DeviceStore, StoreError};
use fleetwatch::Device;

const DEVICES_DB: &str = "shipyard-devices";
const CENTRAL_MONITORING_DB: &str = "central-monitoring";
const CENTRAL_MONITORING_DOC: &str = "default";
const ROOM_QUERY_LIMIT: usize = 100;

/// Device document in the devices database
#[derive(Debug, Deserialize)]
struct DeviceDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    room: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FindResponse<T> {
    docs: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CentralMonitoringDoc {
    #[serde(default)]
    devices: Vec<CentralDevice>,
}

#[derive(Debug, Deserialize)]
struct CentralDevice {
    name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    room: Option<String>,
    #[serde(default, rename = "checkerConfig")]
    checker_config: Option<HashMap<String, Value>>,
}

/// Empty room strings mean "no room"
fn room_of(room: Option<String>) -> Option<String> {
    room.filter(|room| !room.trim().is_empty())
}

impl From<DeviceDoc> for Device {
    fn from(doc: DeviceDoc) -> Self {
        Device { name: doc.id, address: doc.address, room: room_of(doc.room), checker_config: HashMap::new() }
    }
}

impl From<CentralDevice> for Device {
    fn from(d: CentralDevice) -> Self {
        Device {
            name: d.name,
            address: d.address,
            room: room_of(d.room),
            checker_config: d.checker_config.unwrap_or_default(),
        }
    }
}

/// CouchDB backed device store
pub struct CouchStore {
    client: reqwest::Client,
    base: Url,
    username: String,
    password: String,
}

impl CouchStore {
    pub fn new(address: &str, username: &str, password: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base = Url::parse(address).map_err(|e| StoreError::Address(format!("{address}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Address(address.to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base, username: username.to_string(), password: password.to_string() })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Address(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "couch request");
        let builder = self.client.request(method, url);
        if self.username.is_empty() {
            builder
        } else {
            builder.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status: status.as_u16(), body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl DeviceStore for CouchStore {
    async fn get_device(&self, name: &str) -> Result<Device, StoreError> {
        let url = self.url(&[DEVICES_DB, name])?;
        let response = self.request(Method::GET, url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let doc: DeviceDoc = Self::read_json(response).await?;
        Ok(doc.into())
    }

    async fn get_all_devices(&self) -> Result<Vec<Device>, StoreError> {
        let url = self.url(&[CENTRAL_MONITORING_DB, CENTRAL_MONITORING_DOC])?;
        let response = self.request(Method::GET, url).send().await?;

        let doc: CentralMonitoringDoc = Self::read_json(response).await?;
        Ok(doc.devices.into_iter().map(Device::from).collect())
    }

    async fn get_room_devices(&self, room: &str) -> Result<Vec<Device>, StoreError> {
        let url = self.url(&[DEVICES_DB, "_find"])?;
        let query = json!({
            "selector": { "room": room },
            "limit": ROOM_QUERY_LIMIT,
        });
        let response = self.request(Method::POST, url).json(&query).send().await?;

        let found: FindResponse<DeviceDoc> = Self::read_json(response).await?;
        Ok(found.docs.into_iter().map(Device::from).collect())
    }
}
