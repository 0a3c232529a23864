use crate::domain::model::{AddDeviceRequest, AddDeviceResponse, CsvDefaults, LookupEntry};
use crate::domain::ports::{ConfigProvider, InventoryApi};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const IP_ADDRESS_PATH: &str = "/api/nautobot/ipam/ip-addresses/detailed";
pub const ADD_DEVICE_PATH: &str = "/api/nautobot/add-device";
pub const ROLES_PATH: &str = "/api/nautobot/roles";
pub const LOCATIONS_PATH: &str = "/api/nautobot/locations";
pub const DEVICE_TYPES_PATH: &str = "/api/nautobot/device-types";
pub const CSV_DEFAULTS_PATH: &str = "/api/settings/nautobot/defaults";

#[derive(Debug, Default, Deserialize)]
struct IpAddressLookup {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    ip_addresses: Vec<IpAddressEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct IpAddressEntry {
    #[serde(default)]
    primary_ip4_for: Option<Value>,
    #[serde(default)]
    interfaces: Vec<InterfaceRef>,
}

#[derive(Debug, Default, Deserialize)]
struct InterfaceRef {
    #[serde(default)]
    device: Option<NamedRef>,
}

#[derive(Debug, Default, Deserialize)]
struct NamedRef {
    #[serde(default)]
    name: Option<String>,
}

/// 設定類端點的回應外層：`{"success": ..., "data": ..., "message": ...}`
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self, path: &str) -> Result<T> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(ImportError::ApiRejected {
                path: path.to_string(),
                message: self
                    .message
                    .unwrap_or_else(|| "response carried no data".to_string()),
            }),
        }
    }
}

/// `primary_ip4_for` 可能是單一物件，也可能是清單
fn primary_owner(value: &Value) -> Option<String> {
    let device = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    device
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

impl IpAddressLookup {
    fn owner(&self) -> Option<String> {
        if self.count == 0 && self.ip_addresses.is_empty() {
            return None;
        }
        self.ip_addresses.iter().find_map(|entry| {
            entry
                .primary_ip4_for
                .as_ref()
                .and_then(primary_owner)
                .or_else(|| {
                    entry
                        .interfaces
                        .iter()
                        .find_map(|i| i.device.as_ref().and_then(|d| d.name.clone()))
                })
        })
    }
}

/// 透過後端 REST API 存取盤點系統
#[derive(Debug, Clone)]
pub struct HttpInventoryApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpInventoryApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::new(
            config.api_base_url(),
            config.api_token().map(str::to_string),
            config.timeout_seconds(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
        let status = response.status();
        tracing::debug!("API response status for {}: {}", path, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::HttpStatus {
                status: status.as_u16(),
                path: path.to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("Making API request to: {}", self.url(path));
        let response = self.authorized(self.client.get(self.url(path))).send().await?;
        Self::read_json(path, response).await
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryApi {
    async fn find_ip_owner(&self, ip: &str) -> Result<Option<String>> {
        tracing::debug!("Looking up owner of {}", ip);
        let request = self
            .client
            .get(self.url(IP_ADDRESS_PATH))
            .query(&[
                ("address", ip),
                ("get_address", "true"),
                ("get_name", "true"),
                ("get_primary_ip4_for", "true"),
                ("get_interfaces", "true"),
            ]);
        let response = self.authorized(request).send().await?;
        let lookup: IpAddressLookup = Self::read_json(IP_ADDRESS_PATH, response).await?;
        Ok(lookup.owner())
    }

    async fn add_device(&self, request: &AddDeviceRequest) -> Result<AddDeviceResponse> {
        tracing::debug!("Submitting device {}", request.name);
        let response = self
            .authorized(self.client.post(self.url(ADD_DEVICE_PATH)))
            .json(request)
            .send()
            .await?;
        Self::read_json(ADD_DEVICE_PATH, response).await
    }

    async fn list_roles(&self) -> Result<Vec<LookupEntry>> {
        self.get_json(ROLES_PATH).await
    }

    async fn list_locations(&self) -> Result<Vec<LookupEntry>> {
        self.get_json(LOCATIONS_PATH).await
    }

    async fn list_device_types(&self) -> Result<Vec<LookupEntry>> {
        self.get_json(DEVICE_TYPES_PATH).await
    }

    async fn csv_defaults(&self) -> Result<CsvDefaults> {
        let envelope: ApiEnvelope<CsvDefaults> = self.get_json(CSV_DEFAULTS_PATH).await?;
        envelope.into_data(CSV_DEFAULTS_PATH)
    }
}
