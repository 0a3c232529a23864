use crate::core::{
    AddDeviceRequest, AddDeviceResponse, CsvDefaults, InventoryApi, LookupEntry, WorkflowStatus,
    WorkflowStep,
};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// 記憶體內的後端替身
#[derive(Default)]
pub struct MockInventoryApi {
    owners: HashMap<String, String>,
    failing_ips: HashSet<String>,
    failed_devices: HashSet<String>,
    erroring_devices: HashSet<String>,
    roles: Vec<LookupEntry>,
    device_types: Vec<LookupEntry>,
    failing_locations: bool,
    queried: Mutex<Vec<String>>,
    submitted: Mutex<Vec<AddDeviceRequest>>,
}

impl MockInventoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, ip: &str, owner: &str) -> Self {
        self.owners.insert(ip.to_string(), owner.to_string());
        self
    }

    pub fn with_failing_ip(mut self, ip: &str) -> Self {
        self.failing_ips.insert(ip.to_string());
        self
    }

    pub fn with_failed_device(mut self, name: &str) -> Self {
        self.failed_devices.insert(name.to_string());
        self
    }

    pub fn with_erroring_device(mut self, name: &str) -> Self {
        self.erroring_devices.insert(name.to_string());
        self
    }

    pub fn with_roles(mut self, roles: Vec<LookupEntry>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_device_types(mut self, device_types: Vec<LookupEntry>) -> Self {
        self.device_types = device_types;
        self
    }

    pub fn with_failing_locations(mut self) -> Self {
        self.failing_locations = true;
        self
    }

    pub fn queried_ips(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }
}

fn step(status: &str, message: &str) -> WorkflowStatus {
    WorkflowStatus {
        step1_device: WorkflowStep {
            status: status.to_string(),
            message: message.to_string(),
        },
        other_steps: HashMap::new(),
    }
}

#[async_trait]
impl InventoryApi for MockInventoryApi {
    async fn find_ip_owner(&self, ip: &str) -> Result<Option<String>> {
        self.queried.lock().unwrap().push(ip.to_string());
        if self.failing_ips.contains(ip) {
            return Err(ImportError::HttpStatus {
                status: 500,
                path: "/api/nautobot/ipam/ip-addresses/detailed".to_string(),
                body: "lookup failed".to_string(),
            });
        }
        Ok(self.owners.get(ip).cloned())
    }

    async fn add_device(&self, request: &AddDeviceRequest) -> Result<AddDeviceResponse> {
        self.submitted.lock().unwrap().push(request.clone());

        if self.erroring_devices.contains(&request.name) {
            return Err(ImportError::HttpStatus {
                status: 502,
                path: "/api/nautobot/add-device".to_string(),
                body: "bad gateway".to_string(),
            });
        }

        if self.failed_devices.contains(&request.name) {
            return Ok(AddDeviceResponse {
                success: Some(false),
                workflow_status: step("failed", "device already exists"),
                ..Default::default()
            });
        }

        Ok(AddDeviceResponse {
            success: Some(true),
            message: Some(format!("Device {} created", request.name)),
            device_id: Some(format!("id-{}", request.name)),
            workflow_status: step("success", "created"),
            summary: None,
        })
    }

    async fn list_roles(&self) -> Result<Vec<LookupEntry>> {
        Ok(self.roles.clone())
    }

    async fn list_locations(&self) -> Result<Vec<LookupEntry>> {
        if self.failing_locations {
            return Err(ImportError::HttpStatus {
                status: 503,
                path: "/api/nautobot/locations".to_string(),
                body: String::new(),
            });
        }
        Ok(Vec::new())
    }

    async fn list_device_types(&self) -> Result<Vec<LookupEntry>> {
        Ok(self.device_types.clone())
    }

    async fn csv_defaults(&self) -> Result<CsvDefaults> {
        Ok(CsvDefaults::default())
    }
}
