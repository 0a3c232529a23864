use crate::core::{
    AddDeviceRequest, CsvParseResult, DeviceImportResult, ImportDefaults, ImportProgress,
    ImportStatus, ImportSummary, InterfacePayload, InventoryApi, IpConflict, ParsedDevice,
};
use crate::utils::error::{ImportError, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;

pub const DEFAULT_DEVICE_STATUS: &str = "active";
pub const DEFAULT_INTERFACE_STATUS: &str = "active";
pub const DEFAULT_NAMESPACE: &str = "Global";
pub const DEFAULT_PREFIX_LENGTH: &str = "/24";
pub const ALREADY_EXISTS_REASON: &str = "Device already exists";

const DUPLICATE_MARKERS: [&str; 3] = ["already exists", "duplicate", "unique constraint"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub defaults: ImportDefaults,
    pub add_prefix: bool,
    pub default_prefix_length: String,
    pub concurrent_requests: usize,
    /// 後端回報裝置已存在時記為 skipped 而不是 error
    pub skip_existing: bool,
    /// 關閉時只建立裝置本身，介面與 IP 不送出
    pub create_interfaces: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            defaults: ImportDefaults::default(),
            add_prefix: true,
            default_prefix_length: DEFAULT_PREFIX_LENGTH.to_string(),
            concurrent_requests: 1,
            skip_existing: false,
            create_interfaces: true,
        }
    }
}

fn is_duplicate_message(message: &str) -> bool {
    let message = message.to_lowercase();
    DUPLICATE_MARKERS.iter().any(|marker| message.contains(marker))
}

/// 匯入清單中的一項：送出，或事先決定略過
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportItem {
    Submit(ParsedDevice),
    Skip { device: ParsedDevice, reason: String },
}

impl ImportItem {
    pub fn device(&self) -> &ParsedDevice {
        match self {
            ImportItem::Submit(device) => device,
            ImportItem::Skip { device, .. } => device,
        }
    }
}

/// 依標記結果決定哪些裝置要略過；是否略過由呼叫端決定
pub fn plan_import(
    devices: &[ParsedDevice],
    flagged: &[IpConflict],
    skip_flagged: bool,
) -> Vec<ImportItem> {
    let flagged_names: HashSet<&str> = flagged.iter().map(|c| c.device.as_str()).collect();

    devices
        .iter()
        .map(|device| {
            if skip_flagged && flagged_names.contains(device.name.as_str()) {
                let owners: Vec<String> = flagged
                    .iter()
                    .filter(|c| c.device == device.name)
                    .map(|c| format!("{} is assigned to {}", c.ip, c.assigned_to))
                    .collect();
                ImportItem::Skip {
                    device: device.clone(),
                    reason: format!("IP conflict: {}", owners.join(", ")),
                }
            } else {
                ImportItem::Submit(device.clone())
            }
        })
        .collect()
}

fn pick(value: &Option<String>, fallback: &Option<String>) -> Option<String> {
    value.clone().or_else(|| fallback.clone())
}

/// 組出 add-device 的請求內容，預設值在這裡套用
pub fn build_request(device: &ParsedDevice, options: &ImportOptions) -> AddDeviceRequest {
    let defaults = &options.defaults;
    let single_interface = device.interfaces.len() == 1;

    let submitted: &[_] = if options.create_interfaces {
        &device.interfaces
    } else {
        &[]
    };

    let interfaces = submitted
        .iter()
        .map(|interface| InterfacePayload {
            name: interface.name.clone(),
            interface_type: interface.interface_type.clone(),
            status: interface
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_INTERFACE_STATUS.to_string()),
            ip_address: interface.ip_address.clone(),
            namespace: pick(&interface.namespace, &defaults.namespace)
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            is_primary_ipv4: interface.is_primary_ipv4.unwrap_or(single_interface),
            enabled: interface.enabled,
            mgmt_only: interface.mgmt_only,
            description: interface.description.clone(),
            mac_address: interface.mac_address.clone(),
            mtu: interface.mtu,
            mode: interface.mode.clone(),
            untagged_vlan: interface.untagged_vlan.clone(),
            tagged_vlans: interface.tagged_vlans.clone(),
            parent_interface: interface.parent_interface.clone(),
            bridge: interface.bridge.clone(),
            lag: interface.lag.clone(),
            tags: interface.tags.clone(),
        })
        .collect();

    AddDeviceRequest {
        name: device.name.clone(),
        role: pick(&device.role, &defaults.role),
        status: pick(&device.status, &defaults.status)
            .unwrap_or_else(|| DEFAULT_DEVICE_STATUS.to_string()),
        location: pick(&device.location, &defaults.location),
        device_type: pick(&device.device_type, &defaults.device_type),
        platform: device.platform.clone(),
        software_version: device.software_version.clone(),
        serial: device.serial.clone(),
        asset_tag: device.asset_tag.clone(),
        description: device.description.clone(),
        manufacturer: device.manufacturer.clone(),
        tags: device.tags.clone(),
        custom_fields: device.custom_fields.clone(),
        interfaces,
        add_prefix: options.add_prefix,
        default_prefix_length: options.default_prefix_length.clone(),
    }
}

pub struct Importer<'a, A: InventoryApi + ?Sized> {
    api: &'a A,
    options: ImportOptions,
}

impl<'a, A: InventoryApi + ?Sized> Importer<'a, A> {
    pub fn new(api: &'a A, options: ImportOptions) -> Self {
        Self { api, options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    async fn attempt(&self, item: ImportItem) -> DeviceImportResult {
        let device = match item {
            ImportItem::Skip { device, reason } => {
                tracing::info!("⏭️ Skipping {}: {}", device.name, reason);
                return DeviceImportResult {
                    device_name: device.name,
                    status: ImportStatus::Skipped,
                    message: Some(reason),
                    device_id: None,
                };
            }
            ImportItem::Submit(device) => device,
        };

        let request = build_request(&device, &self.options);
        match self.api.add_device(&request).await {
            Ok(response) if response.device_created() => {
                tracing::info!("✅ Created {}", device.name);
                DeviceImportResult {
                    device_name: device.name,
                    status: ImportStatus::Success,
                    message: response.message.clone(),
                    device_id: response.device_id.clone(),
                }
            }
            Ok(response)
                if self.options.skip_existing && is_duplicate_message(&response.failure_message()) =>
            {
                tracing::info!("⏭️ {} already exists, skipped", device.name);
                DeviceImportResult {
                    device_name: device.name,
                    status: ImportStatus::Skipped,
                    message: Some(ALREADY_EXISTS_REASON.to_string()),
                    device_id: response.device_id.clone(),
                }
            }
            Ok(response) => {
                let message = response.failure_message();
                tracing::warn!("❌ Backend rejected {}: {}", device.name, message);
                DeviceImportResult {
                    device_name: device.name,
                    status: ImportStatus::Error,
                    message: Some(message),
                    device_id: response.device_id.clone(),
                }
            }
            Err(e) => {
                tracing::warn!("❌ Failed to import {}: {}", device.name, e);
                DeviceImportResult {
                    device_name: device.name,
                    status: ImportStatus::Error,
                    message: Some(e.to_string()),
                    device_id: None,
                }
            }
        }
    }

    /// 逐一送出每個項目；單一裝置失敗不會中斷，每完成一個就回報進度
    pub async fn import<F>(&self, items: Vec<ImportItem>, mut progress: F) -> ImportSummary
    where
        F: FnMut(ImportProgress),
    {
        let total = items.len();
        tracing::info!(
            "🚀 Importing {} device(s) with {} concurrent request(s)",
            total,
            self.options.concurrent_requests.max(1)
        );

        let mut attempts = std::pin::pin!(stream::iter(items)
            .map(|item| self.attempt(item))
            .buffered(self.options.concurrent_requests.max(1)));

        let mut results = Vec::with_capacity(total);
        while let Some(result) = attempts.next().await {
            results.push(result);
            progress(ImportProgress {
                current: results.len(),
                total,
            });
        }

        let summary = ImportSummary::from_results(results);
        tracing::info!(
            "📊 Import finished: {} succeeded, {} failed, {} skipped",
            summary.success,
            summary.failed,
            summary.skipped
        );
        summary
    }

    /// 解析結果還有 error 等級問題時拒絕匯入
    pub async fn import_parse_result<F>(
        &self,
        result: &CsvParseResult,
        flagged: &[IpConflict],
        skip_flagged: bool,
        progress: F,
    ) -> Result<ImportSummary>
    where
        F: FnMut(ImportProgress),
    {
        if !result.can_import() {
            return Err(ImportError::ImportBlocked {
                error_count: result.error_count(),
            });
        }

        let items = plan_import(&result.devices, flagged, skip_flagged);
        Ok(self.import(items, progress).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::MockInventoryApi;
    use crate::core::{ColumnMapping, DeviceValidationError, ParsedInterface};

    fn devices(names: &[&str]) -> Vec<ParsedDevice> {
        names
            .iter()
            .map(|n| {
                ParsedDevice::new(*n)
                    .with_device_type("switch")
                    .with_interface(ParsedInterface::new("eth0", "virtual").with_ip("10.0.0.1/24"))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_mixed_outcomes_and_ordered_progress() {
        let api = MockInventoryApi::new().with_failed_device("b");
        let importer = Importer::new(&api, ImportOptions::default());

        let mut seen = Vec::new();
        let items = plan_import(&devices(&["a", "b", "c"]), &[], false);
        let summary = importer
            .import(items, |p| seen.push((p.current, p.total)))
            .await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(summary.results[1].device_name, "b");
        assert_eq!(summary.results[1].status, ImportStatus::Error);
        assert!(summary.results[1].message.is_some());
    }

    #[tokio::test]
    async fn test_thrown_error_is_recorded_and_run_continues() {
        let api = MockInventoryApi::new().with_erroring_device("a");
        let importer = Importer::new(&api, ImportOptions::default());

        let summary = importer
            .import(plan_import(&devices(&["a", "b"]), &[], false), |_| {})
            .await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.success, 1);
        assert_eq!(api.submitted_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_flagged_devices_are_skipped_without_a_call() {
        let api = MockInventoryApi::new();
        let importer = Importer::new(&api, ImportOptions::default());
        let flagged = vec![IpConflict {
            device: "b".to_string(),
            ip: "10.0.0.1/24".to_string(),
            assigned_to: "z".to_string(),
        }];

        let summary = importer
            .import(plan_import(&devices(&["a", "b"]), &flagged, true), |_| {})
            .await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.results[1].status, ImportStatus::Skipped);
        assert_eq!(api.submitted_names(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_existing_devices_are_skipped_when_requested() {
        let api = MockInventoryApi::new().with_failed_device("b");
        let importer = Importer::new(
            &api,
            ImportOptions {
                skip_existing: true,
                ..Default::default()
            },
        );

        let summary = importer
            .import(plan_import(&devices(&["a", "b"]), &[], false), |_| {})
            .await;

        assert_eq!(summary.success, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.results[1].status, ImportStatus::Skipped);
        assert_eq!(summary.results[1].message.as_deref(), Some(ALREADY_EXISTS_REASON));
        assert_eq!(api.submitted_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_markers() {
        assert!(is_duplicate_message("Device 'sw-1' already exists"));
        assert!(is_duplicate_message("UNIQUE constraint failed: dcim_device.name"));
        assert!(!is_duplicate_message("location not found"));
    }

    #[tokio::test]
    async fn test_concurrent_import_keeps_input_order() {
        let api = MockInventoryApi::new().with_failed_device("c");
        let importer = Importer::new(
            &api,
            ImportOptions {
                concurrent_requests: 4,
                ..Default::default()
            },
        );

        let summary = importer
            .import(plan_import(&devices(&["a", "b", "c", "d"]), &[], false), |_| {})
            .await;

        let names: Vec<&str> = summary.results.iter().map(|r| r.device_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(summary.results[2].status, ImportStatus::Error);
    }

    #[tokio::test]
    async fn test_errors_block_import() {
        let api = MockInventoryApi::new();
        let importer = Importer::new(&api, ImportOptions::default());
        let result = CsvParseResult {
            devices: devices(&["a"]),
            headers: vec![],
            mapping: ColumnMapping::default(),
            validation_errors: vec![DeviceValidationError::error("a", "device_type", "missing")],
            row_count: 1,
        };

        let err = importer
            .import_parse_result(&result, &[], false, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::ImportBlocked { error_count: 1 }));
        assert!(api.submitted_names().is_empty());
    }

    #[test]
    fn test_request_applies_defaults_and_primary_convention() {
        let options = ImportOptions {
            defaults: ImportDefaults {
                role: Some("leaf".to_string()),
                namespace: Some("Lab".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let single = ParsedDevice::new("a")
            .with_interface(ParsedInterface::new("eth0", "virtual").with_ip("10.0.0.1/24"));
        let request = build_request(&single, &options);

        assert_eq!(request.status, "active");
        assert_eq!(request.role.as_deref(), Some("leaf"));
        assert_eq!(request.interfaces[0].status, "active");
        assert_eq!(request.interfaces[0].namespace, "Lab");
        assert!(request.interfaces[0].is_primary_ipv4);
        assert!(request.add_prefix);
        assert_eq!(request.default_prefix_length, "/24");

        let mut second = ParsedInterface::new("eth1", "virtual");
        second.is_primary_ipv4 = Some(true);
        let double = single.clone().with_interface(second);
        let request = build_request(&double, &ImportOptions::default());
        assert!(!request.interfaces[0].is_primary_ipv4);
        assert!(request.interfaces[1].is_primary_ipv4);
        assert_eq!(request.interfaces[0].namespace, "Global");
    }

    #[test]
    fn test_request_carries_device_description_and_can_omit_interfaces() {
        let mut device = ParsedDevice::new("fw-1")
            .with_interface(ParsedInterface::new("eth0", "virtual").with_ip("10.0.0.1/24"));
        device.description = Some("edge firewall".to_string());
        device.manufacturer = Some("Cisco".to_string());

        let request = build_request(&device, &ImportOptions::default());
        assert_eq!(request.description.as_deref(), Some("edge firewall"));
        assert_eq!(request.manufacturer.as_deref(), Some("Cisco"));
        assert_eq!(request.interfaces.len(), 1);

        let options = ImportOptions {
            create_interfaces: false,
            ..Default::default()
        };
        assert!(build_request(&device, &options).interfaces.is_empty());
    }

    #[test]
    fn test_tokio_test_block_on_for_single_import() {
        let api = MockInventoryApi::new();
        let importer = Importer::new(&api, ImportOptions::default());
        let summary = tokio_test::block_on(
            importer.import(plan_import(&devices(&["solo"]), &[], false), |_| {}),
        );
        assert_eq!(summary.success, 1);
        assert_eq!(summary.results[0].device_id.as_deref(), Some("id-solo"));
    }
}
