use crate::utils::error::ImportError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// CSV 的一列資料，依表頭順序保存 (表頭 → 儲存格)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub cells: Vec<(String, String)>,
}

impl RawRow {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceField {
    Name,
    Role,
    Status,
    Location,
    DeviceType,
    Platform,
    SoftwareVersion,
    Serial,
    AssetTag,
    Tags,
    Description,
    Manufacturer,
}

impl DeviceField {
    pub const ALL: [DeviceField; 12] = [
        DeviceField::Name,
        DeviceField::Role,
        DeviceField::Status,
        DeviceField::Location,
        DeviceField::DeviceType,
        DeviceField::Platform,
        DeviceField::SoftwareVersion,
        DeviceField::Serial,
        DeviceField::AssetTag,
        DeviceField::Tags,
        DeviceField::Description,
        DeviceField::Manufacturer,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DeviceField::Name => "name",
            DeviceField::Role => "role",
            DeviceField::Status => "status",
            DeviceField::Location => "location",
            DeviceField::DeviceType => "device_type",
            DeviceField::Platform => "platform",
            DeviceField::SoftwareVersion => "software_version",
            DeviceField::Serial => "serial",
            DeviceField::AssetTag => "asset_tag",
            DeviceField::Tags => "tags",
            DeviceField::Description => "description",
            DeviceField::Manufacturer => "manufacturer",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InterfaceField {
    Name,
    Type,
    Status,
    IpAddress,
    Namespace,
    IsPrimaryIpv4,
    Enabled,
    MgmtOnly,
    Description,
    MacAddress,
    Mtu,
    Mode,
    UntaggedVlan,
    TaggedVlans,
    ParentInterface,
    Bridge,
    Lag,
    Tags,
}

impl InterfaceField {
    pub const ALL: [InterfaceField; 18] = [
        InterfaceField::Name,
        InterfaceField::Type,
        InterfaceField::Status,
        InterfaceField::IpAddress,
        InterfaceField::Namespace,
        InterfaceField::IsPrimaryIpv4,
        InterfaceField::Enabled,
        InterfaceField::MgmtOnly,
        InterfaceField::Description,
        InterfaceField::MacAddress,
        InterfaceField::Mtu,
        InterfaceField::Mode,
        InterfaceField::UntaggedVlan,
        InterfaceField::TaggedVlans,
        InterfaceField::ParentInterface,
        InterfaceField::Bridge,
        InterfaceField::Lag,
        InterfaceField::Tags,
    ];

    /// 完整的目標欄位鍵，一律帶 `interface_` 前綴
    pub fn key(&self) -> &'static str {
        match self {
            InterfaceField::Name => "interface_name",
            InterfaceField::Type => "interface_type",
            InterfaceField::Status => "interface_status",
            InterfaceField::IpAddress => "interface_ip_address",
            InterfaceField::Namespace => "interface_namespace",
            InterfaceField::IsPrimaryIpv4 => "interface_is_primary_ipv4",
            InterfaceField::Enabled => "interface_enabled",
            InterfaceField::MgmtOnly => "interface_mgmt_only",
            InterfaceField::Description => "interface_description",
            InterfaceField::MacAddress => "interface_mac_address",
            InterfaceField::Mtu => "interface_mtu",
            InterfaceField::Mode => "interface_mode",
            InterfaceField::UntaggedVlan => "interface_untagged_vlan",
            InterfaceField::TaggedVlans => "interface_tagged_vlans",
            InterfaceField::ParentInterface => "interface_parent_interface",
            InterfaceField::Bridge => "interface_bridge",
            InterfaceField::Lag => "interface_lag",
            InterfaceField::Tags => "interface_tags",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

pub const CUSTOM_FIELD_PREFIX: &str = "cf_";
pub const UNMAPPED: &str = "unmapped";

/// CSV 欄位對應的目標
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetField {
    Device(DeviceField),
    Interface(InterfaceField),
    CustomField(String),
    Unmapped,
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetField::Device(field) => f.write_str(field.key()),
            TargetField::Interface(field) => f.write_str(field.key()),
            TargetField::CustomField(key) => write!(f, "{}{}", CUSTOM_FIELD_PREFIX, key),
            TargetField::Unmapped => f.write_str(UNMAPPED),
        }
    }
}

impl FromStr for TargetField {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if key == UNMAPPED {
            return Ok(TargetField::Unmapped);
        }
        if let Some(custom) = key.strip_prefix(CUSTOM_FIELD_PREFIX) {
            if !custom.is_empty() {
                return Ok(TargetField::CustomField(custom.to_string()));
            }
        }
        if let Some(field) = DeviceField::from_key(key) {
            return Ok(TargetField::Device(field));
        }
        if let Some(field) = InterfaceField::from_key(key) {
            return Ok(TargetField::Interface(field));
        }
        Err(ImportError::InvalidConfigValueError {
            field: "mapping".to_string(),
            value: s.to_string(),
            reason: "Unknown target field".to_string(),
        })
    }
}

/// 每個表頭都有一個目標 (可能是 unmapped)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<(String, TargetField)>,
}

impl ColumnMapping {
    pub fn new(entries: Vec<(String, TargetField)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, TargetField)] {
        &self.entries
    }

    pub fn target_for(&self, header: &str) -> &TargetField {
        self.entries
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, t)| t)
            .unwrap_or(&TargetField::Unmapped)
    }

    pub fn is_mapped(&self, target: &TargetField) -> bool {
        self.entries.iter().any(|(_, t)| t == target)
    }

    pub fn custom_field_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(_, t)| match t {
                TargetField::CustomField(key) => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }

    /// 被兩個以上表頭對應到的目標欄位 (unmapped 除外)
    pub fn duplicate_targets(&self) -> Vec<(TargetField, Vec<String>)> {
        let mut seen: Vec<(TargetField, Vec<String>)> = Vec::new();
        for (header, target) in &self.entries {
            if *target == TargetField::Unmapped {
                continue;
            }
            match seen.iter_mut().find(|(t, _)| t == target) {
                Some((_, headers)) => headers.push(header.clone()),
                None => seen.push((target.clone(), vec![header.clone()])),
            }
        }
        seen.into_iter().filter(|(_, h)| h.len() > 1).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedInterface {
    pub name: String,
    #[serde(rename = "type")]
    pub interface_type: String,
    pub status: Option<String>,
    pub ip_address: Option<String>,
    pub namespace: Option<String>,
    pub is_primary_ipv4: Option<bool>,
    pub enabled: bool,
    pub mgmt_only: bool,
    pub description: Option<String>,
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    pub mode: Option<String>,
    pub untagged_vlan: Option<String>,
    #[serde(default)]
    pub tagged_vlans: Vec<String>,
    pub parent_interface: Option<String>,
    pub bridge: Option<String>,
    pub lag: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ParsedInterface {
    pub fn new(name: impl Into<String>, interface_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interface_type: interface_type.into(),
            status: None,
            ip_address: None,
            namespace: None,
            is_primary_ipv4: None,
            enabled: true,
            mgmt_only: false,
            description: None,
            mac_address: None,
            mtu: None,
            mode: None,
            untagged_vlan: None,
            tagged_vlans: Vec::new(),
            parent_interface: None,
            bridge: None,
            lag: None,
            tags: Vec::new(),
        }
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDevice {
    pub name: String,
    pub role: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub device_type: Option<String>,
    pub platform: Option<String>,
    pub software_version: Option<String>,
    pub serial: Option<String>,
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub interfaces: Vec<ParsedInterface>,
}

impl ParsedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            status: None,
            location: None,
            device_type: None,
            platform: None,
            software_version: None,
            serial: None,
            asset_tag: None,
            description: None,
            manufacturer: None,
            tags: Vec::new(),
            custom_fields: BTreeMap::new(),
            interfaces: Vec::new(),
        }
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn with_interface(mut self, interface: ParsedInterface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// 有填 IP 的介面
    pub fn addressed_interfaces(&self) -> impl Iterator<Item = (&ParsedInterface, &str)> {
        self.interfaces.iter().filter_map(|i| {
            i.ip_address
                .as_deref()
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(|ip| (i, ip))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// 驗證問題只描述紀錄，不會修改紀錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceValidationError {
    pub device_name: String,
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl DeviceValidationError {
    pub fn error(
        device_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(
        device_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvParseResult {
    pub devices: Vec<ParsedDevice>,
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    pub validation_errors: Vec<DeviceValidationError>,
    pub row_count: usize,
}

impl CsvParseResult {
    pub fn error_count(&self) -> usize {
        self.validation_errors.iter().filter(|e| e.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.validation_errors
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }

    /// 只要有一個 error 等級的問題就不能匯入
    pub fn can_import(&self) -> bool {
        self.error_count() == 0
    }

    pub fn issues_for<'a>(
        &'a self,
        device_name: &'a str,
    ) -> impl Iterator<Item = &'a DeviceValidationError> + 'a {
        self.validation_errors
            .iter()
            .filter(move |e| e.device_name == device_name)
    }

    pub fn device(&self, name: &str) -> Option<&ParsedDevice> {
        self.devices.iter().find(|d| d.name == name)
    }
}

/// 預設值：CSV 沒填時帶入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDefaults {
    pub role: Option<String>,
    pub location: Option<String>,
    pub device_type: Option<String>,
    pub status: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpConflict {
    pub device: String,
    pub ip: String,
    pub assigned_to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceImportResult {
    pub device_name: String,
    pub status: ImportStatus,
    pub message: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<DeviceImportResult>,
}

impl ImportSummary {
    pub fn from_results(results: Vec<DeviceImportResult>) -> Self {
        let count = |status: ImportStatus| results.iter().filter(|r| r.status == status).count();
        let success = count(ImportStatus::Success);
        let failed = count(ImportStatus::Error);
        let skipped = count(ImportStatus::Skipped);

        Self {
            total: results.len(),
            success,
            failed,
            skipped,
            results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportProgress {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Role,
    Location,
    DeviceType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

impl LookupEntry {
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            model: None,
            display: None,
        }
    }

    pub fn model(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            model: Some(model.into()),
            display: None,
        }
    }

    /// id 完全相同，或 name / model / display 不分大小寫相同
    pub fn matches(&self, value: &str) -> bool {
        let value = value.trim();
        self.id == value
            || [&self.name, &self.model, &self.display]
                .into_iter()
                .flatten()
                .any(|label| label.eq_ignore_ascii_case(value))
    }

    pub fn label(&self) -> &str {
        self.display
            .as_deref()
            .or(self.name.as_deref())
            .or(self.model.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTables {
    pub roles: Vec<LookupEntry>,
    pub locations: Vec<LookupEntry>,
    pub device_types: Vec<LookupEntry>,
}

impl LookupTables {
    pub fn table(&self, kind: LookupKind) -> &[LookupEntry] {
        match kind {
            LookupKind::Role => &self.roles,
            LookupKind::Location => &self.locations,
            LookupKind::DeviceType => &self.device_types,
        }
    }

    /// 空表代表尚未載入
    pub fn is_loaded(&self, kind: LookupKind) -> bool {
        !self.table(kind).is_empty()
    }

    pub fn find(&self, kind: LookupKind, value: &str) -> Option<&LookupEntry> {
        self.table(kind).iter().find(|e| e.matches(value))
    }

    /// 預覽用：把 id 轉成可讀名稱，找不到就原樣回傳
    pub fn label_for<'a>(&'a self, kind: LookupKind, value: &'a str) -> &'a str {
        self.find(kind, value).map(LookupEntry::label).unwrap_or(value)
    }
}

/// 後端預設的 CSV 設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvDefaults {
    #[serde(default)]
    pub csv_delimiter: Option<String>,
    #[serde(default)]
    pub csv_quote_char: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub interface_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub namespace: String,
    pub is_primary_ipv4: bool,
    pub enabled: bool,
    pub mgmt_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tagged_vlans: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_interface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lag: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
}

/// add-device 端點的請求內容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDeviceRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom_fields: BTreeMap<String, String>,
    pub interfaces: Vec<InterfacePayload>,
    pub add_prefix: bool,
    pub default_prefix_length: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    #[serde(default)]
    pub step1_device: WorkflowStep,
    #[serde(flatten)]
    pub other_steps: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddDeviceResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub workflow_status: WorkflowStatus,
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
}

impl AddDeviceResponse {
    /// 以建立裝置這一步的狀態為準
    pub fn device_created(&self) -> bool {
        self.workflow_status
            .step1_device
            .status
            .eq_ignore_ascii_case("success")
    }

    pub fn failure_message(&self) -> String {
        let step = &self.workflow_status.step1_device;
        if !step.message.is_empty() {
            step.message.clone()
        } else if let Some(message) = &self.message {
            message.clone()
        } else if step.status.is_empty() {
            "Backend did not report a device creation status".to_string()
        } else {
            format!("Device creation step reported '{}'", step.status)
        }
    }
}
