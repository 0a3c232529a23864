use crate::core::{ColumnMapping, DeviceField, InterfaceField, TargetField, CUSTOM_FIELD_PREFIX};
use std::collections::HashMap;

/// 常見表頭同義字 (已正規化為小寫、底線)
static HEADER_SYNONYMS: &[(&str, TargetField)] = &[
    ("hostname", TargetField::Device(DeviceField::Name)),
    ("host", TargetField::Device(DeviceField::Name)),
    ("device", TargetField::Device(DeviceField::Name)),
    ("device_name", TargetField::Device(DeviceField::Name)),
    ("devicename", TargetField::Device(DeviceField::Name)),
    ("device_role", TargetField::Device(DeviceField::Role)),
    ("device_status", TargetField::Device(DeviceField::Status)),
    ("site", TargetField::Device(DeviceField::Location)),
    ("site_name", TargetField::Device(DeviceField::Location)),
    ("location_name", TargetField::Device(DeviceField::Location)),
    ("devicetype", TargetField::Device(DeviceField::DeviceType)),
    ("model", TargetField::Device(DeviceField::DeviceType)),
    ("device_model", TargetField::Device(DeviceField::DeviceType)),
    ("os", TargetField::Device(DeviceField::Platform)),
    ("version", TargetField::Device(DeviceField::SoftwareVersion)),
    ("sw_version", TargetField::Device(DeviceField::SoftwareVersion)),
    ("os_version", TargetField::Device(DeviceField::SoftwareVersion)),
    ("serial_number", TargetField::Device(DeviceField::Serial)),
    ("sn", TargetField::Device(DeviceField::Serial)),
    ("asset", TargetField::Device(DeviceField::AssetTag)),
    ("device_tags", TargetField::Device(DeviceField::Tags)),
    ("device_description", TargetField::Device(DeviceField::Description)),
    ("vendor", TargetField::Device(DeviceField::Manufacturer)),
    ("interface", TargetField::Interface(InterfaceField::Name)),
    ("ifname", TargetField::Interface(InterfaceField::Name)),
    ("port", TargetField::Interface(InterfaceField::Name)),
    ("if_type", TargetField::Interface(InterfaceField::Type)),
    ("port_type", TargetField::Interface(InterfaceField::Type)),
    ("interface_ip", TargetField::Interface(InterfaceField::IpAddress)),
    ("ip", TargetField::Interface(InterfaceField::IpAddress)),
    ("ip_address", TargetField::Interface(InterfaceField::IpAddress)),
    ("primary_ip", TargetField::Interface(InterfaceField::IpAddress)),
    ("mgmt_ip", TargetField::Interface(InterfaceField::IpAddress)),
    ("ip_namespace", TargetField::Interface(InterfaceField::Namespace)),
    ("namespace", TargetField::Interface(InterfaceField::Namespace)),
    ("is_primary_ipv4", TargetField::Interface(InterfaceField::IsPrimaryIpv4)),
    ("primary_ipv4", TargetField::Interface(InterfaceField::IsPrimaryIpv4)),
    ("enabled", TargetField::Interface(InterfaceField::Enabled)),
    ("mgmt_only", TargetField::Interface(InterfaceField::MgmtOnly)),
    ("mac", TargetField::Interface(InterfaceField::MacAddress)),
    ("mac_address", TargetField::Interface(InterfaceField::MacAddress)),
    ("mtu", TargetField::Interface(InterfaceField::Mtu)),
    ("vlan_mode", TargetField::Interface(InterfaceField::Mode)),
    ("untagged_vlan", TargetField::Interface(InterfaceField::UntaggedVlan)),
    ("tagged_vlans", TargetField::Interface(InterfaceField::TaggedVlans)),
    ("parent_interface", TargetField::Interface(InterfaceField::ParentInterface)),
    ("bridge", TargetField::Interface(InterfaceField::Bridge)),
    ("lag", TargetField::Interface(InterfaceField::Lag)),
];

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// 沒有手動設定時的預設對應
pub fn default_target(header: &str) -> TargetField {
    if let Some(custom) = header.strip_prefix(CUSTOM_FIELD_PREFIX) {
        if !custom.is_empty() {
            return TargetField::CustomField(custom.to_string());
        }
    }

    let normalized = normalize_header(header);

    if let Some(field) = DeviceField::from_key(&normalized) {
        return TargetField::Device(field);
    }
    if let Some(field) = InterfaceField::from_key(&normalized) {
        return TargetField::Interface(field);
    }

    HEADER_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == normalized)
        .map(|(_, target)| target.clone())
        .unwrap_or(TargetField::Unmapped)
}

/// 為每個表頭決定目標欄位；`cf_` 前綴優先，其次是手動設定，最後是預設字典
pub fn map_columns(headers: &[String], overrides: &HashMap<String, TargetField>) -> ColumnMapping {
    let entries = headers
        .iter()
        .map(|header| {
            let target = match header.strip_prefix(CUSTOM_FIELD_PREFIX) {
                Some(custom) if !custom.is_empty() => TargetField::CustomField(custom.to_string()),
                _ => overrides
                    .get(header)
                    .cloned()
                    .unwrap_or_else(|| default_target(header)),
            };
            (header.clone(), target)
        })
        .collect();

    ColumnMapping::new(entries)
}
