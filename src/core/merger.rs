use crate::core::{
    ColumnMapping, DeviceField, DeviceValidationError, InterfaceField, ParsedDevice,
    ParsedInterface, RawRow, TargetField, CUSTOM_FIELD_PREFIX,
};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub devices: Vec<ParsedDevice>,
    pub issues: Vec<DeviceValidationError>,
}

/// 依對應表取出的單列數值；空白儲存格不會出現在這裡
#[derive(Debug, Default)]
struct RowValues {
    device: BTreeMap<DeviceField, String>,
    interface: BTreeMap<InterfaceField, String>,
    custom_fields: BTreeMap<String, String>,
}

impl RowValues {
    fn project(row: &RawRow, mapping: &ColumnMapping) -> Self {
        let mut values = RowValues::default();
        for (header, cell) in &row.cells {
            let value = cell.trim();
            if value.is_empty() {
                continue;
            }
            match mapping.target_for(header) {
                TargetField::Device(field) => {
                    values.device.insert(*field, value.to_string());
                }
                TargetField::Interface(field) => {
                    values.interface.insert(*field, value.to_string());
                }
                TargetField::CustomField(key) => {
                    values.custom_fields.insert(key.clone(), value.to_string());
                }
                TargetField::Unmapped => {}
            }
        }
        values
    }

    fn device_value(&self, field: DeviceField) -> Option<String> {
        self.device.get(&field).cloned()
    }

    fn interface_value(&self, field: InterfaceField) -> Option<String> {
        self.interface.get(&field).cloned()
    }
}

fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn build_device(name: &str, values: &RowValues) -> ParsedDevice {
    let mut device = ParsedDevice::new(name);
    device.role = values.device_value(DeviceField::Role);
    device.status = values.device_value(DeviceField::Status);
    device.location = values.device_value(DeviceField::Location);
    device.device_type = values.device_value(DeviceField::DeviceType);
    device.platform = values.device_value(DeviceField::Platform);
    device.software_version = values.device_value(DeviceField::SoftwareVersion);
    device.serial = values.device_value(DeviceField::Serial);
    device.asset_tag = values.device_value(DeviceField::AssetTag);
    device.description = values.device_value(DeviceField::Description);
    device.manufacturer = values.device_value(DeviceField::Manufacturer);
    device.tags = split_list(values.device.get(&DeviceField::Tags));
    device.custom_fields = values.custom_fields.clone();
    device
}

/// 只有同時有名稱與類型的介面才算完整
fn build_interface(
    device_name: &str,
    line: u64,
    values: &RowValues,
    issues: &mut Vec<DeviceValidationError>,
) -> Option<ParsedInterface> {
    if values.interface.is_empty() {
        return None;
    }

    let name = values.interface_value(InterfaceField::Name);
    let interface_type = values.interface_value(InterfaceField::Type);

    let (name, interface_type) = match (name, interface_type) {
        (Some(name), Some(interface_type)) => (name, interface_type),
        (name, interface_type) => {
            if name.is_none() {
                issues.push(DeviceValidationError::error(
                    device_name,
                    InterfaceField::Name.key(),
                    format!("Row {}: interface data given without an interface name", line),
                ));
            }
            if interface_type.is_none() {
                issues.push(DeviceValidationError::error(
                    device_name,
                    InterfaceField::Type.key(),
                    format!("Row {}: interface data given without an interface type", line),
                ));
            }
            return None;
        }
    };

    let mut interface = ParsedInterface::new(name, interface_type);
    interface.status = values.interface_value(InterfaceField::Status);
    interface.ip_address = values.interface_value(InterfaceField::IpAddress);
    interface.namespace = values.interface_value(InterfaceField::Namespace);
    interface.description = values.interface_value(InterfaceField::Description);
    interface.mac_address = values.interface_value(InterfaceField::MacAddress);
    interface.mode = values.interface_value(InterfaceField::Mode);
    interface.untagged_vlan = values.interface_value(InterfaceField::UntaggedVlan);
    interface.tagged_vlans = split_list(values.interface.get(&InterfaceField::TaggedVlans));
    interface.parent_interface = values.interface_value(InterfaceField::ParentInterface);
    interface.bridge = values.interface_value(InterfaceField::Bridge);
    interface.lag = values.interface_value(InterfaceField::Lag);
    interface.tags = split_list(values.interface.get(&InterfaceField::Tags));

    if let Some(raw) = values.interface.get(&InterfaceField::Enabled) {
        interface.enabled = parse_flag(raw) != Some(false);
    }
    if let Some(raw) = values.interface.get(&InterfaceField::MgmtOnly) {
        interface.mgmt_only = parse_flag(raw) == Some(true);
    }
    if let Some(raw) = values.interface.get(&InterfaceField::IsPrimaryIpv4) {
        interface.is_primary_ipv4 = parse_flag(raw);
        if interface.is_primary_ipv4.is_none() {
            issues.push(DeviceValidationError::warning(
                device_name,
                InterfaceField::IsPrimaryIpv4.key(),
                format!("Row {}: '{}' is not a yes/no value and was ignored", line, raw),
            ));
        }
    }
    if let Some(raw) = values.interface.get(&InterfaceField::Mtu) {
        match raw.parse::<u32>() {
            Ok(mtu) => interface.mtu = Some(mtu),
            Err(_) => issues.push(DeviceValidationError::warning(
                device_name,
                InterfaceField::Mtu.key(),
                format!("Row {}: MTU '{}' is not a number and was ignored", line, raw),
            )),
        }
    }

    Some(interface)
}

/// 依裝置名稱合併多列 (一列一個介面的 CSV 格式)
///
/// 同名裝置的裝置層欄位必須每列一致，不一致時記錄 error，不會自行挑選其中一個值。
pub fn merge_rows(rows: &[RawRow], mapping: &ColumnMapping) -> MergeOutcome {
    let compared_fields: Vec<DeviceField> = DeviceField::ALL
        .into_iter()
        .filter(|f| *f != DeviceField::Name && mapping.is_mapped(&TargetField::Device(*f)))
        .collect();
    let custom_keys = mapping.custom_field_keys();

    let mut devices: Vec<ParsedDevice> = Vec::new();
    let mut first_rows: HashMap<String, (usize, RowValues)> = HashMap::new();
    let mut issues = Vec::new();

    for row in rows {
        let values = RowValues::project(row, mapping);

        let Some(name) = values.device_value(DeviceField::Name) else {
            issues.push(DeviceValidationError::error(
                format!("row {}", row.line),
                DeviceField::Name.key(),
                format!("Row {} has no device name and was skipped", row.line),
            ));
            continue;
        };

        let interface = build_interface(&name, row.line, &values, &mut issues);

        match first_rows.get(&name) {
            Some((position, first)) => {
                for field in &compared_fields {
                    let expected = first.device.get(field);
                    let actual = values.device.get(field);
                    if expected != actual {
                        issues.push(DeviceValidationError::error(
                            name.as_str(),
                            field.key(),
                            format!(
                                "Row {}: '{}' differs from '{}' given earlier for this device",
                                row.line,
                                actual.map(String::as_str).unwrap_or(""),
                                expected.map(String::as_str).unwrap_or("")
                            ),
                        ));
                    }
                }

                for key in &custom_keys {
                    let expected = first.custom_fields.get(*key);
                    let actual = values.custom_fields.get(*key);
                    if expected != actual {
                        issues.push(DeviceValidationError::error(
                            name.as_str(),
                            format!("{}{}", CUSTOM_FIELD_PREFIX, key),
                            format!(
                                "Row {}: '{}' differs from '{}' given earlier for this device",
                                row.line,
                                actual.map(String::as_str).unwrap_or(""),
                                expected.map(String::as_str).unwrap_or("")
                            ),
                        ));
                    }
                }

                if let Some(interface) = interface {
                    devices[*position].interfaces.push(interface);
                }
            }
            None => {
                let mut device = build_device(&name, &values);
                if let Some(interface) = interface {
                    device.interfaces.push(interface);
                }
                first_rows.insert(name, (devices.len(), values));
                devices.push(device);
            }
        }
    }

    tracing::debug!(
        "Merged {} row(s) into {} device(s) with {} issue(s)",
        rows.len(),
        devices.len(),
        issues.len()
    );

    MergeOutcome { devices, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapper::map_columns;
    use crate::core::Severity;

    fn table(headers: &[&str], rows: &[&[&str]]) -> (ColumnMapping, Vec<RawRow>) {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let mapping = map_columns(&headers, &HashMap::new());
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, cells)| RawRow {
                line: i as u64 + 2,
                cells: headers
                    .iter()
                    .zip(cells.iter())
                    .map(|(h, c)| (h.clone(), c.to_string()))
                    .collect(),
            })
            .collect();
        (mapping, rows)
    }

    const HEADERS: &[&str] = &[
        "name",
        "role",
        "device_type",
        "interface_name",
        "interface_type",
        "interface_ip_address",
    ];

    #[test]
    fn test_rows_with_same_name_merge_into_one_device() {
        let (mapping, rows) = table(
            HEADERS,
            &[
                &["sw-1", "leaf", "switch", "eth0", "1000base-t", "10.0.0.1/24"],
                &["sw-1", "leaf", "switch", "eth1", "1000base-t", ""],
                &["sw-1", "leaf", "switch", "", "", ""],
            ],
        );

        let outcome = merge_rows(&rows, &mapping);

        assert!(outcome.issues.is_empty());
        assert_eq!(outcome.devices.len(), 1);
        let device = &outcome.devices[0];
        assert_eq!(device.interfaces.len(), 2);
        assert_eq!(device.interfaces[0].name, "eth0");
        assert_eq!(device.interfaces[0].ip_address.as_deref(), Some("10.0.0.1/24"));
        assert_eq!(device.interfaces[1].name, "eth1");
        assert_eq!(device.interfaces[1].ip_address, None);
    }

    #[test]
    fn test_device_field_mismatch_is_an_error() {
        let (mapping, rows) = table(
            HEADERS,
            &[
                &["sw-2", "leaf", "switch", "eth0", "virtual", ""],
                &["sw-2", "spine", "switch", "eth1", "virtual", ""],
            ],
        );

        let outcome = merge_rows(&rows, &mapping);

        assert_eq!(outcome.devices.len(), 1);
        assert_eq!(outcome.devices[0].role.as_deref(), Some("leaf"));
        assert_eq!(outcome.devices[0].interfaces.len(), 2);
        assert_eq!(outcome.issues.len(), 1);
        let issue = &outcome.issues[0];
        assert_eq!(issue.device_name, "sw-2");
        assert_eq!(issue.field, "role");
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.message.contains("Row 3"));
    }

    #[test]
    fn test_blank_cell_on_later_row_counts_as_mismatch() {
        let (mapping, rows) = table(
            HEADERS,
            &[
                &["sw-3", "leaf", "switch", "eth0", "virtual", ""],
                &["sw-3", "", "switch", "eth1", "virtual", ""],
            ],
        );

        let outcome = merge_rows(&rows, &mapping);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].field, "role");
    }

    #[test]
    fn test_custom_field_mismatch_is_an_error() {
        let (mapping, rows) = table(
            &["name", "cf_rack"],
            &[&["sw-4", "R1"], &["sw-4", "R2"]],
        );

        let outcome = merge_rows(&rows, &mapping);
        assert_eq!(outcome.devices[0].custom_fields.get("rack").map(String::as_str), Some("R1"));
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].field, "cf_rack");
    }

    #[test]
    fn test_description_and_manufacturer_follow_device_rules() {
        let (mapping, rows) = table(
            &["name", "description", "manufacturer", "interface_name", "interface_type"],
            &[
                &["fw-1", "edge firewall", "Cisco", "eth0", "virtual"],
                &["fw-1", "edge firewall", "Juniper", "eth1", "virtual"],
            ],
        );

        let outcome = merge_rows(&rows, &mapping);

        let device = &outcome.devices[0];
        assert_eq!(device.description.as_deref(), Some("edge firewall"));
        assert_eq!(device.manufacturer.as_deref(), Some("Cisco"));
        assert_eq!(device.interfaces.len(), 2);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].field, "manufacturer");
        assert_eq!(outcome.issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_rows_without_name_are_skipped() {
        let (mapping, rows) = table(
            HEADERS,
            &[
                &["", "leaf", "switch", "eth0", "virtual", ""],
                &["sw-5", "leaf", "switch", "eth0", "virtual", ""],
            ],
        );

        let outcome = merge_rows(&rows, &mapping);

        assert_eq!(outcome.devices.len(), 1);
        assert_eq!(outcome.devices[0].name, "sw-5");
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].device_name, "row 2");
        assert_eq!(outcome.issues[0].field, "name");
    }

    #[test]
    fn test_partial_interface_is_reported_not_added() {
        let (mapping, rows) = table(
            HEADERS,
            &[&["sw-6", "leaf", "switch", "eth0", "", "10.0.0.6/24"]],
        );

        let outcome = merge_rows(&rows, &mapping);

        assert!(outcome.devices[0].interfaces.is_empty());
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0].field, "interface_type");
    }

    #[test]
    fn test_device_order_and_case_sensitive_identity() {
        let (mapping, rows) = table(
            &["name", "interface_name", "interface_type"],
            &[
                &["b", "e0", "virtual"],
                &["a", "e0", "virtual"],
                &["B", "e0", "virtual"],
                &["b", "e1", "virtual"],
            ],
        );

        let outcome = merge_rows(&rows, &mapping);

        let names: Vec<&str> = outcome.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "B"]);
        assert_eq!(outcome.devices[0].interfaces.len(), 2);
    }

    #[test]
    fn test_interface_value_parsing() {
        let (mapping, rows) = table(
            &[
                "name",
                "interface_name",
                "interface_type",
                "interface_enabled",
                "interface_mgmt_only",
                "interface_mtu",
                "interface_tags",
                "interface_is_primary_ipv4",
            ],
            &[
                &["sw-7", "eth0", "virtual", "no", "yes", "9000", "a, b,", "true"],
                &["sw-7", "eth1", "virtual", "", "", "jumbo", "", "maybe"],
            ],
        );

        let outcome = merge_rows(&rows, &mapping);
        let interfaces = &outcome.devices[0].interfaces;

        assert!(!interfaces[0].enabled);
        assert!(interfaces[0].mgmt_only);
        assert_eq!(interfaces[0].mtu, Some(9000));
        assert_eq!(interfaces[0].tags, vec!["a", "b"]);
        assert_eq!(interfaces[0].is_primary_ipv4, Some(true));

        assert!(interfaces[1].enabled);
        assert!(!interfaces[1].mgmt_only);
        assert_eq!(interfaces[1].mtu, None);
        assert_eq!(interfaces[1].is_primary_ipv4, None);

        assert_eq!(outcome.issues.len(), 2);
        assert!(outcome
            .issues
            .iter()
            .all(|i| i.severity == Severity::Warning));
    }
}
