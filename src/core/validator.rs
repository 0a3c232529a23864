use crate::core::{
    DeviceField, DeviceValidationError, ImportDefaults, InterfaceField, LookupKind, LookupTables,
    ParsedDevice, ParsedInterface,
};
use std::collections::HashSet;
use std::net::IpAddr;

fn resolved<'a>(value: &'a Option<String>, fallback: &'a Option<String>) -> Option<&'a str> {
    value
        .as_deref()
        .or(fallback.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

enum IpCheck {
    Valid,
    MissingPrefix,
    Invalid(String),
}

fn check_ip_address(value: &str) -> IpCheck {
    let value = value.trim();
    match value.split_once('/') {
        None => match value.parse::<IpAddr>() {
            Ok(_) => IpCheck::MissingPrefix,
            Err(_) => IpCheck::Invalid(format!("'{}' is not a valid IP address", value)),
        },
        Some((address, prefix)) => {
            let Ok(address) = address.parse::<IpAddr>() else {
                return IpCheck::Invalid(format!("'{}' is not a valid IP address", value));
            };
            let max_prefix = if address.is_ipv4() { 32 } else { 128 };
            match prefix.parse::<u8>() {
                Ok(length) if length <= max_prefix => IpCheck::Valid,
                _ => IpCheck::Invalid(format!(
                    "'{}' has an invalid prefix length (expected 0-{})",
                    value, max_prefix
                )),
            }
        }
    }
}

fn validate_interface(
    device: &ParsedDevice,
    interface: &ParsedInterface,
    issues: &mut Vec<DeviceValidationError>,
) {
    if interface.name.trim().is_empty() {
        issues.push(DeviceValidationError::error(
            &device.name,
            InterfaceField::Name.key(),
            "Interface name is required",
        ));
    }
    if interface.interface_type.trim().is_empty() {
        issues.push(DeviceValidationError::error(
            &device.name,
            InterfaceField::Type.key(),
            format!("Interface '{}' has no type", interface.name),
        ));
    }

    if let Some(ip) = interface.ip_address.as_deref().filter(|ip| !ip.trim().is_empty()) {
        match check_ip_address(ip) {
            IpCheck::Valid => {}
            IpCheck::MissingPrefix => issues.push(DeviceValidationError::warning(
                &device.name,
                InterfaceField::IpAddress.key(),
                format!(
                    "Interface '{}': '{}' has no prefix length, the default will be used",
                    interface.name, ip
                ),
            )),
            IpCheck::Invalid(message) => issues.push(DeviceValidationError::error(
                &device.name,
                InterfaceField::IpAddress.key(),
                format!("Interface '{}': {}", interface.name, message),
            )),
        }
    }
}

fn validate_device(
    device: &ParsedDevice,
    lookups: &LookupTables,
    defaults: &ImportDefaults,
    issues: &mut Vec<DeviceValidationError>,
) {
    if device.name.trim().is_empty() {
        issues.push(DeviceValidationError::error(
            &device.name,
            DeviceField::Name.key(),
            "Device name is required",
        ));
    }

    match resolved(&device.device_type, &defaults.device_type) {
        None => issues.push(DeviceValidationError::error(
            &device.name,
            DeviceField::DeviceType.key(),
            "Device type is required (set a column or a default)",
        )),
        Some(device_type) => {
            if lookups.is_loaded(LookupKind::DeviceType)
                && lookups.find(LookupKind::DeviceType, device_type).is_none()
            {
                issues.push(DeviceValidationError::error(
                    &device.name,
                    DeviceField::DeviceType.key(),
                    format!("Device type '{}' does not exist", device_type),
                ));
            }
        }
    }

    for (kind, field, value) in [
        (LookupKind::Role, DeviceField::Role, resolved(&device.role, &defaults.role)),
        (
            LookupKind::Location,
            DeviceField::Location,
            resolved(&device.location, &defaults.location),
        ),
    ] {
        if let Some(value) = value {
            if lookups.is_loaded(kind) && lookups.find(kind, value).is_none() {
                issues.push(DeviceValidationError::warning(
                    &device.name,
                    field.key(),
                    format!("Unknown {} '{}', the backend will decide", field.key(), value),
                ));
            }
        }
    }

    let mut seen = HashSet::new();
    for interface in &device.interfaces {
        validate_interface(device, interface, issues);
        if !interface.name.trim().is_empty() && !seen.insert(interface.name.as_str()) {
            issues.push(DeviceValidationError::error(
                &device.name,
                InterfaceField::Name.key(),
                format!("Interface '{}' is listed more than once", interface.name),
            ));
        }
    }
}

/// 檢查合併後的裝置，只產生問題清單，不修改裝置
pub fn validate_devices(
    devices: &[ParsedDevice],
    lookups: &LookupTables,
    defaults: &ImportDefaults,
) -> Vec<DeviceValidationError> {
    let mut issues = Vec::new();
    for device in devices {
        validate_device(device, lookups, defaults, &mut issues);
    }
    issues
}
