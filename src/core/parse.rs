use crate::core::mapper::map_columns;
use crate::core::merger::merge_rows;
use crate::core::tokenizer::{tokenize, CsvOptions};
use crate::core::validator::validate_devices;
use crate::core::{CsvParseResult, CsvTable, ImportDefaults, LookupTables, TargetField};
use crate::utils::error::{ImportError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub csv: CsvOptions,
    pub overrides: HashMap<String, TargetField>,
    pub defaults: ImportDefaults,
}

/// 完整解析：切割 → 欄位對應 → 合併 → 驗證
pub fn parse_csv(
    bytes: &[u8],
    options: &ParseOptions,
    lookups: &LookupTables,
) -> Result<CsvParseResult> {
    let table = tokenize(bytes, &options.csv)?;
    parse_table(&table, &options.overrides, &options.defaults, lookups)
}

/// 已切割好的表格重新套用欄位對應，不需要重讀檔案
pub fn parse_table(
    table: &CsvTable,
    overrides: &HashMap<String, TargetField>,
    defaults: &ImportDefaults,
    lookups: &LookupTables,
) -> Result<CsvParseResult> {
    let mapping = map_columns(&table.headers, overrides);

    if let Some((target, headers)) = mapping.duplicate_targets().into_iter().next() {
        return Err(ImportError::MappingConflict {
            target: target.to_string(),
            headers,
        });
    }

    let outcome = merge_rows(&table.rows, &mapping);
    let mut validation_errors = outcome.issues;
    validation_errors.extend(validate_devices(&outcome.devices, lookups, defaults));

    let result = CsvParseResult {
        devices: outcome.devices,
        headers: table.headers.clone(),
        mapping,
        validation_errors,
        row_count: table.rows.len(),
    };

    tracing::info!(
        "📄 Parsed {} row(s) into {} device(s): {} error(s), {} warning(s)",
        result.row_count,
        result.devices.len(),
        result.error_count(),
        result.warning_count()
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeviceField, LookupEntry, Severity};

    #[test]
    fn test_header_only_csv_parses_to_nothing() {
        let result = parse_csv(
            b"name;device_type\n",
            &ParseOptions::default(),
            &LookupTables::default(),
        )
        .unwrap();

        assert_eq!(result.row_count, 0);
        assert!(result.devices.is_empty());
        assert!(result.can_import());
    }

    #[test]
    fn test_single_device_with_interface() {
        let csv = "name;device_type;interface_name;interface_type;interface_ip_address\n\
                   dev-1;switch;eth0;1000BASE-T;10.0.0.1/24";
        let result = parse_csv(
            csv.as_bytes(),
            &ParseOptions::default(),
            &LookupTables::default(),
        )
        .unwrap();

        assert_eq!(result.devices.len(), 1);
        let device = &result.devices[0];
        assert_eq!(device.name, "dev-1");
        assert_eq!(device.device_type.as_deref(), Some("switch"));
        assert_eq!(device.interfaces.len(), 1);
        assert_eq!(device.interfaces[0].name, "eth0");
        assert_eq!(device.interfaces[0].ip_address.as_deref(), Some("10.0.0.1/24"));
        assert!(result.validation_errors.is_empty());
    }

    #[test]
    fn test_two_headers_on_one_target_is_rejected() {
        let mut options = ParseOptions::default();
        options
            .overrides
            .insert("label".to_string(), TargetField::Device(DeviceField::Name));

        let err = parse_csv(b"hostname;label\nsw-1;x\n", &options, &LookupTables::default())
            .unwrap_err();

        match err {
            ImportError::MappingConflict { target, headers } => {
                assert_eq!(target, "name");
                assert_eq!(headers, vec!["hostname", "label"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_merge_and_validation_issues_are_combined() {
        let lookups = LookupTables {
            device_types: vec![LookupEntry::model("dt-1", "switch")],
            ..Default::default()
        };
        let csv = "name;device_type;role\nsw-1;switch;leaf\nsw-1;switch;spine\nsw-2;firewall;leaf\n";

        let result = parse_csv(csv.as_bytes(), &ParseOptions::default(), &lookups).unwrap();

        assert_eq!(result.row_count, 3);
        assert_eq!(result.devices.len(), 2);
        assert_eq!(result.error_count(), 2);
        assert_eq!(result.issues_for("sw-1").count(), 1);
        assert_eq!(
            result.issues_for("sw-2").next().map(|i| i.severity),
            Some(Severity::Error)
        );
        assert!(!result.can_import());
    }

    #[test]
    fn test_reparse_with_override() {
        let csv = b"equipment;kind\nsw-1;switch\n";
        let table = tokenize(csv, &CsvOptions::default()).unwrap();

        let first = parse_table(
            &table,
            &HashMap::new(),
            &ImportDefaults::default(),
            &LookupTables::default(),
        )
        .unwrap();
        assert!(first.devices.is_empty());
        assert_eq!(first.error_count(), 1);

        let mut overrides = HashMap::new();
        overrides.insert("equipment".to_string(), TargetField::Device(DeviceField::Name));
        overrides.insert(
            "kind".to_string(),
            TargetField::Device(DeviceField::DeviceType),
        );
        let second = parse_table(
            &table,
            &overrides,
            &ImportDefaults::default(),
            &LookupTables::default(),
        )
        .unwrap();
        assert_eq!(second.devices.len(), 1);
        assert!(second.can_import());
    }
}
