use crate::config::toml_config::{ImportConfig, DEFAULT_TIMEOUT_SECONDS};
use crate::config::ResolvedConfig;
use crate::core::conflict::ConflictMode;
use crate::core::engine::RunSettings;
use crate::core::importer::ImportOptions;
use crate::core::TargetField;
use crate::utils::error::{ImportError, Result};
use clap::Parser;

/// `HEADER=TARGET`，例如 `Hostname=name`、`Rack=cf_rack`
pub fn parse_mapping_arg(value: &str) -> Result<(String, TargetField)> {
    let (header, target) = value
        .split_once('=')
        .ok_or_else(|| ImportError::InvalidConfigValueError {
            field: "map".to_string(),
            value: value.to_string(),
            reason: "Expected HEADER=TARGET".to_string(),
        })?;

    let header = header.trim();
    if header.is_empty() {
        return Err(ImportError::InvalidConfigValueError {
            field: "map".to_string(),
            value: value.to_string(),
            reason: "Header name cannot be empty".to_string(),
        });
    }

    Ok((header.to_string(), target.parse()?))
}

#[derive(Debug, Clone, Parser)]
#[command(name = "csv-device-import")]
#[command(about = "Bulk-import network devices from a CSV file into the inventory")]
pub struct CliConfig {
    /// CSV file to import
    pub file: String,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, help = "Base URL of the inventory API")]
    pub api_url: Option<String>,

    #[arg(long, help = "Bearer token for the inventory API")]
    pub token: Option<String>,

    #[arg(long)]
    pub delimiter: Option<String>,

    #[arg(long)]
    pub quote_char: Option<String>,

    #[arg(long = "map", value_name = "HEADER=TARGET", value_parser = parse_mapping_arg)]
    pub mappings: Vec<(String, TargetField)>,

    #[arg(long, value_enum, help = "Check interface IPs against the inventory")]
    pub check_ip: Option<ConflictMode>,

    #[arg(long, help = "Do not submit devices flagged by --check-ip flag")]
    pub skip_flagged: bool,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long, help = "Record devices that already exist as skipped instead of failed")]
    pub skip_existing: bool,

    #[arg(long, help = "Create devices only, without interfaces or IP addresses")]
    pub no_interfaces: bool,

    #[arg(long, help = "Parse and check only, submit nothing")]
    pub dry_run: bool,

    #[arg(long, help = "Write a JSON report to this path")]
    pub report: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl CliConfig {
    pub fn load_toml(&self) -> Result<Option<ImportConfig>> {
        self.config
            .as_deref()
            .map(ImportConfig::from_file)
            .transpose()
    }

    /// 命令列優先，其次設定檔，最後內建預設值
    pub fn resolve(&self, toml: Option<&ImportConfig>) -> Result<ResolvedConfig> {
        let api_base_url = self
            .api_url
            .clone()
            .or_else(|| toml.map(|t| t.api.base_url.clone()))
            .ok_or_else(|| ImportError::MissingConfigError {
                field: "api.base_url (--api-url)".to_string(),
            })?;

        let mut overrides = match toml {
            Some(config) => config.overrides()?,
            None => Default::default(),
        };
        overrides.extend(self.mappings.iter().cloned());

        let mut import = toml
            .map(ImportConfig::import_options)
            .unwrap_or_else(ImportOptions::default);
        if let Some(concurrency) = self.concurrency {
            import.concurrent_requests = concurrency;
        }
        import.skip_existing |= self.skip_existing;
        if self.no_interfaces {
            import.create_interfaces = false;
        }

        let run = RunSettings {
            input_path: self.file.clone(),
            delimiter: self
                .delimiter
                .clone()
                .or_else(|| toml.and_then(|t| t.delimiter().map(str::to_string))),
            quote_char: self
                .quote_char
                .clone()
                .or_else(|| toml.and_then(|t| t.quote_char().map(str::to_string))),
            overrides,
            import,
            check_ip: self
                .check_ip
                .or_else(|| toml.and_then(ImportConfig::check_ip))
                .unwrap_or(ConflictMode::Off),
            skip_flagged: self.skip_flagged || toml.map(ImportConfig::skip_flagged).unwrap_or(false),
            dry_run: self.dry_run,
            report_path: self.report.clone(),
        };

        Ok(ResolvedConfig {
            api_base_url,
            api_token: self
                .token
                .clone()
                .or_else(|| toml.and_then(|t| t.api.token.clone())),
            timeout_seconds: toml
                .and_then(|t| t.api.timeout_seconds)
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            monitor: self.monitor || toml.map(ImportConfig::monitoring_enabled).unwrap_or(false),
            run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConfigProvider, DeviceField, InterfaceField};
    use crate::utils::validation::Validate;

    #[test]
    fn test_parse_mapping_arg() {
        assert_eq!(
            parse_mapping_arg("Hostname=name").unwrap(),
            ("Hostname".to_string(), TargetField::Device(DeviceField::Name))
        );
        assert_eq!(
            parse_mapping_arg("Port = interface_name").unwrap().1,
            TargetField::Interface(InterfaceField::Name)
        );
        assert!(parse_mapping_arg("Hostname").is_err());
        assert!(parse_mapping_arg("=name").is_err());
        assert!(parse_mapping_arg("Hostname=hostname").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = CliConfig::parse_from([
            "csv-device-import",
            "devices.csv",
            "--api-url",
            "http://localhost:8000",
            "--map",
            "Equipment=name",
            "--map",
            "Rack=cf_rack",
            "--check-ip",
            "remove",
            "--concurrency",
            "3",
            "--dry-run",
            "--skip-existing",
            "--no-interfaces",
        ]);

        assert_eq!(cli.file, "devices.csv");
        assert_eq!(cli.mappings.len(), 2);
        assert_eq!(cli.check_ip, Some(ConflictMode::Remove));

        let resolved = cli.resolve(None).unwrap();
        assert_eq!(resolved.api_base_url(), "http://localhost:8000");
        assert_eq!(resolved.concurrent_requests(), 3);
        assert_eq!(resolved.run.check_ip, ConflictMode::Remove);
        assert!(resolved.run.dry_run);
        assert!(resolved.run.import.skip_existing);
        assert!(!resolved.run.import.create_interfaces);
        assert_eq!(resolved.run.delimiter, None);
        assert!(resolved.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml = ImportConfig::from_toml_str(
            r#"
[api]
base_url = "https://cockpit.example.com"
token = "from-file"

[csv]
delimiter = ","

[mapping]
Equipment = "asset_tag"
Site = "location"

[import]
check_ip = "flag"
concurrent_requests = 2
"#,
        )
        .unwrap();

        let cli = CliConfig::parse_from([
            "csv-device-import",
            "devices.csv",
            "--token",
            "from-cli",
            "--delimiter",
            "|",
            "--map",
            "Equipment=name",
        ]);
        let resolved = cli.resolve(Some(&toml)).unwrap();

        assert_eq!(resolved.api_base_url, "https://cockpit.example.com");
        assert_eq!(resolved.api_token.as_deref(), Some("from-cli"));
        assert_eq!(resolved.run.delimiter.as_deref(), Some("|"));
        assert_eq!(resolved.run.check_ip, ConflictMode::Flag);
        assert_eq!(resolved.run.import.concurrent_requests, 2);
        assert_eq!(
            resolved.run.overrides.get("Equipment"),
            Some(&TargetField::Device(DeviceField::Name))
        );
        assert_eq!(
            resolved.run.overrides.get("Site"),
            Some(&TargetField::Device(DeviceField::Location))
        );
    }

    #[test]
    fn test_missing_api_url_is_reported() {
        let cli = CliConfig::parse_from(["csv-device-import", "devices.csv"]);
        let err = cli.resolve(None).unwrap_err();
        assert!(matches!(err, ImportError::MissingConfigError { .. }));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let cli = CliConfig::parse_from([
            "csv-device-import",
            "devices.csv",
            "--api-url",
            "http://localhost:8000",
            "--concurrency",
            "0",
        ]);
        assert!(cli.resolve(None).unwrap().validate().is_err());

        let cli = CliConfig::parse_from([
            "csv-device-import",
            "devices.csv",
            "--api-url",
            "http://localhost:8000",
            "--delimiter",
            "ab",
        ]);
        assert!(cli.resolve(None).unwrap().validate().is_err());
    }
}
