use crate::core::conflict::ConflictMode;
use crate::core::importer::{ImportOptions, DEFAULT_PREFIX_LENGTH};
use crate::core::{ConfigProvider, ImportDefaults, TargetField};
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{
    validate_csv_char, validate_positive_number, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub api: ApiConfig,
    pub csv: Option<CsvConfig>,
    pub mapping: Option<HashMap<String, String>>,
    pub defaults: Option<ImportDefaults>,
    pub import: Option<ImportSection>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CsvConfig {
    pub delimiter: Option<String>,
    pub quote_char: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSection {
    pub concurrent_requests: Option<usize>,
    pub add_prefix: Option<bool>,
    pub default_prefix_length: Option<String>,
    pub skip_flagged: Option<bool>,
    pub check_ip: Option<ConflictMode>,
    pub skip_existing: Option<bool>,
    pub create_interfaces: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

/// 前綴長度格式為 `/N`
pub(crate) fn validate_prefix_length(field_name: &str, value: &str) -> Result<()> {
    let length = value
        .strip_prefix('/')
        .and_then(|n| n.parse::<u8>().ok())
        .ok_or_else(|| ImportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Expected a prefix length such as /24".to_string(),
        })?;
    validate_range(field_name, length, 0, 128)
}

impl ImportConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ImportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ImportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${NAUTOBOT_TOKEN})，找不到的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ImportError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// `[mapping]` 區段轉成欄位對應
    pub fn overrides(&self) -> Result<HashMap<String, TargetField>> {
        self.mapping
            .iter()
            .flatten()
            .map(|(header, target)| {
                target
                    .parse::<TargetField>()
                    .map(|field| (header.clone(), field))
            })
            .collect()
    }

    pub fn defaults(&self) -> ImportDefaults {
        self.defaults.clone().unwrap_or_default()
    }

    pub fn delimiter(&self) -> Option<&str> {
        self.csv.as_ref().and_then(|c| c.delimiter.as_deref())
    }

    pub fn quote_char(&self) -> Option<&str> {
        self.csv.as_ref().and_then(|c| c.quote_char.as_deref())
    }

    pub fn check_ip(&self) -> Option<ConflictMode> {
        self.import.as_ref().and_then(|i| i.check_ip)
    }

    pub fn skip_flagged(&self) -> bool {
        self.import
            .as_ref()
            .and_then(|i| i.skip_flagged)
            .unwrap_or(false)
    }

    pub fn import_options(&self) -> ImportOptions {
        let section = self.import.clone().unwrap_or_default();
        ImportOptions {
            defaults: self.defaults(),
            add_prefix: section.add_prefix.unwrap_or(true),
            default_prefix_length: section
                .default_prefix_length
                .unwrap_or_else(|| DEFAULT_PREFIX_LENGTH.to_string()),
            concurrent_requests: section.concurrent_requests.unwrap_or(1),
            skip_existing: section.skip_existing.unwrap_or(false),
            create_interfaces: section.create_interfaces.unwrap_or(true),
        }
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_url("api.base_url", &self.api.base_url)?;

        if let Some(timeout) = self.api.timeout_seconds {
            validate_range("api.timeout_seconds", timeout, 1, 600)?;
        }
        if let Some(delimiter) = self.delimiter() {
            validate_csv_char("csv.delimiter", delimiter)?;
        }
        if let Some(quote_char) = self.quote_char() {
            validate_csv_char("csv.quote_char", quote_char)?;
        }
        if let Some(section) = &self.import {
            if let Some(concurrent) = section.concurrent_requests {
                validate_positive_number("import.concurrent_requests", concurrent, 1)?;
            }
            if let Some(length) = &section.default_prefix_length {
                validate_prefix_length("import.default_prefix_length", length)?;
            }
        }

        self.overrides()?;
        Ok(())
    }
}

impl ConfigProvider for ImportConfig {
    fn api_base_url(&self) -> &str {
        &self.api.base_url
    }

    fn api_token(&self) -> Option<&str> {
        self.api.token.as_deref()
    }

    fn timeout_seconds(&self) -> u64 {
        self.api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    fn concurrent_requests(&self) -> usize {
        self.import
            .as_ref()
            .and_then(|i| i.concurrent_requests)
            .unwrap_or(1)
    }
}

impl Validate for ImportConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
