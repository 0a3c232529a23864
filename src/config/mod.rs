#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::ImportConfig;

use crate::core::engine::RunSettings;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_csv_char, validate_path, validate_positive_number, validate_range, validate_url,
    Validate,
};

/// 合併命令列與設定檔後，實際執行用的設定
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
    pub monitor: bool,
    pub run: RunSettings,
}

impl ConfigProvider for ResolvedConfig {
    fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn concurrent_requests(&self) -> usize {
        self.run.import.concurrent_requests
    }
}

impl Validate for ResolvedConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api.base_url", &self.api_base_url)?;
        validate_range("api.timeout_seconds", self.timeout_seconds, 1, 600)?;
        validate_path("file", &self.run.input_path)?;
        validate_positive_number("concurrency", self.run.import.concurrent_requests, 1)?;
        toml_config::validate_prefix_length(
            "import.default_prefix_length",
            &self.run.import.default_prefix_length,
        )?;

        if let Some(delimiter) = &self.run.delimiter {
            validate_csv_char("delimiter", delimiter)?;
        }
        if let Some(quote_char) = &self.run.quote_char {
            validate_csv_char("quote_char", quote_char)?;
        }
        if let Some(report) = &self.run.report_path {
            validate_path("report", report)?;
        }
        Ok(())
    }
}
