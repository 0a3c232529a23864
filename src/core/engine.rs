use crate::core::conflict::ConflictMode;
use crate::core::importer::ImportOptions;
use crate::core::session::ImportSession;
use crate::core::tokenizer::{CsvOptions, DEFAULT_DELIMITER, DEFAULT_QUOTE_CHAR};
use crate::core::{
    DeviceValidationError, ImportSummary, InventoryApi, IpConflict, Storage, TargetField,
};
use crate::utils::error::{ImportError, Result};
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation::validate_csv_char;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 一次命令列執行所需的設定 (已合併 CLI 與設定檔)
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub input_path: String,
    pub delimiter: Option<String>,
    pub quote_char: Option<String>,
    pub overrides: HashMap<String, TargetField>,
    pub import: ImportOptions,
    pub check_ip: ConflictMode,
    pub skip_flagged: bool,
    pub dry_run: bool,
    pub report_path: Option<String>,
}

/// 寫到磁碟的匯入報告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub generated_at: DateTime<Utc>,
    pub input_path: String,
    pub dry_run: bool,
    pub row_count: usize,
    pub device_count: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub issues: Vec<DeviceValidationError>,
    pub removed: Vec<IpConflict>,
    pub flagged: Vec<IpConflict>,
    pub summary: Option<ImportSummary>,
}

impl ImportReport {
    pub fn blocked(&self) -> bool {
        !self.dry_run && self.error_count > 0
    }
}

pub struct ImportEngine<S: Storage, A: InventoryApi + ?Sized> {
    storage: S,
    api: Arc<A>,
    monitor: SystemMonitor,
}

impl<S: Storage, A: InventoryApi + ?Sized> ImportEngine<S, A> {
    pub fn new(storage: S, api: Arc<A>) -> Self {
        Self::new_with_monitoring(storage, api, false)
    }

    pub fn new_with_monitoring(storage: S, api: Arc<A>, monitor_enabled: bool) -> Self {
        Self {
            storage,
            api,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// 分隔符號與引號：命令列 / 設定檔 → 後端預設 → `;` 與 `"`
    pub async fn resolve_csv_options(&self, settings: &RunSettings) -> Result<CsvOptions> {
        let (mut delimiter, mut quote_char) =
            (settings.delimiter.clone(), settings.quote_char.clone());

        if delimiter.is_none() || quote_char.is_none() {
            match self.api.csv_defaults().await {
                Ok(defaults) => {
                    let usable = |field: &str, value: Option<String>| {
                        value.filter(|v| validate_csv_char(field, v).is_ok())
                    };
                    delimiter =
                        delimiter.or_else(|| usable("csv_delimiter", defaults.csv_delimiter));
                    quote_char =
                        quote_char.or_else(|| usable("csv_quote_char", defaults.csv_quote_char));
                }
                Err(e) => {
                    tracing::warn!("⚠️ Could not load CSV defaults from backend: {}", e);
                }
            }
        }

        let delimiter = delimiter.unwrap_or_else(|| DEFAULT_DELIMITER.to_string());
        let quote_char = quote_char.unwrap_or_else(|| DEFAULT_QUOTE_CHAR.to_string());
        tracing::debug!("CSV delimiter '{}', quote '{}'", delimiter, quote_char);

        CsvOptions::from_strs(&delimiter, &quote_char)
    }

    pub async fn run(&self, settings: &RunSettings) -> Result<ImportReport> {
        tracing::info!("📥 Reading {}", settings.input_path);
        self.monitor.log_stats("Start");

        let bytes = self.storage.read_file(&settings.input_path).await?;
        let csv = self.resolve_csv_options(settings).await?;

        let mut session = ImportSession::new(Arc::clone(&self.api), csv, settings.import.clone())
            .with_overrides(settings.overrides.clone());
        session.load_lookups().await;

        let parsed = session.select_file(&bytes)?;
        for issue in &parsed.validation_errors {
            if issue.is_error() {
                tracing::error!("❌ {} [{}]: {}", issue.device_name, issue.field, issue.message);
            } else {
                tracing::warn!("⚠️ {} [{}]: {}", issue.device_name, issue.field, issue.message);
            }
        }
        self.monitor.log_stats("Parse");

        if settings.check_ip != ConflictMode::Off {
            let conflicts = session.check_conflicts(settings.check_ip).await?;
            tracing::info!(
                "🔎 IP check ({}) found {} conflict(s)",
                settings.check_ip,
                conflicts.len()
            );
            self.monitor.log_stats("Conflict check");
        }

        let result = session
            .result()
            .ok_or_else(|| ImportError::InvalidState {
                state: session.state().to_string(),
                action: "build the report".to_string(),
            })?;
        let error_count = result.error_count();

        let summary = if settings.dry_run {
            tracing::info!("🧪 Dry run, nothing submitted");
            None
        } else if error_count > 0 {
            None
        } else {
            let summary = session
                .import(settings.skip_flagged, |progress| {
                    tracing::info!("⏳ Imported {}/{}", progress.current, progress.total);
                })
                .await?;
            self.monitor.log_stats("Import");
            Some(summary.clone())
        };

        let result = session
            .result()
            .ok_or_else(|| ImportError::InvalidState {
                state: session.state().to_string(),
                action: "build the report".to_string(),
            })?;
        let report = ImportReport {
            generated_at: Utc::now(),
            input_path: settings.input_path.clone(),
            dry_run: settings.dry_run,
            row_count: result.row_count,
            device_count: result.devices.len(),
            error_count,
            warning_count: result.warning_count(),
            issues: result.validation_errors.clone(),
            removed: session.removed().to_vec(),
            flagged: session.flagged().to_vec(),
            summary,
        };

        if let Some(path) = &settings.report_path {
            let json = serde_json::to_vec_pretty(&report)?;
            self.storage.write_file(path, &json).await?;
            tracing::info!("📁 Report saved to: {}", path);
        }

        self.monitor.log_final_stats();

        if report.blocked() {
            return Err(ImportError::ImportBlocked { error_count });
        }
        Ok(report)
    }
}
