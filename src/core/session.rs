use crate::core::conflict::{check_and_flag, check_and_remove, ConflictMode};
use crate::core::importer::{plan_import, ImportOptions, Importer};
use crate::core::parse::parse_table;
use crate::core::tokenizer::{tokenize, CsvOptions};
use crate::core::{
    CsvParseResult, CsvTable, ImportProgress, ImportSummary, InventoryApi, IpConflict,
    LookupTables, TargetField,
};
use crate::utils::error::{ImportError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    Parsing,
    Parsed,
    ParseError(String),
    MappingConfig,
    ConflictChecking,
    Importing,
    Imported,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportState::Idle => f.write_str("idle"),
            ImportState::Parsing => f.write_str("parsing"),
            ImportState::Parsed => f.write_str("parsed"),
            ImportState::ParseError(_) => f.write_str("parse_error"),
            ImportState::MappingConfig => f.write_str("mapping_config"),
            ImportState::ConflictChecking => f.write_str("conflict_checking"),
            ImportState::Importing => f.write_str("importing"),
            ImportState::Imported => f.write_str("imported"),
        }
    }
}

/// 一次 CSV 匯入的完整狀態：選檔、調整對應、檢查 IP、匯入
pub struct ImportSession<A: InventoryApi + ?Sized> {
    api: Arc<A>,
    csv: CsvOptions,
    import_options: ImportOptions,
    configured_overrides: HashMap<String, TargetField>,
    overrides: HashMap<String, TargetField>,
    lookups: LookupTables,
    state: ImportState,
    table: Option<CsvTable>,
    result: Option<CsvParseResult>,
    removed: Vec<IpConflict>,
    flagged: Vec<IpConflict>,
    summary: Option<ImportSummary>,
}

impl<A: InventoryApi + ?Sized> ImportSession<A> {
    pub fn new(api: Arc<A>, csv: CsvOptions, import_options: ImportOptions) -> Self {
        Self {
            api,
            csv,
            import_options,
            configured_overrides: HashMap::new(),
            overrides: HashMap::new(),
            lookups: LookupTables::default(),
            state: ImportState::Idle,
            table: None,
            result: None,
            removed: Vec::new(),
            flagged: Vec::new(),
            summary: None,
        }
    }

    /// 設定檔裡的欄位對應，每次選檔或重設都會回到這組
    pub fn with_overrides(mut self, overrides: HashMap<String, TargetField>) -> Self {
        self.overrides = overrides.clone();
        self.configured_overrides = overrides;
        self
    }

    pub fn with_lookups(mut self, lookups: LookupTables) -> Self {
        self.lookups = lookups;
        self
    }

    pub async fn load_lookups(&mut self) {
        self.lookups = LookupTables::fetch(self.api.as_ref()).await;
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    pub fn lookups(&self) -> &LookupTables {
        &self.lookups
    }

    pub fn overrides(&self) -> &HashMap<String, TargetField> {
        &self.overrides
    }

    pub fn table(&self) -> Option<&CsvTable> {
        self.table.as_ref()
    }

    pub fn result(&self) -> Option<&CsvParseResult> {
        self.result.as_ref()
    }

    pub fn removed(&self) -> &[IpConflict] {
        &self.removed
    }

    pub fn flagged(&self) -> &[IpConflict] {
        &self.flagged
    }

    pub fn summary(&self) -> Option<&ImportSummary> {
        self.summary.as_ref()
    }

    fn invalid(&self, action: &str) -> ImportError {
        ImportError::InvalidState {
            state: self.state.to_string(),
            action: action.to_string(),
        }
    }

    fn clear(&mut self) {
        self.overrides = self.configured_overrides.clone();
        self.table = None;
        self.result = None;
        self.removed.clear();
        self.flagged.clear();
        self.summary = None;
    }

    fn held_result(&self, action: &str) -> Result<&CsvParseResult> {
        self.result.as_ref().ok_or_else(|| self.invalid(action))
    }

    /// 選擇新檔案會丟掉目前所有狀態並重新解析
    pub fn select_file(&mut self, bytes: &[u8]) -> Result<&CsvParseResult> {
        if matches!(
            self.state,
            ImportState::Parsing | ImportState::ConflictChecking | ImportState::Importing
        ) {
            return Err(self.invalid("select a file"));
        }

        self.clear();
        self.state = ImportState::Parsing;

        let parsed = tokenize(bytes, &self.csv).and_then(|table| {
            let result = parse_table(
                &table,
                &self.overrides,
                &self.import_options.defaults,
                &self.lookups,
            )?;
            Ok((table, result))
        });

        match parsed {
            Ok((table, result)) => {
                self.table = Some(table);
                self.state = ImportState::Parsed;
                Ok(self.result.insert(result))
            }
            Err(e) => {
                tracing::error!("❌ Could not parse CSV: {}", e);
                self.state = ImportState::ParseError(e.to_string());
                Err(e)
            }
        }
    }

    /// 以新的欄位對應重新解析已載入的表格
    ///
    /// 對應衝突時保留上一次的結果，狀態停在 mapping_config。
    pub fn apply_mapping(
        &mut self,
        overrides: HashMap<String, TargetField>,
    ) -> Result<&CsvParseResult> {
        if !matches!(self.state, ImportState::Parsed | ImportState::MappingConfig) {
            return Err(self.invalid("change the column mapping"));
        }
        let Some(table) = self.table.as_ref() else {
            return Err(self.invalid("change the column mapping"));
        };

        self.state = ImportState::MappingConfig;
        let result = parse_table(
            table,
            &overrides,
            &self.import_options.defaults,
            &self.lookups,
        )?;

        self.overrides = overrides;
        self.removed.clear();
        self.flagged.clear();
        self.state = ImportState::Parsed;
        Ok(self.result.insert(result))
    }

    /// remove 模式會以移除後的新結果取代目前持有的結果
    pub async fn check_conflicts(&mut self, mode: ConflictMode) -> Result<Vec<IpConflict>> {
        if self.state != ImportState::Parsed {
            return Err(self.invalid("check IP conflicts"));
        }
        let concurrency = self.import_options.concurrent_requests;
        let api = Arc::clone(&self.api);

        match mode {
            ConflictMode::Off => Ok(Vec::new()),
            ConflictMode::Remove => {
                self.state = ImportState::ConflictChecking;
                let current = self.held_result("check IP conflicts")?;
                let (filtered, conflicts) = check_and_remove(current, api.as_ref(), concurrency).await;
                self.result = Some(filtered);
                self.removed.extend(conflicts.iter().cloned());
                self.state = ImportState::Parsed;
                Ok(conflicts)
            }
            ConflictMode::Flag => {
                self.state = ImportState::ConflictChecking;
                let current = self.held_result("check IP conflicts")?;
                let conflicts = check_and_flag(current, api.as_ref(), concurrency).await;
                self.flagged = conflicts.clone();
                self.state = ImportState::Parsed;
                Ok(conflicts)
            }
        }
    }

    /// 只有在 parsed 且沒有 error 等級問題時才能匯入
    pub async fn import<F>(&mut self, skip_flagged: bool, progress: F) -> Result<&ImportSummary>
    where
        F: FnMut(ImportProgress),
    {
        if self.state != ImportState::Parsed {
            return Err(self.invalid("import"));
        }
        let result = self.held_result("import")?;
        if !result.can_import() {
            return Err(ImportError::ImportBlocked {
                error_count: result.error_count(),
            });
        }

        let items = plan_import(&result.devices, &self.flagged, skip_flagged);
        self.state = ImportState::Importing;

        let api = Arc::clone(&self.api);
        let importer = Importer::new(api.as_ref(), self.import_options.clone());
        let summary = importer.import(items, progress).await;

        self.state = ImportState::Imported;
        Ok(self.summary.insert(summary))
    }

    pub fn reset(&mut self) {
        self.clear();
        self.state = ImportState::Idle;
    }
}
