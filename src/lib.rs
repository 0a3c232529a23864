pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{ImportConfig, ResolvedConfig};

pub use adapters::{HttpInventoryApi, LocalStorage};
pub use core::conflict::{check_and_flag, check_and_remove, ConflictMode};
pub use core::engine::{ImportEngine, ImportReport, RunSettings};
pub use core::importer::{plan_import, ImportItem, ImportOptions, Importer};
pub use core::parse::{parse_csv, parse_table, ParseOptions};
pub use core::session::{ImportSession, ImportState};
pub use core::tokenizer::CsvOptions;
pub use utils::error::{ImportError, Result};
