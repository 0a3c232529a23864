use clap::Parser;
use csv_device_import::utils::error::{ErrorSeverity, ImportError};
use csv_device_import::utils::{logger, validation::Validate};
use csv_device_import::{CliConfig, HttpInventoryApi, ImportEngine, LocalStorage};
use std::sync::Arc;

fn exit_code(e: &ImportError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 需要處理後重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn fail(e: &ImportError) -> ! {
    tracing::error!(
        "❌ Import failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting csv-device-import");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = cli
        .load_toml()
        .and_then(|toml| cli.resolve(toml.as_ref()))
        .and_then(|config| config.validate().map(|_| config))
        .unwrap_or_else(|e| {
            tracing::error!("❌ Configuration validation failed: {}", e);
            fail(&e)
        });

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let api = HttpInventoryApi::from_config(&config).unwrap_or_else(|e| fail(&e));
    let engine =
        ImportEngine::new_with_monitoring(LocalStorage::default(), Arc::new(api), config.monitor);

    match engine.run(&config.run).await {
        Ok(report) => {
            println!(
                "✅ Parsed {} row(s) into {} device(s) ({} warning(s))",
                report.row_count, report.device_count, report.warning_count
            );
            for conflict in &report.removed {
                println!(
                    "🚫 Removed {}: {} is assigned to {}",
                    conflict.device, conflict.ip, conflict.assigned_to
                );
            }
            for conflict in &report.flagged {
                println!(
                    "🚩 Flagged {}: {} is assigned to {}",
                    conflict.device, conflict.ip, conflict.assigned_to
                );
            }

            if let Some(summary) = &report.summary {
                for result in summary.results.iter().filter(|r| r.message.is_some()) {
                    println!(
                        "   {} {:?}: {}",
                        result.device_name,
                        result.status,
                        result.message.as_deref().unwrap_or_default()
                    );
                }
                println!(
                    "📊 Total {}, success {}, failed {}, skipped {}",
                    summary.total, summary.success, summary.failed, summary.skipped
                );
                if summary.failed > 0 {
                    std::process::exit(1);
                }
            }

            if let Some(path) = &config.run.report_path {
                println!("📁 Report saved to: {}", path);
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
