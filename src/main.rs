use anyhow::Context;
use clap::Parser;
use ssl_monitor::utils::error::ErrorSeverity;
use ssl_monitor::utils::{logger, validation::Validate};
use ssl_monitor::{AppConfig, CliCommand, CliConfig, Monitor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting ssl-monitor");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let mut config = AppConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    config.apply_env_overrides();

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor = Monitor::from_config(&config).context("failed to build services")?;

    match cli.command() {
        CliCommand::Serve => {
            tracing::info!("📁 Registry stored under {}", config.storage.path);
            monitor
                .serve(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("❌ Cannot listen for shutdown signal: {}", e);
                    }
                })
                .await;
        }
        CliCommand::Check => match monitor.sweeper.sweep().await {
            Ok(report) => {
                println!("{}", report.summary());
                for failure in &report.failures {
                    println!("  ⚠️ {}", failure);
                }
            }
            Err(e) => {
                tracing::error!(
                    "❌ Sweep failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                eprintln!("❌ {}", e.user_friendly_message());
                eprintln!("💡 建議: {}", e.recovery_suggestion());
                std::process::exit(exit_code(e.severity()));
            }
        },
        CliCommand::Run { command } => {
            let text = format!("/{}", command.join(" "));
            println!("{}", monitor.dispatcher.handle_text(&text).await);
        }
    }

    Ok(())
}

/// 根據錯誤嚴重程度決定退出碼
fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
