use clap::Parser;
use hemp_etl::core::{Mailer, Pipeline};
use hemp_etl::utils::{logger, validation::Validate};
use hemp_etl::{
    AppConfig, AzureBlobStorage, CliConfig, EtlEngine, EtlError, HempPipeline, LocalStorage,
    SmtpMailer,
};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting hemp-etl");
    if cli.monitor {
        tracing::info!("🔍 Run monitoring enabled");
    }

    let exit_code = match run(&cli).await {
        Ok(()) => 0,
        Err(e) => report_error(&e),
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

async fn run(cli: &CliConfig) -> hemp_etl::Result<()> {
    // 載入並驗證配置
    let config = AppConfig::from_env(cli.local_output.is_none())?;
    config.validate()?;
    tracing::debug!("Config: {:?}", config);

    let mailer = SmtpMailer::new(config.smtp.clone())?;

    match &cli.local_output {
        Some(dir) => {
            tracing::info!("📁 Writing CSV under {}", dir.display());
            let pipeline = HempPipeline::new(LocalStorage::new(dir), config)?;
            execute(
                EtlEngine::new_with_monitoring(pipeline, mailer, cli.monitor),
                cli.dry_run,
            )
            .await
        }
        None => {
            let connection_string = config.azure_connection_string.as_deref().ok_or_else(|| {
                EtlError::MissingConfigError {
                    field: "AZURE_CONNECTION_STRING".to_string(),
                }
            })?;
            let storage =
                AzureBlobStorage::from_connection_string(connection_string, &config.container)?;
            let pipeline = HempPipeline::new(storage, config)?;
            execute(
                EtlEngine::new_with_monitoring(pipeline, mailer, cli.monitor),
                cli.dry_run,
            )
            .await
        }
    }
}

async fn execute<P: Pipeline, M: Mailer>(
    engine: EtlEngine<P, M>,
    dry_run: bool,
) -> hemp_etl::Result<()> {
    if dry_run {
        let result = engine.dry_run().await?;
        println!(
            "🔎 Dry run: {} records, {} CSV bytes (nothing uploaded, no email sent)",
            result.record_count,
            result.csv_output.len()
        );
        return Ok(());
    }

    let report = engine.run().await?;
    println!(
        "✅ Done! Uploaded {} hemp records to {}",
        report.record_count, report.destination
    );
    Ok(())
}

fn report_error(e: &EtlError) -> i32 {
    tracing::error!(
        "❌ Hemp ETL failed: {} (Category: {:?}, Severity: {:?})",
        e.user_friendly_message(),
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e);
    eprintln!("💡 {}", e.recovery_suggestion());

    e.severity().exit_code()
}
