use clap::Parser;
use immo_etl::utils::error::ErrorSeverity;
use immo_etl::utils::{logger, validation::Validate};
use immo_etl::{
    inspect_ad, CliArgs, Command, DatasetPipeline, EtlEngine, EtlError, FeaturePipeline,
    HttpFetcher, LocalStorage, PredictPipeline, ProjectConfig, ScrapePipeline, TrainPipeline,
    Workflow,
};

fn exit_code(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 可重試錯誤
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 系統錯誤
    }
}

fn fail(context: &str, e: &EtlError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    std::process::exit(exit_code(e).max(1));
}

async fn execute(command: &Command, config: ProjectConfig) -> immo_etl::Result<String> {
    let storage = LocalStorage::new(config.project.root.clone());
    let monitor = config.monitoring.enabled;

    match command {
        Command::Scrape { .. } => {
            let fetcher = HttpFetcher::new(&config.scrape)?;
            let pipeline = ScrapePipeline::new(storage, fetcher, config.scrape.clone())?;
            let engine = EtlEngine::new_with_monitoring(pipeline, monitor);
            let output = engine.run().await?;
            let stats = engine.pipeline().stats();
            Ok(format!(
                "{} ({} valid ads out of {} visited, {} skipped, {} result pages)",
                output, stats.valid, stats.visited, stats.skipped, stats.pages
            ))
        }
        Command::Inspect { url } => {
            let fetcher = HttpFetcher::new(&config.scrape)?;
            let inspection = inspect_ad(&fetcher, url, config.scrape.min_price).await?;
            println!("{}", inspection);
            Ok(url.clone())
        }
        Command::Dataset { .. } => {
            let pipeline = DatasetPipeline::new(storage, config.dataset.clone());
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Features { .. } => {
            let pipeline = FeaturePipeline::new(storage, config.features.clone());
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Train { .. } => {
            let pipeline =
                TrainPipeline::new(storage, config.model.clone(), config.training_options());
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Predict { .. } => {
            let pipeline = PredictPipeline::new(storage, config.predict.clone());
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Run { scrape, archive } => {
            let workflow = Workflow::new(storage, config.clone());
            let report = if *scrape {
                let fetcher = HttpFetcher::new(&config.scrape)?;
                workflow.run_with_scrape(fetcher, *archive).await?
            } else {
                workflow.run(*archive).await?
            };

            let mut outputs: Vec<String> = report
                .stages
                .iter()
                .map(|(stage, output)| format!("{}: {}", stage, output))
                .collect();
            if let Some(archive) = report.archive {
                outputs.push(format!("archive: {}", archive));
            }
            Ok(outputs.join("; "))
        }
        Command::CheckConfig => Ok(format!("configuration of {} is valid", config.project.name)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting immo-etl");

    let mut config = match ProjectConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => fail("Configuration loading", &e),
    };
    args.apply_overrides(&mut config);
    if args.verbose {
        tracing::debug!("Effective config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        fail("Configuration validation", &e);
    }

    if config.monitoring.enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    match execute(&args.command, config).await {
        Ok(output) => {
            tracing::info!("✅ Completed: {}", output);
            println!("✅ {}", output);
        }
        Err(e) => {
            if exit_code(&e) == 0 {
                tracing::warn!("⚠️ {}", e);
                eprintln!("⚠️ {}", e.user_friendly_message());
            } else {
                fail("immo-etl", &e);
            }
        }
    }

    Ok(())
}
