use crate::config::toml_config::{ProjectConfig, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "immo-etl")]
#[command(about = "Ile-de-France real-estate scraper, dataset builder and price model")]
#[command(version)]
pub struct CliArgs {
    /// TOML 配置檔路徑（不存在時使用預設值）
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Enable system resource monitoring")]
    pub monitor: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Crawl result pages and write the raw listings CSV
    Scrape {
        #[arg(long)]
        output: Option<String>,
        #[arg(long)]
        max_pages: Option<usize>,
        /// Replaces the configured start URLs (repeatable)
        #[arg(long = "start-url")]
        start_urls: Vec<String>,
    },
    /// Fetch a single ad and print the parsed fields
    Inspect { url: String },
    /// Clean raw listings and join them with the commune reference file
    Dataset {
        #[arg(long)]
        listings: Option<String>,
        #[arg(long)]
        cities: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    /// Write the feature matrix of the enriched dataset
    Features {
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    /// Train the ridge price model and write the metrics report
    Train {
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        lambda: Option<f64>,
        #[arg(long)]
        test_ratio: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Predict prices for an enriched dataset
    Predict {
        #[arg(long)]
        input: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    /// dataset -> features -> train (optionally scrape first)
    Run {
        #[arg(long)]
        scrape: bool,
        #[arg(long)]
        archive: bool,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

impl CliArgs {
    /// 命令列參數覆寫 TOML 設定
    pub fn apply_overrides(&self, config: &mut ProjectConfig) {
        if self.monitor {
            config.monitoring.enabled = true;
        }

        match &self.command {
            Command::Scrape {
                output,
                max_pages,
                start_urls,
            } => {
                if let Some(output) = output {
                    config.scrape.output = output.clone();
                }
                if let Some(max_pages) = max_pages {
                    config.scrape.max_pages = *max_pages;
                }
                if !start_urls.is_empty() {
                    config.scrape.start_urls = start_urls.clone();
                }
            }
            Command::Dataset {
                listings,
                cities,
                output,
            } => {
                if let Some(listings) = listings {
                    config.dataset.listings = listings.clone();
                }
                if let Some(cities) = cities {
                    config.dataset.cities = cities.clone();
                }
                if let Some(output) = output {
                    config.dataset.output = output.clone();
                }
            }
            Command::Features { input, output } => {
                if let Some(input) = input {
                    config.features.input = input.clone();
                }
                if let Some(output) = output {
                    config.features.output = output.clone();
                }
            }
            Command::Train {
                input,
                lambda,
                test_ratio,
                seed,
            } => {
                if let Some(input) = input {
                    config.model.input = input.clone();
                }
                if let Some(lambda) = lambda {
                    config.model.ridge_lambda = *lambda;
                }
                if let Some(test_ratio) = test_ratio {
                    config.model.test_ratio = *test_ratio;
                }
                if let Some(seed) = seed {
                    config.model.seed = *seed;
                }
            }
            Command::Predict {
                input,
                model,
                output,
            } => {
                if let Some(input) = input {
                    config.predict.input = input.clone();
                }
                if let Some(model) = model {
                    config.predict.model = model.clone();
                }
                if let Some(output) = output {
                    config.predict.output = output.clone();
                }
            }
            Command::Inspect { .. } | Command::Run { .. } | Command::CheckConfig => {}
        }
    }
}
