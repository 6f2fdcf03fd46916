use crate::app::pipelines::dataset_pipeline::output_paths;
use crate::app::pipelines::{DatasetPipeline, FeaturePipeline, ScrapePipeline, TrainPipeline};
use crate::config::ProjectConfig;
use crate::core::etl::EtlEngine;
use crate::core::{PageFetcher, Pipeline, Storage};
use crate::utils::archive::bundle_files;
use crate::utils::error::Result;
use chrono::Utc;

pub const ARCHIVE_DIR: &str = "reports";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowReport {
    /// (stage, output) in execution order
    pub stages: Vec<(String, String)>,
    pub archive: Option<String>,
}

/// 依序執行 dataset -> features -> train，第一個失敗的階段即中止
pub struct Workflow<S: Storage + Clone> {
    storage: S,
    config: ProjectConfig,
}

impl<S: Storage + Clone> Workflow<S> {
    pub fn new(storage: S, config: ProjectConfig) -> Self {
        Self { storage, config }
    }

    async fn run_stage<P: Pipeline>(&self, pipeline: P, report: &mut WorkflowReport) -> Result<()> {
        let name = pipeline.name().to_string();
        let engine = EtlEngine::new_with_monitoring(pipeline, self.config.monitoring.enabled);
        let output = engine.run().await?;
        report.stages.push((name, output));
        Ok(())
    }

    pub async fn run(&self, archive: bool) -> Result<WorkflowReport> {
        self.run_from_dataset(WorkflowReport::default(), archive, None)
            .await
    }

    /// 先爬取，dataset 階段改讀本次爬取的輸出
    pub async fn run_with_scrape<F: PageFetcher + 'static>(
        &self,
        fetcher: F,
        archive: bool,
    ) -> Result<WorkflowReport> {
        let mut report = WorkflowReport::default();
        let scrape = ScrapePipeline::new(self.storage.clone(), fetcher, self.config.scrape.clone())?;
        self.run_stage(scrape, &mut report).await?;
        self.run_from_dataset(report, archive, Some(self.config.scrape.output.as_str()))
            .await
    }

    async fn run_from_dataset(
        &self,
        mut report: WorkflowReport,
        archive: bool,
        scraped: Option<&str>,
    ) -> Result<WorkflowReport> {
        let config = &self.config;

        let mut dataset = config.dataset.clone();
        if let Some(listings) = scraped {
            if dataset.listings != listings {
                tracing::info!(
                    "🔗 dataset.listings {} replaced by scrape output {}",
                    dataset.listings,
                    listings
                );
                dataset.listings = listings.to_string();
            }
        }

        self.run_stage(DatasetPipeline::new(self.storage.clone(), dataset), &mut report)
            .await?;
        self.run_stage(
            FeaturePipeline::new(self.storage.clone(), config.features.clone()),
            &mut report,
        )
        .await?;
        self.run_stage(
            TrainPipeline::new(
                self.storage.clone(),
                config.model.clone(),
                config.training_options(),
            ),
            &mut report,
        )
        .await?;

        if archive {
            report.archive = Some(self.write_archive(scraped.is_some()).await?);
        }
        Ok(report)
    }

    fn artifacts(&self, scraped: bool) -> Vec<String> {
        let config = &self.config;
        let mut paths = Vec::new();
        if scraped {
            paths.push(config.scrape.output.clone());
        }
        paths.extend(output_paths(&config.dataset).into_iter().map(|(_, path)| path));
        paths.push(config.features.output.clone());
        paths.push(config.model.output.clone());
        paths.push(config.model.metrics.clone());
        paths
    }

    /// 將本次產出打包成 reports/run-<UTC>.zip
    async fn write_archive(&self, scraped: bool) -> Result<String> {
        let mut entries = Vec::new();
        for path in self.artifacts(scraped) {
            let data = self.storage.read_file(&path).await?;
            entries.push((path, data));
        }

        let bundle = bundle_files(&entries)?;
        let archive_path = format!(
            "{}/run-{}.zip",
            ARCHIVE_DIR,
            Utc::now().format("%Y%m%dT%H%M%SZ")
        );
        self.storage.write_file(&archive_path, &bundle).await?;
        tracing::info!("📦 {} artifacts archived to {}", entries.len(), archive_path);
        Ok(archive_path)
    }
}
