pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliArgs, Command};

pub use adapters::{HttpFetcher, LocalStorage};
pub use app::pipelines::{
    inspect_ad, DatasetPipeline, FeaturePipeline, PredictPipeline, ScrapePipeline, TrainPipeline,
};
pub use app::{Workflow, WorkflowReport};
pub use config::ProjectConfig;
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
