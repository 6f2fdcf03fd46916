use crate::app::csv_io::read_enriched;
use crate::config::toml_config::ModelConfig;
use crate::core::{EnrichedListing, Pipeline, Storage};
use crate::domain::services::metrics::RegressionMetrics;
use crate::domain::services::price_model::{PriceModel, TrainingOptions};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// reports/metrics.json 的內容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub trained_at: DateTime<Utc>,
    pub features: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub ridge_lambda: f64,
    pub log_target: bool,
    pub train: Option<RegressionMetrics>,
    pub test: Option<RegressionMetrics>,
}

impl From<&PriceModel> for MetricsReport {
    fn from(model: &PriceModel) -> Self {
        Self {
            trained_at: model.trained_at,
            features: model.schema.len(),
            train_rows: model.train_rows,
            test_rows: model.test_rows,
            ridge_lambda: model.ridge_lambda,
            log_target: model.log_target,
            train: model.train_metrics.clone(),
            test: model.test_metrics.clone(),
        }
    }
}

fn log_metrics(set: &str, metrics: Option<&RegressionMetrics>) {
    match metrics {
        Some(m) => tracing::info!(
            "📈 {} ({} rows): RMSE={:.0} € MAE={:.0} € R²={:.3} MAPE={:.1}%",
            set,
            m.count,
            m.rmse,
            m.mae,
            m.r2,
            m.mape
        ),
        None => tracing::info!("📈 {}: no rows", set),
    }
}

pub struct TrainPipeline<S: Storage> {
    storage: S,
    config: ModelConfig,
    options: TrainingOptions,
}

impl<S: Storage> TrainPipeline<S> {
    pub fn new(storage: S, config: ModelConfig, options: TrainingOptions) -> Self {
        Self {
            storage,
            config,
            options,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for TrainPipeline<S> {
    type Extracted = Vec<EnrichedListing>;
    type Transformed = PriceModel;

    fn name(&self) -> &str {
        "train"
    }

    async fn extract(&self) -> Result<Vec<EnrichedListing>> {
        let data = self.storage.read_file(&self.config.input).await?;
        let rows = read_enriched(&data)?;
        tracing::info!("📄 {} training candidates from {}", rows.len(), self.config.input);
        Ok(rows)
    }

    async fn transform(&self, data: Vec<EnrichedListing>) -> Result<PriceModel> {
        tracing::debug!("Training options: {:?}", self.options);
        let model = PriceModel::train(&data, &self.options)?;
        log_metrics("train", model.train_metrics.as_ref());
        log_metrics("test", model.test_metrics.as_ref());
        Ok(model)
    }

    async fn load(&self, result: PriceModel) -> Result<String> {
        self.storage
            .write_file(&self.config.output, &result.to_json()?)
            .await?;

        let report = serde_json::to_vec_pretty(&MetricsReport::from(&result))?;
        self.storage.write_file(&self.config.metrics, &report).await?;
        tracing::info!("📝 Metrics written to {}", self.config.metrics);

        Ok(self.config.output.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::csv_io::write_csv;
    use crate::app::pipelines::test_support::MockStorage;
    use crate::core::etl::EtlEngine;
    use crate::core::Listing;
    use crate::domain::model::{City, EnergyRating, PropertyType};

    /// Enriched CSV whose price is close to linear in surface.
    pub(crate) fn enriched_csv(n: usize) -> Vec<u8> {
        let cities = [
            ("75056", "75", 48.86, 2.35),
            ("77284", "77", 48.96, 2.88),
        ];
        let rows: Vec<EnrichedListing> = (0..n)
            .map(|i| {
                let (insee, dep, lat, lon) = cities[i % 2];
                let surface = 30 + (i as u32 * 7) % 120;
                let rooms = 1 + surface / 25;
                let premium = if dep == "75" { 4_000 } else { 2_500 };
                let listing = Listing {
                    city: format!("Ville {}", i % 2),
                    property_type: if i % 3 == 0 {
                        PropertyType::House
                    } else {
                        PropertyType::Apartment
                    },
                    surface: Some(surface),
                    rooms: Some(rooms),
                    bedrooms: Some(rooms.saturating_sub(1)),
                    bathrooms: if i % 4 == 0 { None } else { Some(1) },
                    dpe: EnergyRating::from_letter(['A', 'C', 'D', 'F'][i % 4]),
                    price: u64::from(surface * premium + (i as u32 % 5) * 1_000),
                };
                let city = City {
                    name: listing.city.clone(),
                    insee_code: insee.to_string(),
                    postal_code: None,
                    department_code: Some(dep.to_string()),
                    department_name: None,
                    region_name: None,
                    latitude: Some(lat),
                    longitude: Some(lon),
                };
                EnrichedListing::new(listing, Some(&city))
            })
            .collect();
        write_csv(&rows, b',').unwrap()
    }

    fn config() -> ModelConfig {
        ModelConfig {
            input: "enriched.csv".to_string(),
            output: "models/model.json".to_string(),
            metrics: "reports/metrics.json".to_string(),
            ..ModelConfig::default()
        }
    }

    fn options() -> TrainingOptions {
        TrainingOptions {
            test_ratio: 0.25,
            seed: 42,
            ridge_lambda: 0.1,
            log_target: true,
        }
    }

    #[tokio::test]
    async fn test_training_writes_model_and_metrics() {
        let storage = MockStorage::new();
        storage.put("enriched.csv", &enriched_csv(40)).await;

        let output = EtlEngine::new(TrainPipeline::new(storage.clone(), config(), options()))
            .run()
            .await
            .unwrap();
        assert_eq!(output, "models/model.json");

        let model = PriceModel::from_json(&storage.get_file("models/model.json").await.unwrap()).unwrap();
        assert_eq!(model.train_rows, 30);
        assert_eq!(model.test_rows, 10);

        let report: MetricsReport =
            serde_json::from_slice(&storage.get_file("reports/metrics.json").await.unwrap()).unwrap();
        assert_eq!(report.trained_at, model.trained_at);
        assert_eq!(report.features, model.schema.len());
        assert_eq!(report.test.unwrap().count, 10);
        assert!(model.test_metrics.unwrap().r2 > 0.5);
    }

    #[tokio::test]
    async fn test_single_row_cannot_be_trained() {
        let storage = MockStorage::new();
        storage.put("enriched.csv", &enriched_csv(1)).await;

        let err = EtlEngine::new(TrainPipeline::new(storage.clone(), config(), options()))
            .run()
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(storage.get_file("models/model.json").await.is_none());
    }
}
