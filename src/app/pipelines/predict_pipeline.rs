use crate::app::csv_io::{read_enriched, write_csv};
use crate::config::toml_config::PredictConfig;
use crate::core::{EnrichedListing, Pipeline, Storage};
use crate::domain::model::PropertyType;
use crate::domain::services::price_model::PriceModel;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    #[serde(rename = "Ville")]
    pub city: String,
    #[serde(rename = "Type")]
    pub property_type: PropertyType,
    #[serde(rename = "Surface")]
    pub surface: Option<u32>,
    #[serde(rename = "Prix")]
    pub price: u64,
    #[serde(rename = "PrixPredit")]
    pub predicted_price: i64,
    /// PrixPredit - Prix
    #[serde(rename = "Ecart")]
    pub difference: i64,
}

impl PredictionRow {
    pub fn new(row: &EnrichedListing, predicted: f64) -> Self {
        let predicted_price = predicted.round() as i64;
        Self {
            city: row.city.clone(),
            property_type: row.property_type,
            surface: row.surface,
            price: row.price,
            predicted_price,
            difference: predicted_price.saturating_sub(row.price as i64),
        }
    }
}

pub struct PredictInput {
    pub model: PriceModel,
    pub rows: Vec<EnrichedListing>,
}

pub struct PredictPipeline<S: Storage> {
    storage: S,
    config: PredictConfig,
}

impl<S: Storage> PredictPipeline<S> {
    pub fn new(storage: S, config: PredictConfig) -> Self {
        Self { storage, config }
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for PredictPipeline<S> {
    type Extracted = PredictInput;
    type Transformed = Vec<PredictionRow>;

    fn name(&self) -> &str {
        "predict"
    }

    async fn extract(&self) -> Result<PredictInput> {
        let model = PriceModel::from_json(&self.storage.read_file(&self.config.model).await?)?;
        tracing::info!(
            "🧠 Model trained at {} ({} features)",
            model.trained_at,
            model.schema.len()
        );

        let rows = read_enriched(&self.storage.read_file(&self.config.input).await?)?;
        Ok(PredictInput { model, rows })
    }

    async fn transform(&self, data: PredictInput) -> Result<Vec<PredictionRow>> {
        let predictions: Vec<PredictionRow> = data
            .rows
            .iter()
            .map(|row| PredictionRow::new(row, data.model.predict(row)))
            .collect();

        if !predictions.is_empty() {
            let mean_abs = predictions
                .iter()
                .map(|p| p.difference.unsigned_abs() as f64)
                .sum::<f64>()
                / predictions.len() as f64;
            tracing::info!(
                "🔮 {} predictions, mean absolute gap {:.0} €",
                predictions.len(),
                mean_abs
            );
        }
        Ok(predictions)
    }

    async fn load(&self, result: Vec<PredictionRow>) -> Result<String> {
        let csv = write_csv(&result, b',')?;
        self.storage.write_file(&self.config.output, &csv).await?;
        Ok(self.config.output.clone())
    }
}
