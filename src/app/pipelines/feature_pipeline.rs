use crate::app::csv_io::read_enriched;
use crate::config::toml_config::FeaturesConfig;
use crate::core::{EnrichedListing, Pipeline, Storage};
use crate::domain::services::features::{FeatureSchema, TARGET_COLUMN};
use crate::utils::error::{EtlError, Result};

pub struct FeatureMatrix {
    pub schema: FeatureSchema,
    pub rows: Vec<Vec<f64>>,
    pub prices: Vec<u64>,
}

/// 將豐富化資料集轉為數值特徵矩陣
pub struct FeaturePipeline<S: Storage> {
    storage: S,
    config: FeaturesConfig,
}

impl<S: Storage> FeaturePipeline<S> {
    pub fn new(storage: S, config: FeaturesConfig) -> Self {
        Self { storage, config }
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.6}", value)
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for FeaturePipeline<S> {
    type Extracted = Vec<EnrichedListing>;
    type Transformed = FeatureMatrix;

    fn name(&self) -> &str {
        "features"
    }

    async fn extract(&self) -> Result<Vec<EnrichedListing>> {
        let data = self.storage.read_file(&self.config.input).await?;
        let rows = read_enriched(&data)?;
        tracing::info!("📄 {} enriched rows from {}", rows.len(), self.config.input);
        Ok(rows)
    }

    async fn transform(&self, data: Vec<EnrichedListing>) -> Result<FeatureMatrix> {
        let schema = FeatureSchema::fit(&data)?;
        let rows = schema.transform_all(&data);
        let prices = data.iter().map(|r| r.price).collect();
        tracing::info!(
            "🔢 {} features ({} departments)",
            schema.len(),
            schema.departments.len()
        );

        Ok(FeatureMatrix {
            schema,
            rows,
            prices,
        })
    }

    async fn load(&self, result: FeatureMatrix) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header: Vec<&str> = result.schema.names.iter().map(String::as_str).collect();
        header.push(TARGET_COLUMN);
        writer.write_record(&header)?;

        for (row, price) in result.rows.iter().zip(&result.prices) {
            let mut record: Vec<String> = row.iter().copied().map(format_value).collect();
            record.push(price.to_string());
            writer.write_record(&record)?;
        }

        let data = writer
            .into_inner()
            .map_err(|e| EtlError::processing(format!("Failed to flush CSV: {}", e)))?;
        self.storage.write_file(&self.config.output, &data).await?;
        Ok(self.config.output.clone())
    }
}
