use crate::app::csv_io::{read_cities, read_listings, sibling_path, write_csv};
use crate::config::toml_config::DatasetConfig;
use crate::core::{City, EnrichedListing, Listing, Pipeline, Storage};
use crate::domain::services::city_matcher::CityIndex;
use crate::domain::services::cleaning::{clean_listings, join_cities};
use crate::utils::error::Result;
use serde::Serialize;

pub struct DatasetInput {
    pub listings: Vec<Listing>,
    pub invalid: usize,
    pub cities: Vec<City>,
}

/// 資料集建置的各階段筆數
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetReport {
    pub read: usize,
    pub invalid: usize,
    pub duplicates: usize,
    pub out_of_range: usize,
    pub inconsistent_rooms: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    pub written: usize,
}

pub struct DatasetOutput {
    pub rows: Vec<EnrichedListing>,
    pub report: DatasetReport,
}

pub struct DatasetPipeline<S: Storage> {
    storage: S,
    config: DatasetConfig,
}

impl<S: Storage> DatasetPipeline<S> {
    pub fn new(storage: S, config: DatasetConfig) -> Self {
        Self { storage, config }
    }
}

/// 每種輸出格式對應的檔案路徑，TSV/JSON 與 CSV 共用檔名主幹
pub fn output_paths(config: &DatasetConfig) -> Vec<(String, String)> {
    config
        .output_formats
        .iter()
        .map(|format| {
            let path = match format.as_str() {
                "csv" => config.output.clone(),
                other => sibling_path(&config.output, other),
            };
            (format.clone(), path)
        })
        .collect()
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for DatasetPipeline<S> {
    type Extracted = DatasetInput;
    type Transformed = DatasetOutput;

    fn name(&self) -> &str {
        "dataset"
    }

    async fn extract(&self) -> Result<DatasetInput> {
        tracing::debug!("Reading raw listings from {}", self.config.listings);
        let raw = self.storage.read_file(&self.config.listings).await?;
        let (listings, invalid) = read_listings(&raw)?;

        tracing::debug!("Reading communes from {}", self.config.cities);
        let reference = self.storage.read_file(&self.config.cities).await?;
        let cities = read_cities(&reference, &self.config.city_columns)?;
        tracing::info!(
            "📄 {} raw listings ({} invalid), {} communes",
            listings.len() + invalid,
            invalid,
            cities.len()
        );

        Ok(DatasetInput {
            listings,
            invalid,
            cities,
        })
    }

    async fn transform(&self, data: DatasetInput) -> Result<DatasetOutput> {
        let read = data.listings.len() + data.invalid;
        let (cleaned, cleaning) = clean_listings(data.listings, &self.config.cleaning_rules());

        let index = CityIndex::build(data.cities);
        let (rows, join) = join_cities(
            cleaned,
            &index,
            self.config.join,
            &self.config.preferred_departments,
        );

        let report = DatasetReport {
            read,
            invalid: data.invalid,
            duplicates: cleaning.duplicates,
            out_of_range: cleaning.price_out_of_range + cleaning.surface_out_of_range,
            inconsistent_rooms: cleaning.inconsistent_rooms,
            matched: join.matched,
            ambiguous: join.ambiguous,
            unmatched: join.unmatched,
            written: join.written,
        };
        tracing::info!(
            "🧹 read={} invalid={} duplicates={} out_of_range={} inconsistent={} matched={} ambiguous={} unmatched={} written={}",
            report.read,
            report.invalid,
            report.duplicates,
            report.out_of_range,
            report.inconsistent_rooms,
            report.matched,
            report.ambiguous,
            report.unmatched,
            report.written
        );

        Ok(DatasetOutput { rows, report })
    }

    async fn load(&self, result: DatasetOutput) -> Result<String> {
        let mut written = Vec::new();

        for (format, path) in output_paths(&self.config) {
            let data = match format.as_str() {
                "tsv" => write_csv(&result.rows, b'\t')?,
                "json" => serde_json::to_vec_pretty(&result.rows)?,
                _ => write_csv(&result.rows, b',')?,
            };
            self.storage.write_file(&path, &data).await?;
            tracing::debug!("Wrote {} ({} bytes)", path, data.len());
            written.push(path);
        }

        Ok(written.join(", "))
    }
}
