use crate::domain::model::EnrichedListing;
use crate::domain::services::features::{price_from_target, target_value, FeatureSchema};
use crate::domain::services::metrics::RegressionMetrics;
use crate::domain::services::regression::{train_test_split, RidgeRegression, StandardScaler};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    pub test_ratio: f64,
    pub seed: u64,
    pub ridge_lambda: f64,
    pub log_target: bool,
}

/// Persisted price model: everything needed to turn an enriched listing into
/// a predicted price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceModel {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub schema: FeatureSchema,
    pub scaler: StandardScaler,
    pub regression: RidgeRegression,
    pub ridge_lambda: f64,
    pub log_target: bool,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_metrics: Option<RegressionMetrics>,
    pub test_metrics: Option<RegressionMetrics>,
}

impl PriceModel {
    pub fn train(rows: &[EnrichedListing], options: &TrainingOptions) -> Result<Self> {
        let (train_idx, test_idx) = train_test_split(rows.len(), options.test_ratio, options.seed)?;
        let train: Vec<EnrichedListing> = train_idx.iter().map(|&i| rows[i].clone()).collect();
        let test: Vec<EnrichedListing> = test_idx.iter().map(|&i| rows[i].clone()).collect();

        let schema = FeatureSchema::fit(&train)?;
        let raw = schema.transform_all(&train);
        let scaler = StandardScaler::fit(&raw)?;
        let x = scaler.transform_all(&raw);
        let y: Vec<f64> = train
            .iter()
            .map(|r| target_value(r.price, options.log_target))
            .collect();

        if y.iter().any(|v| !v.is_finite()) {
            return Err(EtlError::model("Target contains non-finite values (zero price?)"));
        }

        let regression = RidgeRegression::fit(&x, &y, options.ridge_lambda)?;

        let mut model = Self {
            format_version: MODEL_FORMAT_VERSION,
            trained_at: Utc::now(),
            schema,
            scaler,
            regression,
            ridge_lambda: options.ridge_lambda,
            log_target: options.log_target,
            train_rows: train.len(),
            test_rows: test.len(),
            train_metrics: None,
            test_metrics: None,
        };
        model.train_metrics = model.evaluate(&train);
        model.test_metrics = model.evaluate(&test);
        Ok(model)
    }

    /// 預測價格（歐元）
    pub fn predict(&self, row: &EnrichedListing) -> f64 {
        let features = self.scaler.transform(&self.schema.transform(row));
        price_from_target(self.regression.predict(&features), self.log_target)
    }

    pub fn evaluate(&self, rows: &[EnrichedListing]) -> Option<RegressionMetrics> {
        let actual: Vec<f64> = rows.iter().map(|r| r.price as f64).collect();
        let predicted: Vec<f64> = rows.iter().map(|r| self.predict(r)).collect();
        RegressionMetrics::compute(&actual, &predicted)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let model: PriceModel = serde_json::from_slice(data)?;
        if model.format_version != MODEL_FORMAT_VERSION {
            return Err(EtlError::model(format!(
                "Unsupported model format version {} (expected {})",
                model.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if model.schema.len() != model.scaler.means.len()
            || model.schema.len() != model.regression.coefficients.len()
        {
            return Err(EtlError::model("Model artifact is inconsistent"));
        }
        Ok(model)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::PropertyType;

    fn synthetic_rows(n: usize) -> Vec<EnrichedListing> {
        (0..n)
            .map(|i| {
                let surface = 20 + (i as u32 * 7) % 130;
                let house = i % 3 == 0;
                let dep = if i % 2 == 0 { "75" } else { "77" };
                let per_m2 = if dep == "75" { 10_000.0 } else { 3_500.0 };
                let price = surface as f64 * per_m2 * if house { 1.1 } else { 1.0 };
                EnrichedListing {
                    city: format!("Ville {}", i),
                    property_type: if house { PropertyType::House } else { PropertyType::Apartment },
                    surface: Some(surface),
                    rooms: Some(1 + surface / 25),
                    bedrooms: None,
                    bathrooms: Some(1),
                    dpe: None,
                    price: price as u64,
                    insee_code: Some(format!("{}000", dep)),
                    postal_code: None,
                    department_code: Some(dep.to_string()),
                    department_name: None,
                    region_name: None,
                    latitude: Some(48.8),
                    longitude: Some(2.3),
                }
            })
            .collect()
    }

    fn options() -> TrainingOptions {
        TrainingOptions {
            test_ratio: 0.2,
            seed: 42,
            ridge_lambda: 1.0,
            log_target: true,
        }
    }

    #[test]
    fn test_train_and_evaluate() {
        let rows = synthetic_rows(60);
        let model = PriceModel::train(&rows, &options()).unwrap();

        assert_eq!(model.train_rows, 48);
        assert_eq!(model.test_rows, 12);
        let test = model.test_metrics.as_ref().unwrap();
        assert_eq!(test.count, 12);
        assert!(test.r2 > 0.7, "r2 too low: {}", test.r2);
        assert!(model.predict(&rows[0]) > 0.0);
    }

    #[test]
    fn test_json_roundtrip_predicts_identically() {
        let rows = synthetic_rows(30);
        let model = PriceModel::train(&rows, &options()).unwrap();

        let restored = PriceModel::from_json(&model.to_json().unwrap()).unwrap();
        for row in &rows {
            assert!((restored.predict(row) - model.predict(row)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let rows = synthetic_rows(10);
        let mut model = PriceModel::train(&rows, &options()).unwrap();
        model.format_version = 99;
        let err = PriceModel::from_json(&model.to_json().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Unsupported model format version"));
    }

    #[test]
    fn test_train_without_penalty_on_department_indicators() {
        // dep_75 + dep_77 = 1, bedrooms and coordinates are constant
        let rows = synthetic_rows(40);
        let options = TrainingOptions {
            ridge_lambda: 0.0,
            ..options()
        };

        let model = PriceModel::train(&rows, &options).unwrap();

        let train = model.train_metrics.as_ref().unwrap();
        assert!(train.r2 > 0.7, "r2 too low: {}", train.r2);
        assert!(rows.iter().all(|row| model.predict(row).is_finite()));
    }
}
