use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub count: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// In percent; rows whose actual value is zero are left out.
    pub mape: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            return None;
        }
        let n = actual.len() as f64;

        let mut squared = 0.0;
        let mut absolute = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_count = 0usize;
        for (a, p) in actual.iter().zip(predicted) {
            let err = p - a;
            squared += err * err;
            absolute += err.abs();
            if *a != 0.0 {
                pct_sum += (err / a).abs();
                pct_count += 1;
            }
        }

        let mean = actual.iter().sum::<f64>() / n;
        let total: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if total > 0.0 { 1.0 - squared / total } else { 0.0 };

        Some(Self {
            count: actual.len(),
            rmse: (squared / n).sqrt(),
            mae: absolute / n,
            r2,
            mape: if pct_count > 0 {
                100.0 * pct_sum / pct_count as f64
            } else {
                0.0
            },
        })
    }
}
