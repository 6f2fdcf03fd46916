//! Ridge regression on standardized features, solved in closed form.

use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};

const PIVOT_EPSILON: f64 = 1e-12;
// 相對於原對角線的秩判定門檻
const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[Vec<f64>]) -> Result<Self> {
        let width = check_matrix(x)?;
        let n = x.len() as f64;

        let mut means = vec![0.0; width];
        for row in x {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }

        let mut stds = vec![0.0; width];
        for row in x {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        // 常數欄位不縮放
        for s in stds.iter_mut() {
            *s = s.sqrt();
            if *s < PIVOT_EPSILON {
                *s = 1.0;
            }
        }

        Ok(Self { means, stds })
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform_all(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform(row)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl RidgeRegression {
    /// Solves `(XcᵀXc + λI) w = Xcᵀyc` on centred data; the intercept is not
    /// penalised.
    pub fn fit(x: &[Vec<f64>], y: &[f64], lambda: f64) -> Result<Self> {
        let width = check_matrix(x)?;
        if x.len() != y.len() {
            return Err(EtlError::model(format!(
                "Feature rows ({}) and targets ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if !(lambda >= 0.0) {
            return Err(EtlError::model(format!("Invalid ridge lambda: {}", lambda)));
        }

        let n = x.len() as f64;
        let y_mean = y.iter().sum::<f64>() / n;
        let mut x_mean = vec![0.0; width];
        for row in x {
            for (m, v) in x_mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }

        let mut gram = vec![vec![0.0; width]; width];
        let mut rhs = vec![0.0; width];
        for (row, target) in x.iter().zip(y) {
            let centred: Vec<f64> = row.iter().zip(&x_mean).map(|(v, m)| v - m).collect();
            let yc = target - y_mean;
            for i in 0..width {
                rhs[i] += centred[i] * yc;
                for j in 0..=i {
                    gram[i][j] += centred[i] * centred[j];
                }
            }
        }
        for i in 0..width {
            gram[i][i] += lambda;
            for j in 0..i {
                gram[j][i] = gram[i][j];
            }
        }

        let coefficients = cholesky_solve(gram, &rhs)?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, v)| w * v)
                .sum::<f64>()
    }
}

fn check_matrix(x: &[Vec<f64>]) -> Result<usize> {
    let first = x
        .first()
        .ok_or_else(|| EtlError::model("Cannot fit on an empty matrix"))?;
    let width = first.len();
    if x.iter().any(|row| row.len() != width) {
        return Err(EtlError::model("Feature rows have different lengths"));
    }
    Ok(width)
}

/// Columns whose pivot vanishes (constant, or collinear with earlier columns
/// when λ = 0) are left out and get a zero coefficient.
fn cholesky_solve(a: Vec<Vec<f64>>, b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    let mut l = vec![vec![0.0; n]; n];
    let mut active = vec![true; n];

    for j in 0..n {
        let diag = a[j][j] - (0..j).map(|k| l[j][k] * l[j][k]).sum::<f64>();
        if !diag.is_finite() {
            return Err(EtlError::model(
                "Normal equations contain non-finite values; check the feature matrix",
            ));
        }
        if diag <= PIVOT_EPSILON.max(a[j][j].abs() * RANK_TOLERANCE) {
            tracing::debug!("Feature column {} is redundant, coefficient fixed to 0", j);
            active[j] = false;
            continue;
        }
        l[j][j] = diag.sqrt();
        for i in j + 1..n {
            let s = a[i][j] - (0..j).map(|k| l[i][k] * l[j][k]).sum::<f64>();
            l[i][j] = s / l[j][j];
        }
    }

    // L z = b
    let mut z = vec![0.0; n];
    for i in (0..n).filter(|&i| active[i]) {
        let s = b[i] - (0..i).map(|k| l[i][k] * z[k]).sum::<f64>();
        z[i] = s / l[i][i];
    }
    // Lᵀ w = z
    let mut w = vec![0.0; n];
    for i in (0..n).rev().filter(|&i| active[i]) {
        let s = z[i] - (i + 1..n).map(|k| l[k][i] * w[k]).sum::<f64>();
        w[i] = s / l[i][i];
    }
    Ok(w)
}

/// 依種子洗牌後切分訓練/測試索引
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if n < 2 {
        return Err(EtlError::model(format!(
            "At least 2 rows are needed to train, got {}",
            n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    fastrand::Rng::with_seed(seed).shuffle(&mut indices);

    let mut test_len = (n as f64 * test_ratio).round() as usize;
    if test_ratio > 0.0 {
        test_len = test_len.max(1);
    }
    test_len = test_len.min(n - 1);

    let train = indices.split_off(test_len);
    Ok((train, indices))
}
