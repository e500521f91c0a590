//! Feature standardization. Fit once on the training split, applied to every
//! matrix that reaches the classifiers afterwards.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::PredictorError;

/// Per-column zero-mean unit-variance scaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics. Zero-variance columns get a unit divisor so
    /// they pass through centered instead of exploding.
    pub fn fit(x: &Array2<f64>) -> Result<Self, PredictorError> {
        if x.nrows() == 0 {
            return Err(PredictorError::Training(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }
        let n = x.nrows() as f64;
        let means: Vec<f64> = x.mean_axis(Axis(0)).map(|m| m.to_vec()).unwrap_or_default();
        let stds: Vec<f64> = x
            .axis_iter(Axis(1))
            .zip(&means)
            .map(|(col, &mean)| {
                let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Ok(StandardScaler { means, stds })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.means[j]) / self.stds[j];
            }
        }
        out
    }

    pub fn transform_row(&self, row: &Array1<f64>) -> Array1<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.means[j]) / self.stds[j])
            .collect()
    }
}
