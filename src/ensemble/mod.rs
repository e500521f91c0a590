//! Accuracy-weighted ensemble over the three base classifiers.
//!
//! Training splits once (seeded shuffle), fits the scaler on the training
//! split only, scores every member on the held-out slice, and turns those
//! scores into combination weights. At inference the members' probability
//! distributions are combined, never their hard labels, so a confident
//! minority can still move the final call.

pub mod classifiers;
pub mod scaler;

pub use classifiers::{ClassifierKind, TrainedClassifier};
pub use scaler::StandardScaler;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::PredictorError;
use crate::features::FeatureTable;

/// Fixed shuffle seed so training is reproducible run to run.
pub const SPLIT_SEED: u64 = 42;

/// Held-out fraction: one fifth, at least one row.
fn test_size(n: usize) -> usize {
    (n / 5).max(1)
}

/// One fitted member with its held-out accuracy and combination weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleMember {
    pub model: TrainedClassifier,
    pub accuracy: f64,
    pub weight: f64,
}

/// The trained ensemble: scaler, members, and the score report that produced
/// the weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleModel {
    pub scaler: StandardScaler,
    pub members: Vec<EnsembleMember>,
    pub n_classes: usize,
}

impl EnsembleModel {
    /// Train all members on the feature table.
    ///
    /// A member whose fit fails is excluded with a warning; training fails
    /// only when no member survives.
    pub fn train(table: &FeatureTable) -> Result<Self, PredictorError> {
        let x = table.matrix();
        let y = &table.labels;
        let n = x.nrows();
        if n < 2 {
            return Err(PredictorError::Training(format!(
                "need at least 2 rows to split, got {n}"
            )));
        }
        let n_classes = y.iter().max().map(|&m| m + 1).unwrap_or(0).max(2);

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(SPLIT_SEED));
        let (test_idx, train_idx) = indices.split_at(test_size(n));

        let x_train = select_rows(&x, train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let x_test = select_rows(&x, test_idx);
        let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

        // The scaler sees only the training split; the held-out rows go
        // through the same fitted transform.
        let scaler = StandardScaler::fit(&x_train)?;
        let x_train = scaler.transform(&x_train);
        let x_test = scaler.transform(&x_test);

        let mut fitted = Vec::new();
        for kind in ClassifierKind::ALL {
            match TrainedClassifier::fit(kind, &x_train, &y_train, n_classes) {
                Ok(model) => {
                    let accuracy = held_out_accuracy(&model, &x_test, &y_test);
                    info!("{}: held-out accuracy {:.3}", kind.name(), accuracy);
                    fitted.push((model, accuracy));
                }
                Err(e) => warn!("{} excluded from ensemble: {e}", kind.name()),
            }
        }
        if fitted.is_empty() {
            return Err(PredictorError::Training(
                "every ensemble member failed to fit".to_string(),
            ));
        }

        let weights = adjust_weights(&fitted.iter().map(|(_, a)| *a).collect::<Vec<_>>());
        let members = fitted
            .into_iter()
            .zip(weights)
            .map(|((model, accuracy), weight)| EnsembleMember {
                model,
                accuracy,
                weight,
            })
            .collect();

        Ok(EnsembleModel {
            scaler,
            members,
            n_classes,
        })
    }

    /// Held-out accuracy per member, keyed by classifier name.
    pub fn score_report(&self) -> BTreeMap<String, f64> {
        self.members
            .iter()
            .map(|m| (m.model.kind().name().to_string(), m.accuracy))
            .collect()
    }

    /// Combined class distribution for one raw (unscaled) feature row.
    pub fn predict_proba(&self, row: &Array1<f64>) -> Vec<f64> {
        let scaled = self.scaler.transform_row(row);
        let weights: Vec<f64> = self.members.iter().map(|m| m.weight).collect();
        let dists: Vec<Vec<f64>> = self
            .members
            .iter()
            .map(|m| m.model.predict_proba(&scaled))
            .collect();
        combine_distributions(&weights, &dists)
    }

    pub fn predict(&self, row: &Array1<f64>) -> usize {
        classifiers::argmax(&self.predict_proba(row))
    }
}

/// Map held-out accuracies to combination weights: proportional shares, or
/// uniform when every member scored zero. Output always sums to 1.
pub fn adjust_weights(accuracies: &[f64]) -> Vec<f64> {
    let total: f64 = accuracies.iter().sum();
    if total > f64::EPSILON {
        accuracies.iter().map(|a| a / total).collect()
    } else {
        vec![1.0 / accuracies.len() as f64; accuracies.len()]
    }
}

/// Probability-level combination: the weighted sum of member distributions,
/// renormalized. Hard labels never enter this function.
pub fn combine_distributions(weights: &[f64], dists: &[Vec<f64>]) -> Vec<f64> {
    let n_classes = dists.first().map(Vec::len).unwrap_or(0);
    let mut combined = vec![0.0; n_classes];
    for (w, dist) in weights.iter().zip(dists) {
        for (c, p) in combined.iter_mut().zip(dist) {
            *c += w * p;
        }
    }
    let total: f64 = combined.iter().sum();
    if total > f64::EPSILON {
        for c in combined.iter_mut() {
            *c /= total;
        }
    }
    combined
}

fn held_out_accuracy(model: &TrainedClassifier, x: &Array2<f64>, y: &[usize]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let correct = x
        .axis_iter(Axis(0))
        .zip(y)
        .filter(|(row, &label)| model.predict(&row.to_owned()) == label)
        .count();
    correct as f64 / y.len() as f64
}

fn select_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    let rows: Vec<f64> = indices
        .iter()
        .flat_map(|&i| x.row(i).to_vec())
        .collect();
    Array2::from_shape_vec((indices.len(), x.ncols()), rows)
        .unwrap_or_else(|_| Array2::zeros((0, x.ncols())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::records::RaceStatus;
    use crate::features::{FeatureBuilder, FEATURE_NAMES};
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn weights_are_proportional_to_accuracy() {
        let w = adjust_weights(&[0.8, 0.2]);
        assert_relative_eq!(w[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(w[1], 0.2, epsilon = 1e-12);
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn all_zero_accuracies_fall_back_to_uniform() {
        let w = adjust_weights(&[0.0, 0.0, 0.0]);
        for v in &w {
            assert_relative_eq!(*v, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn combination_happens_at_probability_level() {
        // Two maximally disagreeing members at equal weight: the combined
        // distribution is genuinely split, not a coin flip between labels.
        let combined = combine_distributions(&[0.5, 0.5], &[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_relative_eq!(combined[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(combined[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn unequal_weights_tilt_the_combination() {
        let combined = combine_distributions(&[0.9, 0.1], &[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_relative_eq!(combined[0], 0.9, epsilon = 1e-12);
    }

    fn synthetic_table(n_rounds: u32) -> FeatureTable {
        // Two drivers: one always on the podium, one never.
        let mut records = Vec::new();
        for round in 1..=n_rounds {
            for (driver, team, grid, finish, points) in [
                ("Front", "FastTeam", 1, 1, 25.0),
                ("Back", "SlowTeam", 18, 15, 0.0),
            ] {
                records.push(crate::data::records::EventRecord {
                    season: 2025,
                    round,
                    event_name: format!("Round {round}"),
                    competitor_id: driver.to_string(),
                    constructor_id: team.to_string(),
                    grid_position: Some(grid),
                    finish_position: Some(finish),
                    points,
                    status: RaceStatus::Finished,
                });
            }
        }
        FeatureBuilder::build(&records).unwrap()
    }

    #[test]
    fn training_is_reproducible_and_weights_sum_to_one() {
        let table = synthetic_table(10);
        let first = EnsembleModel::train(&table).unwrap();
        let second = EnsembleModel::train(&table).unwrap();
        let total: f64 = first.members.iter().map(|m| m.weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        for (a, b) in first.members.iter().zip(&second.members) {
            assert_relative_eq!(a.weight, b.weight, epsilon = 1e-12);
            assert_relative_eq!(a.accuracy, b.accuracy, epsilon = 1e-12);
        }
    }

    #[test]
    fn trained_ensemble_separates_front_from_back() {
        let table = synthetic_table(10);
        let model = EnsembleModel::train(&table).unwrap();
        let latest = table.latest_per_competitor();
        let front = Array1::from_vec(latest["Front"].values.to_vec());
        let back = Array1::from_vec(latest["Back"].values.to_vec());
        let p_front = model.predict_proba(&front);
        let p_back = model.predict_proba(&back);
        assert_eq!(p_front.len(), 2);
        assert_eq!(front.len(), FEATURE_NAMES.len());
        assert!(p_front[1] > p_back[1], "podium probability should favor the front-runner");
        assert_relative_eq!(p_front.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn too_few_rows_is_a_training_error() {
        let table = FeatureTable {
            rows: vec![],
            labels: vec![],
            dropped: 0,
        };
        assert!(EnsembleModel::train(&table).is_err());
        let one = synthetic_table(1);
        let single = FeatureTable {
            rows: one.rows[..1].to_vec(),
            labels: one.labels[..1].to_vec(),
            dropped: 0,
        };
        assert!(EnsembleModel::train(&single).is_err());
    }

    #[test]
    fn score_report_names_every_member() {
        let table = synthetic_table(10);
        let model = EnsembleModel::train(&table).unwrap();
        let report = model.score_report();
        assert_eq!(report.len(), model.members.len());
        assert!(report.contains_key("logistic_regression"));
    }

    #[test]
    fn combined_row_prediction_matches_argmax() {
        let table = synthetic_table(10);
        let model = EnsembleModel::train(&table).unwrap();
        let row = array![1.0, 25.0, 0.0, 0.0, 1.0, 25.0, 10.0];
        let probs = model.predict_proba(&row);
        assert_eq!(model.predict(&row), classifiers::argmax(&probs));
    }
}
