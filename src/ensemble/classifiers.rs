//! The three base classifiers behind the ensemble. All are hand-rolled over
//! ndarray so trained state serializes straight to the artifact file.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::PredictorError;

const LR_EPOCHS: usize = 500;
const LR_INITIAL: f64 = 0.1;
const LR_DECAY: f64 = 0.999;
const L2_PENALTY: f64 = 1e-4;
const NB_VAR_FLOOR: f64 = 1e-9;
const KNN_NEIGHBORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    LogisticRegression,
    GaussianNb,
    Knn,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 3] = [
        ClassifierKind::LogisticRegression,
        ClassifierKind::GaussianNb,
        ClassifierKind::Knn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ClassifierKind::LogisticRegression => "logistic_regression",
            ClassifierKind::GaussianNb => "gaussian_nb",
            ClassifierKind::Knn => "knn",
        }
    }
}

/// A fitted classifier. Probabilities come back as one distribution per
/// class, always summing to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    LogisticRegression {
        /// One weight vector per class (one-vs-rest)
        weights: Vec<Vec<f64>>,
        biases: Vec<f64>,
    },
    GaussianNb {
        priors: Vec<f64>,
        means: Vec<Vec<f64>>,
        variances: Vec<Vec<f64>>,
    },
    Knn {
        k: usize,
        points: Vec<Vec<f64>>,
        labels: Vec<usize>,
        n_classes: usize,
    },
}

impl TrainedClassifier {
    pub fn fit(
        kind: ClassifierKind,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self, PredictorError> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(PredictorError::Training(format!(
                "{}: {} rows vs {} labels",
                kind.name(),
                x.nrows(),
                y.len()
            )));
        }
        if n_classes < 2 {
            return Err(PredictorError::Training(format!(
                "{}: need at least 2 classes, got {n_classes}",
                kind.name()
            )));
        }
        match kind {
            ClassifierKind::LogisticRegression => fit_logistic(x, y, n_classes),
            ClassifierKind::GaussianNb => fit_gaussian_nb(x, y, n_classes),
            ClassifierKind::Knn => Ok(TrainedClassifier::Knn {
                k: KNN_NEIGHBORS.min(x.nrows()),
                points: x.rows().into_iter().map(|r| r.to_vec()).collect(),
                labels: y.to_vec(),
                n_classes,
            }),
        }
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            TrainedClassifier::LogisticRegression { .. } => ClassifierKind::LogisticRegression,
            TrainedClassifier::GaussianNb { .. } => ClassifierKind::GaussianNb,
            TrainedClassifier::Knn { .. } => ClassifierKind::Knn,
        }
    }

    /// Class probability distribution for one (already scaled) row.
    pub fn predict_proba(&self, row: &Array1<f64>) -> Vec<f64> {
        match self {
            TrainedClassifier::LogisticRegression { weights, biases } => {
                let scores: Vec<f64> = weights
                    .iter()
                    .zip(biases)
                    .map(|(w, b)| sigmoid(dot(w, row) + b))
                    .collect();
                normalize(scores)
            }
            TrainedClassifier::GaussianNb {
                priors,
                means,
                variances,
            } => {
                // Work in log space, shift by the max before exponentiating.
                let log_likes: Vec<f64> = priors
                    .iter()
                    .zip(means)
                    .zip(variances)
                    .map(|((&prior, mean), var)| {
                        let mut ll = if prior > 0.0 { prior.ln() } else { f64::MIN / 4.0 };
                        for (j, &v) in row.iter().enumerate() {
                            let m = mean[j];
                            let s2 = var[j].max(NB_VAR_FLOOR);
                            ll += -0.5 * ((v - m).powi(2) / s2 + s2.ln() + (2.0 * std::f64::consts::PI).ln());
                        }
                        ll
                    })
                    .collect();
                let max = log_likes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                normalize(log_likes.iter().map(|ll| (ll - max).exp()).collect())
            }
            TrainedClassifier::Knn {
                k,
                points,
                labels,
                n_classes,
            } => {
                let mut dists: Vec<(f64, usize)> = points
                    .iter()
                    .zip(labels)
                    .map(|(p, &label)| {
                        let d = p
                            .iter()
                            .zip(row.iter())
                            .map(|(a, b)| (a - b).powi(2))
                            .sum::<f64>();
                        (d, label)
                    })
                    .collect();
                dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                let mut votes = vec![0.0; *n_classes];
                for &(_, label) in dists.iter().take(*k) {
                    if label < votes.len() {
                        votes[label] += 1.0;
                    }
                }
                normalize(votes)
            }
        }
    }

    pub fn predict(&self, row: &Array1<f64>) -> usize {
        argmax(&self.predict_proba(row))
    }
}

fn fit_logistic(
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
) -> Result<TrainedClassifier, PredictorError> {
    let n = x.nrows() as f64;
    let dims = x.ncols();
    let mut weights = vec![vec![0.0; dims]; n_classes];
    let mut biases = vec![0.0; n_classes];

    for class in 0..n_classes {
        let targets: Vec<f64> = y.iter().map(|&l| if l == class { 1.0 } else { 0.0 }).collect();
        let w = &mut weights[class];
        let b = &mut biases[class];
        let mut lr = LR_INITIAL;
        for _ in 0..LR_EPOCHS {
            let mut grad_w = vec![0.0; dims];
            let mut grad_b = 0.0;
            for (row, &target) in x.rows().into_iter().zip(&targets) {
                let z: f64 = row.iter().zip(w.iter()).map(|(a, b)| a * b).sum::<f64>() + *b;
                let err = sigmoid(z) - target;
                for (g, &v) in grad_w.iter_mut().zip(row.iter()) {
                    *g += err * v;
                }
                grad_b += err;
            }
            for (wi, g) in w.iter_mut().zip(&grad_w) {
                *wi -= lr * (g / n + L2_PENALTY * *wi);
                if !wi.is_finite() {
                    return Err(PredictorError::Training(
                        "logistic_regression diverged".to_string(),
                    ));
                }
            }
            *b -= lr * grad_b / n;
            lr *= LR_DECAY;
        }
    }
    Ok(TrainedClassifier::LogisticRegression { weights, biases })
}

fn fit_gaussian_nb(
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
) -> Result<TrainedClassifier, PredictorError> {
    let dims = x.ncols();
    let mut counts = vec![0usize; n_classes];
    let mut sums = vec![vec![0.0; dims]; n_classes];
    for (row, &label) in x.rows().into_iter().zip(y) {
        counts[label] += 1;
        for (s, &v) in sums[label].iter_mut().zip(row.iter()) {
            *s += v;
        }
    }
    let means: Vec<Vec<f64>> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &c)| {
            if c == 0 {
                vec![0.0; dims]
            } else {
                sum.iter().map(|s| s / c as f64).collect()
            }
        })
        .collect();
    let mut variances = vec![vec![0.0; dims]; n_classes];
    for (row, &label) in x.rows().into_iter().zip(y) {
        for (j, &v) in row.iter().enumerate() {
            variances[label][j] += (v - means[label][j]).powi(2);
        }
    }
    for (var, &c) in variances.iter_mut().zip(&counts) {
        for v in var.iter_mut() {
            *v = if c == 0 { NB_VAR_FLOOR } else { (*v / c as f64).max(NB_VAR_FLOOR) };
        }
    }
    let n = y.len() as f64;
    let priors = counts.iter().map(|&c| c as f64 / n).collect();
    Ok(TrainedClassifier::GaussianNb {
        priors,
        means,
        variances,
    })
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(w: &[f64], row: &Array1<f64>) -> f64 {
    w.iter().zip(row.iter()).map(|(a, b)| a * b).sum()
}

/// Normalize to a probability distribution; an all-zero vector becomes
/// uniform rather than NaN.
fn normalize(scores: Vec<f64>) -> Vec<f64> {
    let total: f64 = scores.iter().sum();
    if total > f64::EPSILON {
        scores.iter().map(|s| s / total).collect()
    } else {
        vec![1.0 / scores.len() as f64; scores.len()]
    }
}

pub fn argmax(probs: &[f64]) -> usize {
    probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
