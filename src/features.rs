//! Feature engineering: turns raw event records into the numeric table the
//! ensemble trains on.

use ndarray::Array2;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::data::records::EventRecord;
use crate::error::PredictorError;

/// Nominal full field size; also the worst-rank fill for missing positions.
pub const MAX_FIELD_SIZE: f64 = 20.0;

/// Sentinel for DNF/DNS/DSQ: one slot worse than a full field, so
/// non-finishes rank behind every classified finisher instead of vanishing.
pub const NON_FINISH_SENTINEL: f64 = 21.0;

/// Rolling window length for points statistics.
const ROLLING_WINDOW: usize = 3;

/// A podium finish is the training target.
const PODIUM_CUTOFF: u32 = 3;

/// Column order of every feature vector. Consumers index by position; tests
/// index by name through [`FeatureVector::get`].
pub const FEATURE_NAMES: [&str; 7] = [
    "grid_position",
    "points_rolling_mean",
    "points_rolling_std",
    "position_change",
    "consistency_score",
    "constructor_strength",
    "driver_experience",
];

/// One engineered (competitor, event) row. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    pub competitor_id: String,
    pub constructor_id: String,
    pub season: u32,
    pub round: u32,
    pub values: [f64; FEATURE_NAMES.len()],
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| self.values[i])
    }
}

/// The engineered table: rows plus aligned training labels and the count of
/// records dropped as structurally invalid.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Vec<FeatureVector>,
    /// 1 = podium finish, 0 = everything else (including non-finishes)
    pub labels: Vec<usize>,
    pub dropped: usize,
}

impl FeatureTable {
    /// Dense matrix view, rows × FEATURE_NAMES columns.
    pub fn matrix(&self) -> Array2<f64> {
        let n = self.rows.len();
        let flat: Vec<f64> = self.rows.iter().flat_map(|r| r.values).collect();
        Array2::from_shape_vec((n, FEATURE_NAMES.len()), flat)
            .unwrap_or_else(|_| Array2::zeros((0, FEATURE_NAMES.len())))
    }

    /// The most recent row per competitor, for inference on an upcoming event.
    pub fn latest_per_competitor(&self) -> BTreeMap<String, FeatureVector> {
        let mut latest: BTreeMap<String, FeatureVector> = BTreeMap::new();
        for row in &self.rows {
            match latest.get(&row.competitor_id) {
                Some(prev) if (prev.season, prev.round) >= (row.season, row.round) => {}
                _ => {
                    latest.insert(row.competitor_id.clone(), row.clone());
                }
            }
        }
        latest
    }
}

pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Build the feature table from raw records.
    ///
    /// Structurally invalid records (missing identifying keys) are dropped
    /// and counted; missing optional fields are default-filled. Fails only
    /// when nothing valid remains.
    pub fn build(records: &[EventRecord]) -> Result<FeatureTable, PredictorError> {
        let mut dropped = 0usize;
        let mut valid: Vec<&EventRecord> = Vec::with_capacity(records.len());
        for record in records {
            if record.competitor_id.trim().is_empty()
                || record.event_name.trim().is_empty()
                || record.season == 0
            {
                warn!(
                    "Dropping unidentifiable record (season={}, event={:?}, competitor={:?})",
                    record.season, record.event_name, record.competitor_id
                );
                dropped += 1;
                continue;
            }
            valid.push(record);
        }
        if valid.is_empty() {
            return Err(PredictorError::Feature(format!(
                "no structurally valid records ({dropped} dropped)"
            )));
        }

        // Chronological order per competitor; stable so same-event rows keep
        // their input order.
        valid.sort_by(|a, b| {
            (a.season, a.round, &a.competitor_id).cmp(&(b.season, b.round, &b.competitor_id))
        });

        // Dataset-wide aggregates: constructor strength (mean points per
        // race) and driver experience (race count in this dataset).
        let mut constructor_points: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        let mut driver_races: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &valid {
            let entry = constructor_points
                .entry(record.constructor_id.as_str())
                .or_insert((0.0, 0));
            entry.0 += record.points;
            entry.1 += 1;
            *driver_races.entry(record.competitor_id.as_str()).or_insert(0) += 1;
        }

        // Per-competitor running history for the rolling statistics.
        let mut points_history: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        let mut finish_history: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

        let mut rows = Vec::with_capacity(valid.len());
        let mut labels = Vec::with_capacity(valid.len());

        for record in &valid {
            let driver = record.competitor_id.as_str();
            let finish = effective_finish(record);
            let grid = record.grid_position.map(f64::from).unwrap_or(MAX_FIELD_SIZE);

            let points = points_history.entry(driver).or_default();
            points.push(record.points);
            let window_start = points.len().saturating_sub(ROLLING_WINDOW);
            let window = &points[window_start..];
            let rolling_mean = mean(window);
            let rolling_std = population_std(window);

            let finishes = finish_history.entry(driver).or_default();
            finishes.push(finish);
            let consistency = 1.0 / (population_std(finishes) + 1.0);

            let (total, count) = constructor_points[record.constructor_id.as_str()];
            let constructor_strength = total / count as f64;
            let experience = driver_races[driver] as f64;

            rows.push(FeatureVector {
                competitor_id: record.competitor_id.clone(),
                constructor_id: record.constructor_id.clone(),
                season: record.season,
                round: record.round,
                values: [
                    grid,
                    rolling_mean,
                    rolling_std,
                    grid - finish,
                    consistency,
                    constructor_strength,
                    experience,
                ],
            });
            labels.push(podium_label(record));
        }

        debug!(
            "Feature build: {} rows, {} dropped",
            rows.len(),
            dropped
        );
        Ok(FeatureTable {
            rows,
            labels,
            dropped,
        })
    }
}

/// Classified finish coerced to numeric; non-finishes take the sentinel.
fn effective_finish(record: &EventRecord) -> f64 {
    match record.finish_position {
        Some(p) if record.status.is_finish() => f64::from(p),
        _ => NON_FINISH_SENTINEL,
    }
}

fn podium_label(record: &EventRecord) -> usize {
    match record.finish_position {
        Some(p) if record.status.is_finish() && p <= PODIUM_CUTOFF => 1,
        _ => 0,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for a single sample, so the single-race
/// consistency score is 1/(0+1) rather than a division by zero.
fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
