use thiserror::Error;

/// Error taxonomy for the prediction pipeline.
///
/// Recovery policy per variant:
/// - `DataUnavailable`: recovered locally by substituting the paired seed
///   table; execution continues in degraded mode.
/// - `Feature`: raised only when no structurally valid record survives the
///   build; individually malformed records are dropped and counted instead.
/// - `Training`: raised only when every configured model kind failed to
///   fit; a minority of failures is recovered by exclusion.
/// - `Persistence`: load failures fall back to retraining; save failures
///   are retried once, then fatal.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("DataUnavailable: {table}: {reason}")]
    DataUnavailable { table: String, reason: String },

    #[error("FeatureError: {0}")]
    Feature(String),

    #[error("TrainingError: {0}")]
    Training(String),

    #[error("PersistenceError: {0}")]
    Persistence(String),
}

impl PredictorError {
    pub fn data_unavailable(table: &str, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }
}
