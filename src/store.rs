//! Model persistence: one JSON artifact holding the whole trained ensemble,
//! written atomically via a staging file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ensemble::{adjust_weights, EnsembleModel};
use crate::error::PredictorError;

/// Bump when the artifact layout changes; older files load as absent.
const ARTIFACT_VERSION: u32 = 1;

const ARTIFACT_FILE: &str = "ensemble.json";
const STAGING_SUFFIX: &str = ".tmp";

/// Everything a future process needs to predict without retraining.
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    version: u32,
    ensemble: EnsembleModel,
    /// Held-out accuracy per member; weights rederive from this on load
    scores: std::collections::BTreeMap<String, f64>,
}

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ModelStore { dir: dir.into() }
    }

    fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_FILE)
    }

    /// Persist the ensemble. The artifact is fully written to a staging file
    /// first and published with a single rename, so readers only ever see a
    /// complete file. A failed write is retried once.
    pub fn save(&self, ensemble: &EnsembleModel) -> Result<(), PredictorError> {
        let artifact = ModelArtifact {
            version: ARTIFACT_VERSION,
            ensemble: ensemble.clone(),
            scores: ensemble.score_report(),
        };
        match self.try_save(&artifact) {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("Artifact save failed, retrying once: {first}");
                self.try_save(&artifact).map_err(|e| {
                    PredictorError::Persistence(format!(
                        "saving {} failed twice: {e}",
                        self.artifact_path().display()
                    ))
                })
            }
        }
    }

    fn try_save(&self, artifact: &ModelArtifact) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.artifact_path();
        let staging = staging_path(&target);
        let json = serde_json::to_vec_pretty(artifact)?;
        fs::write(&staging, json)?;
        fs::rename(&staging, &target)?;
        info!("Saved model artifact to {}", target.display());
        Ok(())
    }

    /// Load the persisted ensemble if a usable artifact exists.
    ///
    /// Missing, unreadable, unparsable, or version-mismatched artifacts all
    /// come back as `None` with a warning; the caller decides whether to
    /// retrain or fall back to the heuristic path.
    pub fn load(&self) -> Option<EnsembleModel> {
        let path = self.artifact_path();
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read {}: {e}", path.display());
                return None;
            }
        };
        let artifact: ModelArtifact = match serde_json::from_slice(&bytes) {
            Ok(a) => a,
            Err(e) => {
                warn!("Ignoring unparsable artifact {}: {e}", path.display());
                return None;
            }
        };
        if artifact.version != ARTIFACT_VERSION {
            warn!(
                "Ignoring artifact {} with version {} (expected {})",
                path.display(),
                artifact.version,
                ARTIFACT_VERSION
            );
            return None;
        }
        let mut ensemble = artifact.ensemble;
        // Weights are derived state; rebuild them from the persisted
        // accuracies so the report stays the single source of truth.
        let accuracies: Vec<f64> = ensemble.members.iter().map(|m| m.accuracy).collect();
        for (member, weight) in ensemble.members.iter_mut().zip(adjust_weights(&accuracies)) {
            member.weight = weight;
        }
        info!("Loaded model artifact from {}", path.display());
        Some(ensemble)
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(STAGING_SUFFIX);
    target.with_file_name(name)
}
