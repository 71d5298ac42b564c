//! Fitted-state persistence
//!
//! A fitted state bundles the encoder statistics with the predictor weights
//! so the two can never be loaded out of step.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::{EncoderState, Schema};
use crate::model::FrozenPriceNet;
use crate::predict::PricePredictor;
use crate::{ArtifactLoadError, Result};

/// Summary of the training run that produced a fitted state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub trained_at: DateTime<Utc>,
    pub train_samples: usize,
    pub val_samples: usize,
    pub epochs_run: usize,
    pub val_rmse: f64,
    pub val_r2: f64,
}

/// Encoder and predictor parameters learned together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedState {
    pub encoder: EncoderState,
    pub model: FrozenPriceNet,
    pub summary: Option<TrainingSummary>,
}

impl FittedState {
    /// Check the state is usable with the given schema
    pub fn validate(&self, schema: &Schema) -> std::result::Result<(), ArtifactLoadError> {
        self.encoder.check_schema(schema)?;
        self.model.validate()?;
        if self.model.input_dim() != self.encoder.dim() {
            return Err(ArtifactLoadError::Corrupt(format!(
                "model expects {} features but encoder produces {}",
                self.model.input_dim(),
                self.encoder.dim()
            )));
        }
        Ok(())
    }
}

/// Persistence boundary for fitted state
pub trait FittedStateStore: Send + Sync {
    fn load(&self, id: &str) -> std::result::Result<FittedState, ArtifactLoadError>;

    fn save(&self, id: &str, state: &FittedState) -> Result<()>;
}

/// Stores each fitted state as `<dir>/<id>.json`
#[derive(Debug, Clone)]
pub struct FsStateStore {
    dir: PathBuf,
}

impl FsStateStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        FsStateStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl FittedStateStore for FsStateStore {
    fn load(&self, id: &str) -> std::result::Result<FittedState, ArtifactLoadError> {
        let path = self.path_for(id);
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArtifactLoadError::NotFound(path.display().to_string()),
            _ => ArtifactLoadError::Corrupt(format!("{}: {}", path.display(), e)),
        })?;

        let state: FittedState = serde_json::from_str(&content)
            .map_err(|e| ArtifactLoadError::Corrupt(format!("{}: {}", path.display(), e)))?;
        state.validate(&Schema::current())?;

        log::info!("Loaded fitted state from {}", path.display());
        Ok(state)
    }

    fn save(&self, id: &str, state: &FittedState) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(id);
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| crate::PricerError::Parse(format!("Failed to serialize state: {}", e)))?;
        std::fs::write(&path, content)?;
        log::info!("Saved fitted state to {}", path.display());
        Ok(())
    }
}
