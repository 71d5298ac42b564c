//! Short-term rental price estimation
//!
//! Raw listing attributes are normalized into a canonical record, encoded with
//! frozen per-column statistics, and fed to a fitted regressor that predicts
//! `log_price`.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model prediction output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Raw regressor output
    pub log_price: f64,
    /// `exp(log_price)` rounded to cents
    pub price: f64,
}

impl Prediction {
    /// Inverse-transform a log-scale model output into a price
    pub fn from_log_price(log_price: f64) -> std::result::Result<Self, PredictionError> {
        if !log_price.is_finite() {
            return Err(PredictionError::ModelOutputInvalid(log_price));
        }
        let price = round_cents(log_price.exp());
        if !price.is_finite() {
            return Err(PredictionError::ModelOutputInvalid(log_price));
        }
        Ok(Prediction { log_price, price })
    }
}

/// Round to two decimal places
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Response shape handed to presentation layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResponse {
    pub fn ok(prediction: &Prediction) -> Self {
        PredictionResponse {
            success: true,
            price: Some(prediction.price),
            error: None,
        }
    }

    pub fn failed(error: &PricerError) -> Self {
        PredictionResponse {
            success: false,
            price: None,
            error: Some(error.to_string()),
        }
    }
}

/// Errors raised while fitting or applying the feature encoder
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Canonical record has no column named {0}")]
    MissingColumn(String),

    #[error("Feature encoder has not been fitted")]
    NotFitted,

    #[error("Feature encoder is already fitted")]
    AlreadyFitted,

    #[error("Cannot fit feature encoder on an empty batch")]
    EmptyTrainingSet,
}

/// Errors raised by the predictor call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("Model produced a non-finite output: {0}")]
    ModelOutputInvalid(f64),

    #[error("Model expects {expected} features, got {actual}")]
    InputDimension { expected: usize, actual: usize },
}

/// Errors raised while loading fitted artifacts
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArtifactLoadError {
    #[error("Fitted state not found: {0}")]
    NotFound(String),

    #[error("Fitted state is corrupt: {0}")]
    Corrupt(String),
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum PricerError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Artifact(#[from] ArtifactLoadError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No training data - run `pricer data import` first")]
    NoTrainingData,

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, PricerError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub normalizer: NormalizerConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_split: f64,
    pub early_stopping_patience: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub hidden_dims: Vec<usize>,
    pub dropout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Substituted when a request omits review_scores_rating
    pub review_scores_rating_default: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub artifact_dir: String,
    pub state_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            training: TrainingConfig {
                epochs: 200,
                batch_size: 256,
                learning_rate: 0.05,
                validation_split: 0.2,
                early_stopping_patience: 20,
                seed: 42,
            },
            model: ModelConfig {
                hidden_dims: vec![64, 32],
                dropout: 0.1,
            },
            normalizer: NormalizerConfig {
                review_scores_rating_default: 90.0,
            },
            data: DataConfig {
                database_path: "data/listings.db".to_string(),
                artifact_dir: "artifacts".to_string(),
                state_id: "price_model".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PricerError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PricerError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PricerError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_transform_recovers_price() {
        for price in [0.01, 1.0, 45.5, 129.99, 2_500.0] {
            let pred = Prediction::from_log_price(f64::ln(price)).unwrap();
            assert!((pred.price - price).abs() < 1e-9, "{} vs {}", pred.price, price);
        }
    }

    #[test]
    fn test_non_finite_output_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1.0e6] {
            let err = Prediction::from_log_price(bad).unwrap_err();
            assert!(matches!(err, PredictionError::ModelOutputInvalid(_)));
        }
    }

    #[test]
    fn test_response_shape() {
        let pred = Prediction::from_log_price(f64::ln(150.0)).unwrap();
        let json = serde_json::to_value(PredictionResponse::ok(&pred)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["price"], 150.0);
        assert!(json.get("error").is_none());

        let err = PricerError::Feature(FeatureError::NotFitted);
        let json = serde_json::to_value(PredictionResponse::failed(&err)).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("price").is_none());
        assert_eq!(json["error"], "Feature encoder has not been fitted");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.model.hidden_dims, vec![64, 32]);
        assert_eq!(parsed.normalizer.review_scores_rating_default, 90.0);
    }
}
