//! Predictor seam
//!
//! The pipeline only needs `predict(vector) -> log_price`; anything that can
//! answer that (the frozen MLP, a test stub) plugs in here.

use crate::PredictionError;

/// Fitted regressor mapping a feature vector to a log-scale price
pub trait PricePredictor: Send + Sync {
    /// Feature vector length the predictor was fitted on
    fn input_dim(&self) -> usize;

    fn predict(&self, features: &[f32]) -> Result<f64, PredictionError>;
}
