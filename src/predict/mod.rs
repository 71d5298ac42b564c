//! Prediction and inference
//!
//! Load fitted state once and turn raw listings into prices.

pub mod pipeline;
pub mod predictor;
pub mod store;

pub use pipeline::{PredictionPipeline, ServingState};
pub use predictor::PricePredictor;
pub use store::{FittedState, FittedStateStore, FsStateStore, TrainingSummary};
