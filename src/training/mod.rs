//! Model training
//!
//! Training loop, metrics tracking, and the fit pipeline that produces a
//! fitted state.

pub mod fit;
pub mod metrics;
pub mod trainer;

pub use fit::{fit_price_model, FitReport};
pub use metrics::{Metrics, TrainingHistory};
pub use trainer::PriceTrainer;

/// CPU backend used for training from the CLI
pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray<f32>>;
