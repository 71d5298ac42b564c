//! Prediction orchestration
//!
//! raw record -> Normalizer -> canonical record -> encoder -> predictor ->
//! log_price -> price.
//!
//! The fitted encoder and predictor are loaded once, on the first request or
//! on [`PredictionPipeline::warm_up`], and shared read-only afterwards.

use std::sync::{Arc, OnceLock};

use crate::features::{FeatureEncoder, Normalizer, RawRecord, Schema};
use crate::predict::store::{FittedState, FittedStateStore};
use crate::predict::PricePredictor;
use crate::{ArtifactLoadError, Prediction, PredictionResponse, Result};

/// Fitted encoder and predictor, immutable once published
pub struct ServingState {
    encoder: FeatureEncoder,
    predictor: Arc<dyn PricePredictor>,
}

impl ServingState {
    pub fn new(encoder: FeatureEncoder, predictor: Arc<dyn PricePredictor>) -> Self {
        ServingState { encoder, predictor }
    }

    /// Serving state from a fitted state, rejected unless it matches the current schema
    pub fn from_fitted(state: FittedState) -> std::result::Result<Self, ArtifactLoadError> {
        state.validate(&Schema::current())?;
        Ok(ServingState {
            encoder: FeatureEncoder::from_state(Arc::new(state.encoder)),
            predictor: Arc::new(state.model),
        })
    }
}

type Loader = Box<dyn Fn() -> std::result::Result<ServingState, ArtifactLoadError> + Send + Sync>;

/// Prediction entry point shared across request handlers
pub struct PredictionPipeline {
    normalizer: Normalizer,
    loader: Loader,
    serving: OnceLock<std::result::Result<Arc<ServingState>, ArtifactLoadError>>,
}

impl PredictionPipeline {
    /// Pipeline that loads its serving state lazily through `loader`
    pub fn new<F>(normalizer: Normalizer, loader: F) -> Self
    where
        F: Fn() -> std::result::Result<ServingState, ArtifactLoadError> + Send + Sync + 'static,
    {
        PredictionPipeline {
            normalizer,
            loader: Box::new(loader),
            serving: OnceLock::new(),
        }
    }

    /// Pipeline backed by a fitted-state store
    pub fn from_store(
        normalizer: Normalizer,
        store: Arc<dyn FittedStateStore>,
        id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self::new(normalizer, move || {
            store.load(&id).and_then(ServingState::from_fitted)
        })
    }

    /// Pipeline around an already loaded state
    pub fn with_state(normalizer: Normalizer, state: ServingState) -> Self {
        let pipeline = Self::new(normalizer, || {
            Err(ArtifactLoadError::NotFound("no loader configured".to_string()))
        });
        let _ = pipeline.serving.set(Ok(Arc::new(state)));
        pipeline
    }

    /// Load the fitted state now rather than on the first request
    ///
    /// Concurrent callers block on a single load and all receive the same
    /// instance. A failed load is remembered and returned to every later call.
    pub fn warm_up(&self) -> std::result::Result<Arc<ServingState>, ArtifactLoadError> {
        self.serving
            .get_or_init(|| {
                log::info!("Loading fitted state");
                match (self.loader)() {
                    Ok(state) => {
                        log::info!(
                            "Fitted state ready ({} features)",
                            state.predictor.input_dim()
                        );
                        Ok(Arc::new(state))
                    }
                    Err(e) => {
                        log::error!("Failed to load fitted state: {}", e);
                        Err(e)
                    }
                }
            })
            .clone()
    }

    /// Predict the price of a single raw listing
    pub fn predict(&self, raw: &RawRecord) -> Result<Prediction> {
        let serving = self.warm_up()?;

        let record = self.normalizer.normalize(raw);
        let features = serving.encoder.transform(&record)?;
        let log_price = serving.predictor.predict(&features)?;
        let prediction = Prediction::from_log_price(log_price)?;

        log::debug!(
            "Predicted log_price {:.4} -> price {:.2}",
            prediction.log_price,
            prediction.price
        );
        Ok(prediction)
    }

    /// Predict many listings; one failure does not affect the others
    pub fn predict_batch(&self, raws: &[RawRecord]) -> Vec<Result<Prediction>> {
        raws.iter().map(|raw| self.predict(raw)).collect()
    }

    /// Predict and fold the outcome into the response shape
    pub fn respond(&self, raw: &RawRecord) -> PredictionResponse {
        match self.predict(raw) {
            Ok(prediction) => PredictionResponse::ok(&prediction),
            Err(e) => {
                log::warn!("Prediction failed: {}", e);
                PredictionResponse::failed(&e)
            }
        }
    }
}
