//! End-to-end fitting: stored listings to a servable [`FittedState`]
//!
//! The encoder is fitted on the training split only, then frozen and used to
//! encode both splits. Serving reuses that exact state.

use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use chrono::Utc;

use crate::data::dataset::{split_indices, ListingDataset};
use crate::data::TrainingRow;
use crate::features::{CanonicalRecord, FeatureEncoder, MissingPolicy, Normalizer};
use crate::model::{PriceNet, PriceNetConfig};
use crate::predict::{FittedState, TrainingSummary};
use crate::training::metrics::TrainingHistory;
use crate::training::trainer::PriceTrainer;
use crate::{Config, PricerError, Result};

/// Fitted state plus the history of the run that produced it
#[derive(Debug, Clone)]
pub struct FitReport {
    pub state: FittedState,
    pub history: TrainingHistory,
}

/// Fit the encoder and train the price network on stored listings
pub fn fit_price_model<B: AutodiffBackend>(
    rows: &[TrainingRow],
    config: &Config,
    device: B::Device,
) -> Result<FitReport> {
    if rows.is_empty() {
        return Err(PricerError::NoTrainingData);
    }
    if rows.len() < 2 {
        return Err(PricerError::Training(
            "need at least two listings to hold one out for validation".to_string(),
        ));
    }

    let normalizer = Normalizer::from_config(&config.normalizer, MissingPolicy::Impute);
    let records: Vec<CanonicalRecord> = rows.iter().map(|r| normalizer.normalize(&r.raw)).collect();
    let targets: Vec<f64> = rows.iter().map(|r| r.log_price).collect();

    let (train_idx, val_idx) = split_indices(
        rows.len(),
        config.training.validation_split,
        config.training.seed,
    );
    let train_records: Vec<CanonicalRecord> =
        train_idx.iter().map(|&i| records[i].clone()).collect();

    let encoder = FeatureEncoder::new();
    let encoder_state = encoder.fit(&train_records)?;

    let encode = |idx: &[usize]| -> Result<ListingDataset> {
        let subset: Vec<CanonicalRecord> = idx.iter().map(|&i| records[i].clone()).collect();
        let features = encoder.transform_batch(&subset)?;
        let ys: Vec<f64> = idx.iter().map(|&i| targets[i]).collect();
        Ok(ListingDataset::from_parts(features, &ys))
    };
    let train_dataset = encode(&train_idx)?;
    let val_dataset = encode(&val_idx)?;

    log::info!(
        "Encoded {} training and {} validation listings ({} features)",
        train_dataset.len(),
        val_dataset.len(),
        encoder_state.dim()
    );

    let net_config = PriceNetConfig::from_model_config(&config.model, encoder_state.dim());
    let model = PriceNet::<B>::new(&device, &net_config);
    let trainer = PriceTrainer::new(model, config.training.learning_rate, device);
    let (model, history) = trainer.train(train_dataset, val_dataset, &config.training)?;

    let state = FittedState {
        encoder: encoder_state.as_ref().clone(),
        model: model.valid().freeze()?,
        summary: Some(TrainingSummary {
            trained_at: Utc::now(),
            train_samples: train_idx.len(),
            val_samples: val_idx.len(),
            epochs_run: history.epochs_run(),
            val_rmse: history.best_val_rmse(),
            val_r2: history.best_val_r2(),
        }),
    };

    Ok(FitReport { state, history })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{RawRecord, Schema};
    use crate::predict::{PredictionPipeline, ServingState};
    use burn::backend::{Autodiff, NdArray};
    use serde_json::json;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn rows(n: usize) -> Vec<TrainingRow> {
        let cities = ["NYC", "SF", "LA", "Boston"];
        (0..n)
            .map(|i| {
                let accommodates = (i % 6 + 1) as f64;
                let bathrooms = if i % 5 == 0 {
                    json!("n/a")
                } else {
                    json!(1 + i % 2)
                };
                let raw = json!({
                    "accommodates": accommodates,
                    "bathrooms": bathrooms,
                    "city": cities[i % cities.len()],
                    "room_type": "Entire home/apt",
                    "amenities": "{TV,Wifi,Kitchen}",
                });
                TrainingRow {
                    listing_id: Some(i.to_string()),
                    raw: raw.as_object().cloned().unwrap(),
                    log_price: 4.0 + 0.1 * accommodates,
                }
            })
            .collect()
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.training.epochs = 20;
        config.training.batch_size = 16;
        config.training.early_stopping_patience = 0;
        config.model.hidden_dims = vec![8];
        config.model.dropout = 0.0;
        config
    }

    #[test]
    fn test_fit_produces_servable_state() {
        let report = fit_price_model::<TestBackend>(&rows(40), &small_config(), Default::default())
            .unwrap();
        let state = report.state;

        state.validate(&Schema::current()).unwrap();
        let summary = state.summary.clone().unwrap();
        assert_eq!(summary.train_samples + summary.val_samples, 40);
        assert_eq!(summary.val_samples, 8);
        assert_eq!(summary.epochs_run, 20);

        let pipeline = PredictionPipeline::with_state(
            Normalizer::default(),
            ServingState::from_fitted(state).unwrap(),
        );
        let mut request = RawRecord::new();
        request.insert("accommodates".to_string(), json!(3));
        request.insert("city".to_string(), json!("Atlantis"));
        let prediction = pipeline.predict(&request).unwrap();
        assert!(prediction.price.is_finite() && prediction.price > 0.0);
    }

    #[test]
    fn test_no_rows() {
        let result = fit_price_model::<TestBackend>(&[], &small_config(), Default::default());
        assert!(matches!(result, Err(PricerError::NoTrainingData)));

        let result = fit_price_model::<TestBackend>(&rows(1), &small_config(), Default::default());
        assert!(matches!(result, Err(PricerError::Training(_))));
    }
}
