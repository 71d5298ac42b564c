//! Training loop for the price network

use burn::data::dataloader::DataLoaderBuilder;
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{GradientsParams, Optimizer, Sgd, SgdConfig};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};

use crate::data::dataset::{ListingBatch, ListingBatcher, ListingDataset};
use crate::model::PriceNet;
use crate::training::metrics::{Metrics, TrainingHistory};
use crate::{PricerError, Result, TrainingConfig};

/// Mean squared error on log prices
pub fn mse_loss<B: Backend>(predictions: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    (predictions - targets).powf_scalar(2.0).mean()
}

/// SGD trainer with best-epoch selection and early stopping
pub struct PriceTrainer<B: AutodiffBackend> {
    model: PriceNet<B>,
    optimizer: OptimizerAdaptor<Sgd<B::InnerBackend>, PriceNet<B>, B>,
    learning_rate: f64,
    device: B::Device,
}

impl<B: AutodiffBackend> PriceTrainer<B> {
    pub fn new(model: PriceNet<B>, learning_rate: f64, device: B::Device) -> Self {
        PriceTrainer {
            model,
            optimizer: SgdConfig::new().init(),
            learning_rate,
            device,
        }
    }

    /// Train the model, returning the weights from the best validation epoch
    pub fn train(
        mut self,
        train_dataset: ListingDataset,
        val_dataset: ListingDataset,
        config: &TrainingConfig,
    ) -> Result<(PriceNet<B>, TrainingHistory)> {
        if train_dataset.is_empty() || val_dataset.is_empty() {
            return Err(PricerError::Training(
                "need at least one training and one validation listing".to_string(),
            ));
        }

        let batch_size = config.batch_size.clamp(1, train_dataset.len());
        let val_len = val_dataset.len();

        let train_loader = DataLoaderBuilder::new(ListingBatcher::<B>::new(self.device.clone()))
            .batch_size(batch_size)
            .shuffle(config.seed)
            .build(train_dataset);

        let val_loader = DataLoaderBuilder::new(ListingBatcher::<B::InnerBackend>::new(
            self.device.clone(),
        ))
        .batch_size(val_len)
        .build(val_dataset);

        let mut history = TrainingHistory::new();
        let mut best_model = self.model.clone();

        log::info!(
            "Starting training for up to {} epochs (batch size {}, lr {})",
            config.epochs,
            batch_size,
            self.learning_rate
        );

        for epoch in 0..config.epochs {
            let train_metrics = self.train_epoch(train_loader.iter())?;
            let val_metrics = self.validate_epoch(val_loader.iter())?;

            if !train_metrics.avg_loss().is_finite() {
                return Err(PricerError::Training(format!(
                    "loss diverged at epoch {}; try a lower learning rate",
                    epoch + 1
                )));
            }

            history.record_epoch(epoch, &train_metrics, &val_metrics);

            log::info!(
                "Epoch {}/{}: Train: {} | Val: {}",
                epoch + 1,
                config.epochs,
                train_metrics,
                val_metrics
            );

            if history.best_epoch == epoch {
                best_model = self.model.clone();
                log::debug!("  New best model (val_mse: {:.4})", val_metrics.mse());
            }

            if history.should_early_stop(config.early_stopping_patience) {
                log::info!(
                    "Early stopping at epoch {} (best was epoch {})",
                    epoch + 1,
                    history.best_epoch + 1
                );
                break;
            }
        }

        Ok((best_model, history))
    }

    fn train_epoch(&mut self, loader: impl Iterator<Item = ListingBatch<B>>) -> Result<Metrics> {
        let mut metrics = Metrics::new();

        for batch in loader {
            let predictions = self.model.forward(batch.features);
            let loss = mse_loss(predictions.clone(), batch.targets.clone());
            let loss_val: f32 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.learning_rate, self.model.clone(), grads);

            metrics.update(
                loss_val,
                &tensor_values(predictions)?,
                &tensor_values(batch.targets)?,
            );
        }

        Ok(metrics)
    }

    /// Evaluate without autodiff so dropout is disabled
    fn validate_epoch(
        &self,
        loader: impl Iterator<Item = ListingBatch<B::InnerBackend>>,
    ) -> Result<Metrics> {
        let model = self.model.valid();
        let mut metrics = Metrics::new();

        for batch in loader {
            let predictions = model.forward(batch.features);
            let loss = mse_loss(predictions.clone(), batch.targets.clone());
            let loss_val: f32 = loss.into_scalar().elem();

            metrics.update(
                loss_val,
                &tensor_values(predictions)?,
                &tensor_values(batch.targets)?,
            );
        }

        Ok(metrics)
    }
}

fn tensor_values<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PricerError::Training(format!("Failed to read tensor: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ListingSample;
    use crate::model::PriceNetConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn constant_target(n: usize) -> ListingDataset {
        let samples = (0..n)
            .map(|i| {
                let x = (i as f32 / n as f32) * 2.0 - 1.0;
                ListingSample {
                    features: vec![x, -x],
                    log_price: 3.0,
                }
            })
            .collect();
        ListingDataset::new(samples)
    }

    fn training_config(epochs: usize) -> TrainingConfig {
        TrainingConfig {
            epochs,
            batch_size: 64,
            learning_rate: 0.05,
            validation_split: 0.2,
            early_stopping_patience: 0,
            seed: 42,
        }
    }

    #[test]
    fn test_learns_constant_target() {
        let device = Default::default();
        let model = PriceNet::<TestBackend>::new(
            &device,
            &PriceNetConfig {
                input_dim: 2,
                hidden_dims: vec![],
                dropout: 0.0,
            },
        );
        let trainer = PriceTrainer::new(model, 0.05, device);
        let (model, history) = trainer
            .train(constant_target(40), constant_target(10), &training_config(200))
            .unwrap();

        assert_eq!(history.epochs_run(), 200);
        assert!(history.best_val_loss < 0.01, "{}", history.best_val_loss);

        let frozen = model.valid().freeze().unwrap();
        let out = crate::predict::PricePredictor::predict(&frozen, &[0.0, 0.0]).unwrap();
        assert!((out - 3.0).abs() < 0.1);
    }

    #[test]
    fn test_rejects_empty_validation_set() {
        let device = Default::default();
        let model = PriceNet::<TestBackend>::new(
            &device,
            &PriceNetConfig {
                input_dim: 2,
                hidden_dims: vec![4],
                dropout: 0.0,
            },
        );
        let trainer = PriceTrainer::new(model, 0.05, device);
        let result = trainer.train(
            constant_target(10),
            ListingDataset::default(),
            &training_config(5),
        );
        assert!(matches!(result, Err(PricerError::Training(_))));
    }
}
