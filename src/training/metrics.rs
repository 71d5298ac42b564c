//! Training metrics and evaluation

use std::fmt;

/// Regression metrics accumulated over batches, all on the log-price scale
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Sum of per-batch mean losses
    pub total_loss: f64,
    /// Number of batches accumulated
    pub batch_count: usize,
    /// Number of predictions seen
    pub count: usize,
    /// Sum of squared errors
    pub sse: f64,
    /// Sum of absolute errors
    pub sae: f64,
    /// Sum of targets
    pub target_sum: f64,
    /// Sum of squared targets
    pub target_sq_sum: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics with a batch of predictions and targets
    pub fn update(&mut self, loss: f32, predictions: &[f32], targets: &[f32]) {
        self.total_loss += loss as f64;
        self.batch_count += 1;
        for (&p, &t) in predictions.iter().zip(targets) {
            let (p, t) = (p as f64, t as f64);
            let err = p - t;
            self.sse += err * err;
            self.sae += err.abs();
            self.target_sum += t;
            self.target_sq_sum += t * t;
            self.count += 1;
        }
    }

    /// Get average loss
    pub fn avg_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_loss / self.batch_count as f64
        }
    }

    pub fn mse(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sse / self.count as f64
        }
    }

    pub fn rmse(&self) -> f64 {
        self.mse().sqrt()
    }

    pub fn mae(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sae / self.count as f64
        }
    }

    /// Coefficient of determination; 0 when targets have no variance
    pub fn r2(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.target_sum / n;
        let sst = self.target_sq_sum - n * mean * mean;
        if sst <= f64::EPSILON {
            0.0
        } else {
            1.0 - self.sse / sst
        }
    }

    /// Merge another metrics instance
    pub fn merge(&mut self, other: &Metrics) {
        self.total_loss += other.total_loss;
        self.batch_count += other.batch_count;
        self.count += other.count;
        self.sse += other.sse;
        self.sae += other.sae;
        self.target_sum += other.target_sum;
        self.target_sq_sum += other.target_sq_sum;
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loss: {:.4} | RMSE: {:.4} | MAE: {:.4} | R²: {:.3}",
            self.avg_loss(),
            self.rmse(),
            self.mae(),
            self.r2()
        )
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub val_rmses: Vec<f64>,
    pub val_r2s: Vec<f64>,
    pub best_val_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record metrics for an epoch
    pub fn record_epoch(&mut self, epoch: usize, train: &Metrics, val: &Metrics) {
        self.train_losses.push(train.avg_loss());
        self.val_losses.push(val.mse());
        self.val_rmses.push(val.rmse());
        self.val_r2s.push(val.r2());

        if val.mse() < self.best_val_loss {
            self.best_val_loss = val.mse();
            self.best_epoch = epoch;
        }
    }

    pub fn epochs_run(&self) -> usize {
        self.val_losses.len()
    }

    /// Check if we should early stop
    pub fn should_early_stop(&self, patience: usize) -> bool {
        if patience == 0 || self.val_losses.len() < patience {
            return false;
        }
        let current_epoch = self.val_losses.len() - 1;
        current_epoch - self.best_epoch >= patience
    }

    /// Validation RMSE at the best epoch
    pub fn best_val_rmse(&self) -> f64 {
        self.val_rmses.get(self.best_epoch).copied().unwrap_or(f64::NAN)
    }

    /// Validation R² at the best epoch
    pub fn best_val_r2(&self) -> f64 {
        self.val_r2s.get(self.best_epoch).copied().unwrap_or(f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let mut m = Metrics::new();
        m.update(0.0, &[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(m.mse(), 0.0);
        assert_eq!(m.mae(), 0.0);
        assert!((m.r2() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_predictor_has_zero_r2() {
        let mut m = Metrics::new();
        m.update(0.0, &[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]);
        assert!((m.mse() - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.mae() - 2.0 / 3.0).abs() < 1e-9);
        assert!(m.r2().abs() < 1e-9);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let mut a = Metrics::new();
        a.update(1.0, &[1.0], &[2.0]);
        let mut b = Metrics::new();
        b.update(3.0, &[4.0, 0.0], &[3.0, 1.0]);
        a.merge(&b);

        let mut whole = Metrics::new();
        whole.update(1.0, &[1.0], &[2.0]);
        whole.update(3.0, &[4.0, 0.0], &[3.0, 1.0]);
        assert_eq!(a.mse(), whole.mse());
        assert_eq!(a.avg_loss(), 2.0);
    }

    #[test]
    fn test_early_stopping() {
        let mut history = TrainingHistory::new();
        let mut improving = Metrics::new();
        improving.update(0.0, &[1.0], &[0.0]);
        history.record_epoch(0, &improving, &improving);

        let mut worse = Metrics::new();
        worse.update(0.0, &[3.0], &[0.0]);
        history.record_epoch(1, &worse, &worse);
        assert!(!history.should_early_stop(2));
        history.record_epoch(2, &worse, &worse);
        assert!(history.should_early_stop(2));
        assert_eq!(history.best_epoch, 0);
        assert_eq!(history.best_val_rmse(), 1.0);
        assert!(!history.should_early_stop(0));
    }
}
