//! Burn Dataset implementation for encoded listings

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One encoded listing with its target
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSample {
    pub features: Vec<f32>,
    pub log_price: f32,
}

/// In-memory dataset of encoded listings
#[derive(Debug, Clone, Default)]
pub struct ListingDataset {
    samples: Vec<ListingSample>,
}

impl ListingDataset {
    pub fn new(samples: Vec<ListingSample>) -> Self {
        ListingDataset { samples }
    }

    /// Pair feature vectors with targets
    pub fn from_parts(features: Vec<Vec<f32>>, targets: &[f64]) -> Self {
        let samples = features
            .into_iter()
            .zip(targets)
            .map(|(features, &log_price)| ListingSample {
                features,
                log_price: log_price as f32,
            })
            .collect();
        ListingDataset { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Seeded shuffle of `0..n` split into (train, validation) index sets
///
/// Keeps at least one index on each side when `n >= 2`.
pub fn split_indices(n: usize, validation_ratio: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let val_len = if n >= 2 {
        ((n as f64 * validation_ratio).round() as usize).clamp(1, n - 1)
    } else {
        0
    };
    let val = indices.split_off(n - val_len);
    (indices, val)
}

impl Dataset<ListingSample> for ListingDataset {
    fn get(&self, index: usize) -> Option<ListingSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Batch of encoded listings
#[derive(Debug, Clone)]
pub struct ListingBatch<B: Backend> {
    /// [batch, features]
    pub features: Tensor<B, 2>,
    /// [batch, 1]
    pub targets: Tensor<B, 2>,
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct ListingBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ListingBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        ListingBatcher { device }
    }
}

impl<B: Backend> Batcher<B, ListingSample, ListingBatch<B>> for ListingBatcher<B> {
    fn batch(&self, items: Vec<ListingSample>, _device: &B::Device) -> ListingBatch<B> {
        let batch_size = items.len();
        let feature_dim = items.first().map(|s| s.features.len()).unwrap_or(0);

        let mut feature_data = Vec::with_capacity(batch_size * feature_dim);
        let mut target_data = Vec::with_capacity(batch_size);
        for sample in &items {
            feature_data.extend_from_slice(&sample.features);
            target_data.push(sample.log_price);
        }

        let features = Tensor::<B, 1>::from_floats(feature_data.as_slice(), &self.device)
            .reshape([batch_size, feature_dim]);
        let targets = Tensor::<B, 1>::from_floats(target_data.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        ListingBatch { features, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn dataset(n: usize) -> ListingDataset {
        let features = (0..n).map(|i| vec![i as f32, 1.0]).collect();
        let targets: Vec<f64> = (0..n).map(|i| i as f64 / 10.0).collect();
        ListingDataset::from_parts(features, &targets)
    }

    #[test]
    fn test_split_is_seeded() {
        let (train_a, val_a) = split_indices(50, 0.2, 7);
        let (train_b, val_b) = split_indices(50, 0.2, 7);
        assert_eq!(train_a.len(), 40);
        assert_eq!(val_a.len(), 10);
        assert_eq!(train_a, train_b);
        assert_eq!(val_a, val_b);

        let mut all: Vec<usize> = train_a.iter().chain(&val_a).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_keeps_both_sides() {
        let (train, val) = split_indices(3, 0.0, 1);
        assert_eq!((train.len(), val.len()), (2, 1));

        let (train, val) = split_indices(1, 0.5, 1);
        assert_eq!((train.len(), val.len()), (1, 0));
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = ListingBatcher::<TestBackend>::new(Default::default());
        let data = dataset(4);
        let batch = batcher.batch(data.samples.clone(), &Default::default());
        assert_eq!(batch.features.dims(), [4, 2]);
        assert_eq!(batch.targets.dims(), [4, 1]);
    }
}
