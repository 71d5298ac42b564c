//! MLP regressor on `log_price`
//!
//! Architecture: Input(features) → [Linear → ReLU → Dropout]* → Linear(1)

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::frozen::{DenseLayer, FrozenPriceNet};
use crate::{ModelConfig, PricerError, Result};

/// Configuration for the price network
#[derive(Debug, Clone)]
pub struct PriceNetConfig {
    /// Feature vector length
    pub input_dim: usize,
    /// Hidden layer widths (e.g. [64, 32] for two layers)
    pub hidden_dims: Vec<usize>,
    pub dropout: f64,
}

impl PriceNetConfig {
    pub fn from_model_config(config: &ModelConfig, input_dim: usize) -> Self {
        PriceNetConfig {
            input_dim,
            hidden_dims: config.hidden_dims.clone(),
            dropout: config.dropout,
        }
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Feed-forward regressor producing one log-price per row
#[derive(Module, Debug)]
pub struct PriceNet<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    head: Linear<B>,
}

impl<B: Backend> PriceNet<B> {
    pub fn new(device: &B::Device, config: &PriceNetConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.input_dim;
        for &out_dim in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, out_dim, config.dropout));
            in_dim = out_dim;
        }

        PriceNet {
            hidden,
            head: LinearConfig::new(in_dim, 1).init(device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `features` - Encoded listings [batch, input_dim]
    ///
    /// # Returns
    /// Predicted log prices [batch, 1]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = features;
        for block in &self.hidden {
            x = block.forward(x);
        }
        self.head.forward(x)
    }

    /// Copy the learned weights into a plain-data network for serving
    pub fn freeze(&self) -> Result<FrozenPriceNet> {
        let mut layers = Vec::with_capacity(self.hidden.len() + 1);
        for block in &self.hidden {
            layers.push(dense_layer(&block.linear)?);
        }
        layers.push(dense_layer(&self.head)?);
        FrozenPriceNet::new(layers).map_err(|e| PricerError::Training(e.to_string()))
    }
}

fn dense_layer<B: Backend>(linear: &Linear<B>) -> Result<DenseLayer> {
    let weight = linear.weight.val();
    let [input_dim, output_dim] = weight.dims();
    let weights = weight
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PricerError::Training(format!("Failed to read weights: {:?}", e)))?;
    let bias = match &linear.bias {
        Some(b) => b
            .val()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| PricerError::Training(format!("Failed to read bias: {:?}", e)))?,
        None => vec![0.0; output_dim],
    };

    Ok(DenseLayer {
        input_dim,
        output_dim,
        weights,
        bias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::PricePredictor;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn config() -> PriceNetConfig {
        PriceNetConfig {
            input_dim: 19,
            hidden_dims: vec![16, 8],
            dropout: 0.1,
        }
    }

    #[test]
    fn test_price_net_shape() {
        let device = Default::default();
        let model = PriceNet::<TestBackend>::new(&device, &config());

        let features = Tensor::random(
            [4, 19],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let out = model.forward(features);
        assert_eq!(out.dims(), [4, 1]);
    }

    #[test]
    fn test_frozen_matches_forward() {
        let device = Default::default();
        let model = PriceNet::<TestBackend>::new(&device, &config());
        let frozen = model.freeze().unwrap();
        assert_eq!(frozen.input_dim(), 19);

        let input: Vec<f32> = (0..19).map(|i| (i as f32 - 9.0) / 5.0).collect();
        let tensor = Tensor::<TestBackend, 1>::from_floats(input.as_slice(), &device)
            .reshape([1, 19]);
        let expected: f32 = model
            .forward(tensor)
            .into_data()
            .to_vec::<f32>()
            .unwrap()[0];

        let actual = frozen.predict(&input).unwrap();
        assert!(
            (actual - expected as f64).abs() < 1e-4,
            "frozen {} vs burn {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_no_hidden_layers() {
        let device = Default::default();
        let config = PriceNetConfig {
            input_dim: 5,
            hidden_dims: vec![],
            dropout: 0.0,
        };
        let model = PriceNet::<TestBackend>::new(&device, &config);
        let frozen = model.freeze().unwrap();
        assert_eq!(frozen.layers().len(), 1);
    }
}
