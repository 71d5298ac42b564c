//! Plain-data copy of a trained [`PriceNet`](super::PriceNet)
//!
//! Holds no tensors and no interior mutability, so one instance can be shared
//! across threads and evaluated without locking. Dropout is an identity at
//! inference time and is not represented.

use serde::{Deserialize, Serialize};

use crate::predict::PricePredictor;
use crate::{ArtifactLoadError, PredictionError};

/// Fully connected layer, weights stored row-major as [input_dim][output_dim]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub input_dim: usize,
    pub output_dim: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    fn forward(&self, x: &[f32], activate: bool) -> Vec<f32> {
        let mut out = self.bias.clone();
        for (i, &xi) in x.iter().enumerate() {
            let row = &self.weights[i * self.output_dim..(i + 1) * self.output_dim];
            for (o, &w) in out.iter_mut().zip(row) {
                *o += xi * w;
            }
        }
        if activate {
            for o in &mut out {
                *o = o.max(0.0);
            }
        }
        out
    }
}

/// ReLU network: every layer but the last is activated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenPriceNet {
    layers: Vec<DenseLayer>,
}

impl FrozenPriceNet {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ArtifactLoadError> {
        let net = FrozenPriceNet { layers };
        net.validate()?;
        Ok(net)
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Check layer shapes chain together and end in a single output
    pub fn validate(&self) -> Result<(), ArtifactLoadError> {
        let corrupt = |msg: String| Err(ArtifactLoadError::Corrupt(msg));

        let Some(last) = self.layers.last() else {
            return corrupt("network has no layers".to_string());
        };
        if last.output_dim != 1 {
            return corrupt(format!("output layer has {} units", last.output_dim));
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.input_dim * layer.output_dim
                || layer.bias.len() != layer.output_dim
            {
                return corrupt(format!("layer {} has inconsistent shapes", i));
            }
            if let Some(next) = self.layers.get(i + 1) {
                if next.input_dim != layer.output_dim {
                    return corrupt(format!("layer {} does not feed layer {}", i, i + 1));
                }
            }
            if layer.weights.iter().chain(&layer.bias).any(|w| !w.is_finite()) {
                return corrupt(format!("layer {} has non-finite weights", i));
            }
        }
        Ok(())
    }
}

impl PricePredictor for FrozenPriceNet {
    fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.input_dim).unwrap_or(0)
    }

    fn predict(&self, features: &[f32]) -> Result<f64, PredictionError> {
        let expected = self.input_dim();
        if features.len() != expected {
            return Err(PredictionError::InputDimension {
                expected,
                actual: features.len(),
            });
        }

        let last = self.layers.len() - 1;
        let mut x = features.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x, i < last);
        }

        let out = x.first().copied().unwrap_or(f32::NAN) as f64;
        if !out.is_finite() {
            return Err(PredictionError::ModelOutputInvalid(out));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(weights: Vec<f32>, bias: f32) -> FrozenPriceNet {
        let input_dim = weights.len();
        FrozenPriceNet::new(vec![DenseLayer {
            input_dim,
            output_dim: 1,
            weights,
            bias: vec![bias],
        }])
        .unwrap()
    }

    #[test]
    fn test_linear_predict() {
        let net = linear(vec![0.5, -1.0], 4.0);
        let out = net.predict(&[2.0, 1.0]).unwrap();
        assert!((out - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_relu_hidden_layer() {
        let net = FrozenPriceNet::new(vec![
            DenseLayer {
                input_dim: 1,
                output_dim: 2,
                weights: vec![1.0, -1.0],
                bias: vec![0.0, 0.0],
            },
            DenseLayer {
                input_dim: 2,
                output_dim: 1,
                weights: vec![1.0, 1.0],
                bias: vec![0.0],
            },
        ])
        .unwrap();
        // hidden = relu([3, -3]) = [3, 0]
        assert_eq!(net.predict(&[3.0]).unwrap(), 3.0);
        assert_eq!(net.predict(&[-2.0]).unwrap(), 2.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let net = linear(vec![1.0, 1.0, 1.0], 0.0);
        let err = net.predict(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            PredictionError::InputDimension {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn test_overflow_is_invalid_output() {
        let net = linear(vec![f32::MAX], f32::MAX);
        let err = net.predict(&[f32::MAX]).unwrap_err();
        assert!(matches!(err, PredictionError::ModelOutputInvalid(_)));
    }

    #[test]
    fn test_rejects_broken_shapes() {
        let err = FrozenPriceNet::new(vec![DenseLayer {
            input_dim: 2,
            output_dim: 1,
            weights: vec![1.0],
            bias: vec![0.0],
        }])
        .unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Corrupt(_)));
        assert!(FrozenPriceNet::new(vec![]).is_err());
    }
}
