//! Neural network architecture
//!
//! - `PriceNet`: burn MLP trained on encoded listings
//! - `FrozenPriceNet`: its weights as plain data, used for serving

pub mod frozen;
pub mod price_net;

pub use frozen::{DenseLayer, FrozenPriceNet};
pub use price_net::{PriceNet, PriceNetConfig};
