//! Feature extraction and encoding
//!
//! Converts raw listing data into model-ready features.

pub mod encoder;
pub mod normalizer;
pub mod record;
pub mod schema;

pub use encoder::{EncoderState, FeatureEncoder};
pub use normalizer::{MissingPolicy, Normalizer, RawRecord};
pub use record::CanonicalRecord;
pub use schema::{FeatureKind, Schema, SCHEMA_VERSION};
