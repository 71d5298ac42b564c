//! Fitted feature encoder
//!
//! `fit` learns per-column statistics once; `transform` is the single encoding
//! function used for training rows and inference requests alike.
//!
//! Numeric columns: median imputation, then z-score.
//! Categorical columns: most-frequent imputation, ordinal code (vocabulary
//! index, [`UNKNOWN_CODE`] for anything else), then z-score of the code.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use super::record::{CanonicalRecord, FeatureValue};
use super::schema::{FeatureDefault, FeatureSpec, Schema};
use crate::{ArtifactLoadError, FeatureError};

/// Code assigned to categories outside the fitted vocabulary
pub const UNKNOWN_CODE: f64 = -1.0;

/// Centering and scaling for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub mean: f64,
    /// Population standard deviation, or 1.0 for a constant column
    pub scale: f64,
}

impl Standardizer {
    /// Fit on a fully imputed column
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Standardizer {
                mean: 0.0,
                scale: 1.0,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };
        Standardizer { mean, scale }
    }

    pub fn apply(&self, x: f64) -> f64 {
        (x - self.mean) / self.scale
    }
}

/// Frozen statistics for a numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub impute: f64,
    pub scaler: Standardizer,
}

/// Frozen statistics for a categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// Code of a category is its index here
    pub vocabulary: Vec<String>,
    pub impute: String,
    pub scaler: Standardizer,
}

impl CategoricalColumn {
    pub fn code(&self, value: &str) -> f64 {
        self.vocabulary
            .iter()
            .position(|v| v == value)
            .map(|i| i as f64)
            .unwrap_or(UNKNOWN_CODE)
    }
}

/// Everything `transform` needs, learned once by `fit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    pub schema_version: u32,
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl EncoderState {
    /// Learn column statistics from a batch of canonical records
    pub fn fit(schema: &Schema, records: &[CanonicalRecord]) -> Result<Self, FeatureError> {
        if records.is_empty() {
            return Err(FeatureError::EmptyTrainingSet);
        }

        let numeric = schema
            .numeric_columns()
            .map(|spec| fit_numeric(spec, records))
            .collect::<Result<Vec<_>, _>>()?;

        let categorical = schema
            .categorical_columns()
            .map(|spec| fit_categorical(spec, records))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Fitted encoder on {} records ({} numeric, {} categorical columns)",
            records.len(),
            numeric.len(),
            categorical.len()
        );

        Ok(EncoderState {
            schema_version: schema.version(),
            numeric,
            categorical,
        })
    }

    /// Feature vector length
    pub fn dim(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    /// Encode a canonical record into a feature vector
    pub fn transform(&self, record: &CanonicalRecord) -> Result<Vec<f32>, FeatureError> {
        let mut out = Vec::with_capacity(self.dim());

        for col in &self.numeric {
            let x = match record.value(&col.name) {
                Some(FeatureValue::Numeric(v)) => v.unwrap_or(col.impute),
                _ => return Err(FeatureError::MissingColumn(col.name.clone())),
            };
            out.push(col.scaler.apply(x) as f32);
        }

        for col in &self.categorical {
            let value = match record.value(&col.name) {
                Some(FeatureValue::Category(v)) => v.unwrap_or(col.impute.as_str()),
                _ => return Err(FeatureError::MissingColumn(col.name.clone())),
            };
            out.push(col.scaler.apply(col.code(value)) as f32);
        }

        Ok(out)
    }

    /// Reject state fitted against a different schema version or vocabulary
    pub fn check_schema(&self, schema: &Schema) -> Result<(), ArtifactLoadError> {
        if self.schema_version != schema.version() {
            return Err(ArtifactLoadError::Corrupt(format!(
                "schema version {} does not match {}",
                self.schema_version,
                schema.version()
            )));
        }
        for col in &self.categorical {
            let expected = schema.vocabulary(&col.name).unwrap_or(&[]);
            if col.vocabulary.len() != expected.len()
                || col.vocabulary.iter().zip(expected).any(|(a, b)| a.as_str() != *b)
            {
                return Err(ArtifactLoadError::Corrupt(format!(
                    "vocabulary for {} differs from schema version {}",
                    col.name,
                    schema.version()
                )));
            }
        }
        Ok(())
    }
}

fn fit_numeric(
    spec: &FeatureSpec,
    records: &[CanonicalRecord],
) -> Result<NumericColumn, FeatureError> {
    let mut observed = Vec::with_capacity(records.len());
    for record in records {
        match record.value(spec.name) {
            Some(FeatureValue::Numeric(v)) => observed.push(v),
            _ => return Err(FeatureError::MissingColumn(spec.name.to_string())),
        }
    }

    let mut present: Vec<f64> = observed.iter().flatten().copied().collect();
    let impute = match median(&mut present) {
        Some(m) => m,
        None => {
            log::warn!("Column {} has no observed values, imputing schema default", spec.name);
            match spec.default {
                FeatureDefault::Number(n) => n,
                _ => 0.0,
            }
        }
    };

    let filled: Vec<f64> = observed.iter().map(|v| v.unwrap_or(impute)).collect();
    Ok(NumericColumn {
        name: spec.name.to_string(),
        impute,
        scaler: Standardizer::fit(&filled),
    })
}

fn fit_categorical(
    spec: &FeatureSpec,
    records: &[CanonicalRecord],
) -> Result<CategoricalColumn, FeatureError> {
    let mut observed: Vec<Option<&str>> = Vec::with_capacity(records.len());
    for record in records {
        match record.value(spec.name) {
            Some(FeatureValue::Category(v)) => observed.push(v),
            _ => return Err(FeatureError::MissingColumn(spec.name.to_string())),
        }
    }

    let impute = most_frequent(observed.iter().flatten().copied())
        .map(str::to_string)
        .unwrap_or_else(|| default_category(spec));

    let column = CategoricalColumn {
        name: spec.name.to_string(),
        vocabulary: spec.vocabulary.iter().map(|v| v.to_string()).collect(),
        impute,
        scaler: Standardizer {
            mean: 0.0,
            scale: 1.0,
        },
    };

    let unknown = observed
        .iter()
        .flatten()
        .filter(|v| column.code(v) == UNKNOWN_CODE)
        .count();
    if unknown > 0 {
        log::warn!("Column {}: {} values outside vocabulary", spec.name, unknown);
    }

    let codes: Vec<f64> = observed
        .iter()
        .map(|v| column.code(v.unwrap_or(column.impute.as_str())))
        .collect();

    Ok(CategoricalColumn {
        scaler: Standardizer::fit(&codes),
        ..column
    })
}

fn default_category(spec: &FeatureSpec) -> String {
    match spec.default {
        FeatureDefault::Text(t) => t.to_string(),
        FeatureDefault::Flag(b) => {
            let idx = if b { 0 } else { 1 };
            spec.vocabulary.get(idx).copied().unwrap_or_default().to_string()
        }
        FeatureDefault::Number(n) => n.to_string(),
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Most frequent value; ties go to the lexicographically smallest
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
        .map(|(v, _)| v)
}

/// Encoder holding a write-once fitted state
#[derive(Debug, Default)]
pub struct FeatureEncoder {
    schema: Schema,
    state: OnceLock<Arc<EncoderState>>,
}

impl FeatureEncoder {
    /// Unfitted encoder for the current schema
    pub fn new() -> Self {
        FeatureEncoder {
            schema: Schema::current(),
            state: OnceLock::new(),
        }
    }

    /// Encoder around previously fitted state
    pub fn from_state(state: Arc<EncoderState>) -> Self {
        let encoder = Self::new();
        let _ = encoder.state.set(state);
        encoder
    }

    /// Fit on training records and freeze the result
    pub fn fit(&self, records: &[CanonicalRecord]) -> Result<Arc<EncoderState>, FeatureError> {
        if self.state.get().is_some() {
            return Err(FeatureError::AlreadyFitted);
        }
        let state = Arc::new(EncoderState::fit(&self.schema, records)?);
        self.state
            .set(Arc::clone(&state))
            .map_err(|_| FeatureError::AlreadyFitted)?;
        Ok(state)
    }

    pub fn state(&self) -> Option<&Arc<EncoderState>> {
        self.state.get()
    }

    pub fn transform(&self, record: &CanonicalRecord) -> Result<Vec<f32>, FeatureError> {
        self.state
            .get()
            .ok_or(FeatureError::NotFitted)?
            .transform(record)
    }

    /// Transform many records, failing on the first error
    pub fn transform_batch(
        &self,
        records: &[CanonicalRecord],
    ) -> Result<Vec<Vec<f32>>, FeatureError> {
        records.iter().map(|r| self.transform(r)).collect()
    }
}
