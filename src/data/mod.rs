//! Data ingestion and storage
//!
//! SQLite listing storage and burn datasets for training.

pub mod database;
pub mod dataset;

pub use database::{Database, DatabaseStats, ImportSummary, TrainingRow};
pub use dataset::{split_indices, ListingBatch, ListingBatcher, ListingDataset, ListingSample};
