// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod dataset;
pub mod repository;

pub use dataset::{Dataset, DatasetMetadata, MergeOutcome, DATASET_VERSION};
pub use repository::{Classification, RepoRecord};
