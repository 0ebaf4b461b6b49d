//! Core abstractions: the in-memory dataset and the pipeline seams.

pub mod dataset;
pub mod traits;

pub use dataset::Dataset;
pub use traits::{BulkLoader, DatasetStore};
