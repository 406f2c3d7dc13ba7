//! Error types for graphbin core

use thiserror::Error;

/// Result type alias using the graphbin Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the binary graph store
///
/// Data-quality problems in the input rows are never reported through this
/// type: the pipeline drops the offending row and counts it in
/// [`IngestStats`](crate::loader::IngestStats).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Layout limits and output-location problems
    #[error("Storage error: {0}")]
    Storage(String),

    /// Truncated or malformed store files
    #[error("Corrupt store: {0}")]
    Corrupt(String),

    /// A string the pipeline itself wrote could not be resolved again
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// A pipeline phase was invoked out of order
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Row source could not be read
    #[error("Input error: {0}")]
    Input(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a corruption error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Create a consistency error
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    /// Create a pipeline ordering error
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    /// Create an input error
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}
