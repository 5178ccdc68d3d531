//! Analysis engine error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Image is empty: {file_name}")]
    EmptyImage { file_name: String },

    #[error("Unsupported image format for {file_name}; expected PNG, JPEG, BMP or TIFF")]
    UnsupportedFormat { file_name: String },

    #[error("Failed to decode {file_name}: {message}")]
    DecodeFailed { file_name: String, message: String },

    #[error("Image encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Input tensor has shape {actual:?}, classifier expects {expected:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },

    #[error("Invalid model weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Batch contains no images")]
    EmptyBatch,

    #[error("Domain error: {0}")]
    Domain(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
