//! Report rendering errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF font setup failed: {0}")]
    Font(String),

    #[error("PDF serialization failed: {0}")]
    Serialize(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
