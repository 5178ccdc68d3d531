//! Shared error types for the triage domain

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SharedError {
    #[error("Unknown diagnostic class: {input}")]
    UnknownClass { input: String },

    #[error("Unknown classifier backend: {input}")]
    UnknownBackend { input: String },

    #[error("Invalid probability scores: {message}")]
    InvalidScores { message: String },

    #[error("Expected {expected} class scores, got {actual}")]
    ScoreCountMismatch { expected: usize, actual: usize },

    #[error("Invalid patient field: {field} = {value}")]
    InvalidPatient { field: String, value: String },

    #[error("Invalid UUID: {input}")]
    InvalidUuid { input: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
