//! Core domain types used throughout the triage tool

pub mod analysis;
pub mod diagnosis;
pub mod patient;

pub use analysis::{
    AnalysisFailure, AnalysisResult, BatchReport, ClassifierBackend, ImageInfo, TechniqueComparison,
};
pub use diagnosis::{ClassProbabilities, DISCLAIMER, DiagnosticClass, RiskLevel, recommendation};
pub use patient::{MAX_PATIENT_AGE, NewPatient, Patient, PatientId, PatientUpdate, validate_email};
