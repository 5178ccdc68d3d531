//! Analysis results and the aggregates built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::diagnosis::{ClassProbabilities, DiagnosticClass, RiskLevel, recommendation};
use super::patient::PatientId;
use crate::errors::SharedError;

/// Which classifier produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// Placeholder convolutional network
    Model,
    /// Random draw normalized over the classes
    #[default]
    Simulated,
}

impl fmt::Display for ClassifierBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierBackend::Model => write!(f, "model"),
            ClassifierBackend::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for ClassifierBackend {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "model" | "cnn" => Ok(ClassifierBackend::Model),
            "simulated" | "random" => Ok(ClassifierBackend::Simulated),
            _ => Err(SharedError::UnknownBackend { input: s.to_string() }),
        }
    }
}

/// Basic facts about an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub color_mode: String,
}

/// Result of classifying a single image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub file_name: String,
    pub image: ImageInfo,
    pub backend: ClassifierBackend,
    pub enhanced: bool,
    pub probabilities: ClassProbabilities,
    pub predicted: DiagnosticClass,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub recommendation: String,
    pub patient_id: Option<PatientId>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Derive prediction, confidence, risk and recommendation from probabilities
    pub fn new(
        file_name: impl Into<String>,
        image: ImageInfo,
        backend: ClassifierBackend,
        enhanced: bool,
        probabilities: ClassProbabilities,
    ) -> Self {
        let predicted = probabilities.predicted();
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            image,
            backend,
            enhanced,
            confidence: probabilities.confidence(),
            probabilities,
            predicted,
            risk_level: predicted.risk_level(),
            recommendation: recommendation(predicted).to_string(),
            patient_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_patient(mut self, patient_id: Option<PatientId>) -> Self {
        self.patient_id = patient_id;
        self
    }
}

/// A file that could not be analysed as part of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub file_name: String,
    pub message: String,
}

/// Outcome of analysing several images at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub backend: ClassifierBackend,
    pub results: Vec<AnalysisResult>,
    pub failures: Vec<AnalysisFailure>,
    /// Count per class; every class is present
    pub counts: BTreeMap<DiagnosticClass, usize>,
    /// Share of analysed images per class; all zero when nothing was analysed
    pub distribution: BTreeMap<DiagnosticClass, f64>,
    pub created_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn new(
        batch_id: Uuid,
        backend: ClassifierBackend,
        results: Vec<AnalysisResult>,
        failures: Vec<AnalysisFailure>,
    ) -> Self {
        let mut counts: BTreeMap<DiagnosticClass, usize> =
            DiagnosticClass::ALL.into_iter().map(|c| (c, 0)).collect();
        for result in &results {
            *counts.entry(result.predicted).or_insert(0) += 1;
        }

        let analysed = results.len();
        let distribution = counts
            .iter()
            .map(|(class, count)| {
                let share = if analysed == 0 { 0.0 } else { *count as f64 / analysed as f64 };
                (*class, share)
            })
            .collect();

        Self {
            batch_id,
            backend,
            results,
            failures,
            counts,
            distribution,
            created_at: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }
}

/// The same image classified raw and after enhancement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueComparison {
    pub original: AnalysisResult,
    pub enhanced: AnalysisResult,
    pub agreement: bool,
}

impl TechniqueComparison {
    pub fn new(original: AnalysisResult, enhanced: AnalysisResult) -> Self {
        let agreement = original.predicted == enhanced.predicted;
        Self {
            original,
            enhanced,
            agreement,
        }
    }
}
