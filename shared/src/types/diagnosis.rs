//! Diagnostic classes, risk levels and class probability vectors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{SharedError, SharedResult};

/// Tolerance used when checking that probabilities sum to one
const SUM_TOLERANCE: f64 = 1e-6;

/// Shown with every result and report
pub const DISCLAIMER: &str = "Important: this analysis is a diagnostic decision-support tool. \
It must always be interpreted by a qualified medical professional.";

/// Fixed diagnostic output classes, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticClass {
    Normal,
    #[serde(rename = "cin1")]
    CinI,
    #[serde(rename = "cin2")]
    CinII,
    #[serde(rename = "cin3")]
    CinIII,
    Carcinoma,
}

impl DiagnosticClass {
    /// All classes in severity order; this is also the classifier output order
    pub const ALL: [DiagnosticClass; 5] = [
        DiagnosticClass::Normal,
        DiagnosticClass::CinI,
        DiagnosticClass::CinII,
        DiagnosticClass::CinIII,
        DiagnosticClass::Carcinoma,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticClass::Normal => "Normal",
            DiagnosticClass::CinI => "CIN I",
            DiagnosticClass::CinII => "CIN II",
            DiagnosticClass::CinIII => "CIN III",
            DiagnosticClass::Carcinoma => "Carcinoma",
        }
    }

    /// Stable identifier used in JSON and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            DiagnosticClass::Normal => "normal",
            DiagnosticClass::CinI => "cin1",
            DiagnosticClass::CinII => "cin2",
            DiagnosticClass::CinIII => "cin3",
            DiagnosticClass::Carcinoma => "carcinoma",
        }
    }

    /// Position in [`DiagnosticClass::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn risk_level(&self) -> RiskLevel {
        match self {
            DiagnosticClass::Normal => RiskLevel::Low,
            DiagnosticClass::CinI => RiskLevel::Medium,
            DiagnosticClass::CinII | DiagnosticClass::CinIII | DiagnosticClass::Carcinoma => RiskLevel::High,
        }
    }
}

impl fmt::Display for DiagnosticClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DiagnosticClass {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        DiagnosticClass::ALL
            .into_iter()
            .find(|class| class.label().eq_ignore_ascii_case(needle) || class.id().eq_ignore_ascii_case(needle))
            .ok_or_else(|| SharedError::UnknownClass { input: s.to_string() })
    }
}

/// Coarse triage risk derived from the predicted class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Clinical recommendation for a predicted class
pub fn recommendation(class: DiagnosticClass) -> &'static str {
    match class {
        DiagnosticClass::Normal => "Normal result. Routine follow-up according to protocol is recommended.",
        DiagnosticClass::CinI => {
            "Low-grade lesion detected. Close follow-up is recommended, with a possible repeat examination in 6-12 months."
        }
        DiagnosticClass::CinII => {
            "High-grade lesion detected. Evaluation by a specialist and possible treatment are recommended."
        }
        DiagnosticClass::CinIII => {
            "Severe high-grade lesion detected. Immediate evaluation by a specialist and treatment are required."
        }
        DiagnosticClass::Carcinoma => {
            "Findings suggestive of an invasive lesion. Urgent oncology referral and biopsy are required."
        }
    }
}

/// One probability per diagnostic class, in [`DiagnosticClass::ALL`] order.
///
/// Values are finite, lie in `[0, 1]` and sum to one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassProbabilities {
    values: [f64; DiagnosticClass::COUNT],
}

impl ClassProbabilities {
    /// Normalize non-negative raw scores into probabilities
    pub fn from_scores(scores: &[f64]) -> SharedResult<Self> {
        let values = Self::check_len(scores)?;

        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SharedError::InvalidScores {
                message: "scores must be finite and non-negative".to_string(),
            });
        }

        let total: f64 = values.iter().sum();
        if total <= 0.0 {
            return Err(SharedError::InvalidScores {
                message: "scores sum to zero".to_string(),
            });
        }

        Ok(Self {
            values: values.map(|v| v / total),
        })
    }

    /// Numerically stable softmax over raw logits
    pub fn from_softmax_logits(logits: &[f64]) -> SharedResult<Self> {
        let values = Self::check_len(logits)?;

        if values.iter().any(|v| !v.is_finite()) {
            return Err(SharedError::InvalidScores {
                message: "logits must be finite".to_string(),
            });
        }

        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps = values.map(|v| (v - max).exp());
        Self::from_scores(&exps)
    }

    fn check_len(scores: &[f64]) -> SharedResult<[f64; DiagnosticClass::COUNT]> {
        scores
            .try_into()
            .map_err(|_| SharedError::ScoreCountMismatch {
                expected: DiagnosticClass::COUNT,
                actual: scores.len(),
            })
    }

    pub fn get(&self, class: DiagnosticClass) -> f64 {
        self.values[class.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Iterate `(class, probability)` pairs in class order
    pub fn iter(&self) -> impl Iterator<Item = (DiagnosticClass, f64)> + '_ {
        DiagnosticClass::ALL.into_iter().zip(self.values.iter().copied())
    }

    /// Most probable class; ties go to the least severe class
    pub fn predicted(&self) -> DiagnosticClass {
        let mut best = 0;
        for (i, value) in self.values.iter().enumerate() {
            if *value > self.values[best] {
                best = i;
            }
        }
        DiagnosticClass::ALL[best]
    }

    /// Probability of the predicted class
    pub fn confidence(&self) -> f64 {
        self.get(self.predicted())
    }
}

impl<'de> Deserialize<'de> for ClassProbabilities {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            values: Vec<f64>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let probabilities = ClassProbabilities::from_scores(&raw.values).map_err(serde::de::Error::custom)?;
        let total: f64 = raw.values.iter().sum();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(serde::de::Error::custom(format!(
                "probabilities must sum to 1, got {total}"
            )));
        }
        Ok(probabilities)
    }
}
