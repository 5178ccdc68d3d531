//! Type definitions for webserver
//!
//! Events pushed to browsers, request bodies and the snapshot document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RuntimeSettings;
use shared::{AnalysisResult, BatchReport, DiagnosticClass, Patient, PatientId, RiskLevel};

/// Client identifier for WebSocket connections
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

/// Alert levels for system messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Messages pushed to every connected browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    BatchProgress {
        done: usize,
        total: usize,
    },
    AnalysisCompleted {
        analysis_id: Uuid,
        file_name: String,
        predicted: DiagnosticClass,
        confidence: f64,
        risk_level: RiskLevel,
    },
    BatchCompleted {
        batch_id: Uuid,
        analysed: usize,
        failed: usize,
    },
    SystemAlert {
        level: AlertLevel,
        message: String,
        timestamp: i64,
    },
}

impl ServerEvent {
    pub fn analysis_completed(result: &AnalysisResult) -> Self {
        ServerEvent::AnalysisCompleted {
            analysis_id: result.id,
            file_name: result.file_name.clone(),
            predicted: result.predicted,
            confidence: result.confidence,
            risk_level: result.risk_level,
        }
    }

    pub fn batch_completed(report: &BatchReport) -> Self {
        ServerEvent::BatchCompleted {
            batch_id: report.batch_id,
            analysed: report.results.len(),
            failed: report.failures.len(),
        }
    }

    pub fn alert(level: AlertLevel, message: impl Into<String>) -> Self {
        ServerEvent::SystemAlert {
            level,
            message: message.into(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Body of `POST /api/analyses/:id/email`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Query string of `GET /api/patients`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientQuery {
    pub q: Option<String>,
}

/// Query string of `GET /api/analyses`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub patient_id: Option<PatientId>,
}

/// Bumped when the snapshot layout changes incompatibly
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the server keeps in memory, as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub settings: RuntimeSettings,
    pub patients: Vec<Patient>,
    /// Oldest first
    pub analyses: Vec<AnalysisResult>,
    #[serde(default)]
    pub batches: Vec<BatchReport>,
}

impl Snapshot {
    pub fn new(
        settings: RuntimeSettings,
        patients: Vec<Patient>,
        analyses: Vec<AnalysisResult>,
        batches: Vec<BatchReport>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            settings,
            patients,
            analyses,
            batches,
        }
    }
}

/// Counts reported after a snapshot save or load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub path: String,
    pub patients: usize,
    pub analyses: usize,
    pub batches: usize,
    pub saved_at: DateTime<Utc>,
}

impl SnapshotSummary {
    pub fn of(snapshot: &Snapshot, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            patients: snapshot.patients.len(),
            analyses: snapshot.analyses.len(),
            batches: snapshot.batches.len(),
            saved_at: snapshot.saved_at,
        }
    }
}

/// A report ready to be mailed
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingReport {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub pdf: Vec<u8>,
}

/// What the mailer reports back after a delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub recipient: String,
    /// `outbox` or `smtp`
    pub transport: String,
    /// Message id, outbox file name or server response
    pub reference: String,
    pub delivered_at: DateTime<Utc>,
}
