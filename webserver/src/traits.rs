//! Service trait definitions for dependency injection
//!
//! All I/O and shared-state operations are abstracted through these traits for testability

use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use uuid::Uuid;

use crate::error::WebServerResult;
use crate::types::{ClientId, DeliveryReceipt, OutgoingReport, ServerEvent, Snapshot, SnapshotSummary};
use shared::{AnalysisResult, BatchReport, NewPatient, Patient, PatientId, PatientUpdate};

/// In-memory patient registry
#[mockall::automock]
#[async_trait]
pub trait PatientRegistry: Send + Sync {
    /// Validate and store a new patient; document ids are unique
    async fn create(&self, patient: NewPatient) -> WebServerResult<Patient>;

    async fn get(&self, id: PatientId) -> WebServerResult<Patient>;

    /// Sorted by name; `query` filters on name or document id
    async fn list(&self, query: Option<String>) -> Vec<Patient>;

    /// Apply a partial update, all fields or none
    async fn update(&self, id: PatientId, update: PatientUpdate) -> WebServerResult<Patient>;

    /// Remove and return the patient
    async fn delete(&self, id: PatientId) -> WebServerResult<Patient>;

    /// Record an analysis against a patient (idempotent)
    async fn attach_analysis(&self, id: PatientId, analysis_id: Uuid) -> WebServerResult<()>;

    async fn count(&self) -> usize;

    /// All patients, for persistence
    async fn snapshot(&self) -> Vec<Patient>;

    /// Replace every patient wholesale
    async fn restore(&self, patients: Vec<Patient>) -> WebServerResult<()>;
}

/// Bounded analysis history plus batch reports
#[mockall::automock]
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Store a result; returns the number of evicted entries
    async fn insert(&self, result: AnalysisResult) -> usize;

    async fn get(&self, id: Uuid) -> WebServerResult<AnalysisResult>;

    /// Newest first, at most `limit`
    async fn recent(&self, limit: usize) -> Vec<AnalysisResult>;

    /// Newest first
    async fn for_patient(&self, patient_id: PatientId) -> Vec<AnalysisResult>;

    /// Clear the patient link on every stored result; returns how many changed
    async fn detach_patient(&self, patient_id: PatientId) -> usize;

    /// Apply a new bound, evicting oldest entries as needed
    async fn set_history_limit(&self, limit: usize) -> usize;

    /// Store a batch report and every result in it
    async fn insert_batch(&self, report: BatchReport) -> usize;

    async fn get_batch(&self, batch_id: Uuid) -> WebServerResult<BatchReport>;

    async fn count(&self) -> usize;

    /// Oldest first, for persistence
    async fn snapshot(&self) -> (Vec<AnalysisResult>, Vec<BatchReport>);

    /// Replace history and batches wholesale
    async fn restore(&self, analyses: Vec<AnalysisResult>, batches: Vec<BatchReport>);
}

/// Delivery of PDF reports by email
#[mockall::automock]
#[async_trait]
pub trait ReportMailer: Send + Sync {
    async fn send_report(&self, report: OutgoingReport) -> WebServerResult<DeliveryReceipt>;

    /// Short transport name shown in status output
    fn transport_name(&self) -> &'static str;
}

/// Snapshot persistence
#[mockall::automock]
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: Snapshot) -> WebServerResult<SnapshotSummary>;

    async fn load(&self) -> WebServerResult<Snapshot>;

    async fn exists(&self) -> bool;

    fn location(&self) -> String;
}

/// WebSocket clients and event fan-out
#[mockall::automock]
#[async_trait]
pub trait ClientBroadcaster: Send + Sync {
    /// Drive one browser connection until it closes
    async fn handle_connection(&self, socket: WebSocket, client_id: ClientId) -> WebServerResult<()>;

    /// Send to every connected client; returns the receiver count
    fn broadcast(&self, event: ServerEvent) -> usize;

    fn client_count(&self) -> u32;
}

/// Static file serving service trait
#[mockall::automock]
#[async_trait]
pub trait StaticFileServer: Send + Sync {
    /// Serve static file
    async fn serve_file(&self, path: &str) -> WebServerResult<StaticFileResponse>;

    /// Check if file exists
    async fn file_exists(&self, path: &str) -> bool;
}

/// Static file response
#[derive(Debug, Clone)]
pub struct StaticFileResponse {
    pub content: Vec<u8>,
    pub content_type: String,
    pub cache_control: Option<String>,
}

impl StaticFileResponse {
    /// Create new static file response
    pub fn new(content: Vec<u8>, content_type: String) -> Self {
        Self {
            content,
            content_type,
            cache_control: None,
        }
    }

    /// Set cache control header
    pub fn with_cache_control(mut self, cache_control: String) -> Self {
        self.cache_control = Some(cache_control);
        self
    }
}
