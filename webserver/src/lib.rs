//! Webserver library for the ColpoVision triage tool
//!
//! Serves the browser UI and a REST API for image analysis, patient
//! records, PDF reports and email delivery, with WebSocket push of
//! analysis progress.

pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod traits;
pub mod types;
pub mod web;
pub mod webserver_impl;

// Re-export main types
pub use config::{AppConfig, MailConfig, MailTransportConfig, RuntimeSettings, SettingsUpdate};
pub use error::{WebServerError, WebServerResult};
pub use state::WebServerState;
pub use types::*;
pub use webserver_impl::{ServiceSet, WebServer};

// Re-export trait definitions
pub use traits::{AnalysisStore, ClientBroadcaster, PatientRegistry, ReportMailer, SnapshotStore, StaticFileServer};

// Re-export service implementations
pub use services::{
    FileSnapshotStore, OutboxMailer, RealAnalysisStore, RealClientBroadcaster, RealPatientRegistry,
    RealStaticFileServer, SmtpMailer, SmtpSecurity, mailer_from_config,
};
