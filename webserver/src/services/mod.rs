//! Service implementations
//!
//! Real implementations of all service traits for production use

pub mod analysis_store;
pub mod client_broadcaster;
pub mod mailer;
pub mod patient_registry;
pub mod snapshot_store;
pub mod static_server;

#[cfg(test)]
mod tests;

// Re-export service implementations
pub use analysis_store::RealAnalysisStore;
pub use client_broadcaster::RealClientBroadcaster;
pub use mailer::{OutboxMailer, SmtpMailer, SmtpSecurity, mailer_from_config};
pub use patient_registry::RealPatientRegistry;
pub use snapshot_store::FileSnapshotStore;
pub use static_server::RealStaticFileServer;
