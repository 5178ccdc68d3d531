//! Shared types for the ColpoVision triage tool
//!
//! Contains the diagnostic domain model used by the analysis engine, the
//! webserver and the command line front-end, plus the process identity and
//! tracing setup every binary uses.

pub mod errors;
pub mod logging;
pub mod process;
pub mod types;

pub use errors::*;
pub use process::ProcessId;
pub use types::*;
