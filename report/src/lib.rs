//! PDF reports for analyses and batches
//!
//! Shared by the web server downloads and email attachments and by the
//! command line front-end.

pub mod error;
pub mod renderer;

pub use error::{ReportError, Result};
pub use renderer::{PdfReportRenderer, ascii_text, batch_report_file_name, report_file_name, wrap};
