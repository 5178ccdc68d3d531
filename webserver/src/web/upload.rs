//! Multipart upload parsing
//!
//! Analysis endpoints share one form layout: one or more `file` parts plus
//! optional `enhance`, `backend` and `patient_id` text fields.

use analysis::UploadedImage;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use crate::error::{WebServerError, WebServerResult};
use shared::{ClassifierBackend, PatientId};

/// Parsed analysis form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<UploadedImage>,
    pub enhance: Option<bool>,
    pub backend: Option<ClassifierBackend>,
    pub patient_id: Option<PatientId>,
}

impl UploadForm {
    /// Read every part of the request
    pub async fn read(mut multipart: Multipart) -> WebServerResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" | "files" | "files[]" => {
                    let file_name = field
                        .file_name()
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or("upload")
                        .to_string();
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    form.files.push(UploadedImage::new(file_name, bytes.to_vec()));
                }
                "enhance" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.enhance = Some(parse_flag(&value)?);
                }
                "backend" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    if !value.trim().is_empty() {
                        form.backend = Some(value.parse()?);
                    }
                }
                "patient_id" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    if !value.trim().is_empty() {
                        form.patient_id = Some(value.parse()?);
                    }
                }
                // Unknown parts are drained and ignored
                _ => {
                    field.bytes().await.map_err(multipart_error)?;
                }
            }
        }

        Ok(form)
    }

    /// The single uploaded file, for endpoints that take exactly one
    pub fn single_file(mut self) -> WebServerResult<(UploadedImage, Self)> {
        match self.files.len() {
            0 => Err(WebServerError::invalid("A `file` field is required")),
            1 => {
                let file = self.files.remove(0);
                Ok((file, self))
            }
            n => Err(WebServerError::invalid(format!("Expected one file, got {n}"))),
        }
    }
}

fn multipart_error(e: MultipartError) -> WebServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        WebServerError::PayloadTooLarge
    } else {
        WebServerError::invalid(format!("Malformed upload: {}", e.body_text()))
    }
}

/// Accepts the usual HTML form spellings of a checkbox
pub fn parse_flag(value: &str) -> WebServerResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        other => Err(WebServerError::invalid(format!("Invalid boolean: {other}"))),
    }
}
