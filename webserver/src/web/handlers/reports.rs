//! PDF download and email dispatch

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use super::parse_uuid;
use crate::error::{WebServerError, WebServerResult};
use crate::types::{EmailRequest, OutgoingReport};
use crate::web::extract::ApiJson;
use crate::webserver_impl::WebServer;
use report::{PdfReportRenderer, batch_report_file_name, report_file_name};
use shared::{AnalysisResult, BatchReport, DISCLAIMER, Patient, ProcessId, process_info};

fn pdf_response(file_name: String, pdf: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        pdf,
    )
}

/// Result plus its patient, if it still has one
async fn load_analysis(server: &WebServer, raw_id: &str) -> WebServerResult<(AnalysisResult, Option<Patient>)> {
    let id = parse_uuid(raw_id)?;
    let result = server.services.analyses.get(id).await?;
    let patient = match result.patient_id {
        Some(patient_id) => server.services.patients.get(patient_id).await.ok(),
        None => None,
    };
    Ok((result, patient))
}

async fn renderer(server: &WebServer) -> PdfReportRenderer {
    PdfReportRenderer::new(server.state.settings().await.clinic_name)
}

/// GET /api/analyses/:id/report.pdf
pub async fn analysis_pdf(State(server): State<WebServer>, Path(id): Path<String>) -> WebServerResult<impl IntoResponse> {
    let (result, patient) = load_analysis(&server, &id).await?;
    let pdf = renderer(&server).await.render_analysis(&result, patient.as_ref())?;
    Ok(pdf_response(report_file_name(result.id), pdf))
}

/// GET /api/batches/:id
pub async fn get_batch(State(server): State<WebServer>, Path(id): Path<String>) -> WebServerResult<Json<BatchReport>> {
    let id = parse_uuid(&id)?;
    Ok(Json(server.services.analyses.get_batch(id).await?))
}

/// GET /api/batches/:id/report.pdf
pub async fn batch_pdf(State(server): State<WebServer>, Path(id): Path<String>) -> WebServerResult<impl IntoResponse> {
    let id = parse_uuid(&id)?;
    let report = server.services.analyses.get_batch(id).await?;
    let pdf = renderer(&server).await.render_batch(&report)?;
    Ok(pdf_response(batch_report_file_name(report.batch_id), pdf))
}

fn default_body(result: &AnalysisResult, patient: Option<&Patient>) -> String {
    let greeting = match patient {
        Some(patient) => format!("Report for {}", patient.full_name),
        None => "Analysis report".to_string(),
    };
    format!(
        "{greeting}\n\nImage: {}\nPrimary diagnosis: {}\nConfidence: {:.1}%\nRisk level: {}\n\n{}\n\nThe full report is attached as a PDF.\n\n{}\n",
        result.file_name,
        result.predicted.label(),
        result.confidence * 100.0,
        result.risk_level,
        result.recommendation,
        DISCLAIMER
    )
}

/// POST /api/analyses/:id/email
///
/// Sends to `to` when given, otherwise to the patient's address.
pub async fn email_report(
    State(server): State<WebServer>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<EmailRequest>,
) -> WebServerResult<Json<Value>> {
    let (result, patient) = load_analysis(&server, &id).await?;

    let recipient = request
        .to
        .filter(|to| !to.trim().is_empty())
        .or_else(|| patient.as_ref().and_then(|p| p.email.clone()))
        .ok_or_else(|| WebServerError::invalid("No recipient given and the analysis has no patient email"))?;

    let pdf = renderer(&server).await.render_analysis(&result, patient.as_ref())?;
    let report = OutgoingReport {
        recipient: recipient.trim().to_string(),
        subject: request
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("Colposcopy analysis report - {}", result.file_name)),
        body: request
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_body(&result, patient.as_ref())),
        attachment_name: report_file_name(result.id),
        pdf,
    };

    let receipt = server.services.mailer.send_report(report).await?;
    process_info!(
        ProcessId::current(),
        "📧 Report {} delivered to {} via {}",
        result.id,
        receipt.recipient,
        receipt.transport
    );

    Ok(Json(json!({ "status": "success", "delivery": receipt })))
}
