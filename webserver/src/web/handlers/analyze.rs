//! Analysis endpoints
//!
//! Image work is CPU bound and runs on the blocking pool.

use analysis::{AnalysisOptions, FilterKind, imaging};
use axum::Json;
use axum::extract::{Path, State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use super::parse_uuid;
use crate::error::{WebServerError, WebServerResult};
use crate::types::{HistoryQuery, ServerEvent};
use crate::web::extract::{ApiMultipart, ApiQuery};
use crate::web::upload::UploadForm;
use crate::webserver_impl::WebServer;
use shared::{AnalysisResult, DISCLAIMER, ProcessId, process_info};

const DEFAULT_HISTORY_PAGE: usize = 50;

async fn blocking<T, F>(task: F) -> WebServerResult<T>
where
    F: FnOnce() -> analysis::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| WebServerError::internal(format!("Analysis task failed: {e}")))?;
    Ok(result?)
}

/// POST /api/analyze
pub async fn analyze(
    State(server): State<WebServer>,
    ApiMultipart(multipart): ApiMultipart,
) -> WebServerResult<Json<Value>> {
    let form = UploadForm::read(multipart).await?;
    let settings = server.state.settings().await;
    let (file, form) = form.single_file()?;

    // Unknown patients are rejected before any image work
    if let Some(patient_id) = form.patient_id {
        server.services.patients.get(patient_id).await?;
    }

    let options = AnalysisOptions {
        enhance: form.enhance.unwrap_or(settings.enhance_by_default),
        backend: form.backend.unwrap_or(settings.default_backend),
        patient_id: form.patient_id,
    };

    let engine = server.engine.clone();
    let result = blocking(move || engine.analyze(&file.bytes, &file.file_name, options)).await?;
    let result = server.record_analysis(result).await?;

    process_info!(
        ProcessId::current(),
        "🔬 Analysed {}: {} ({:.1}%)",
        result.file_name,
        result.predicted,
        result.confidence * 100.0
    );

    Ok(Json(json!({
        "status": "success",
        "analysis": result,
        "disclaimer": DISCLAIMER,
    })))
}

/// POST /api/analyze/batch
pub async fn analyze_batch(
    State(server): State<WebServer>,
    ApiMultipart(multipart): ApiMultipart,
) -> WebServerResult<Json<Value>> {
    let form = UploadForm::read(multipart).await?;
    if form.files.is_empty() {
        return Err(WebServerError::invalid("At least one `file` field is required"));
    }
    let backend = match form.backend {
        Some(backend) => backend,
        None => server.state.settings().await.default_backend,
    };

    let engine = server.engine.clone();
    let broadcaster = server.services.broadcaster.clone();
    let files = form.files;
    let report = blocking(move || {
        engine.analyze_batch(&files, backend, |done, total| {
            broadcaster.broadcast(ServerEvent::BatchProgress { done, total });
        })
    })
    .await?;

    let report = server.record_batch(report).await;
    Ok(Json(json!({
        "status": "success",
        "batch": report,
        "disclaimer": DISCLAIMER,
    })))
}

/// POST /api/analyze/compare
pub async fn compare(
    State(server): State<WebServer>,
    ApiMultipart(multipart): ApiMultipart,
) -> WebServerResult<Json<Value>> {
    let form = UploadForm::read(multipart).await?;
    let (file, form) = form.single_file()?;
    let backend = match form.backend {
        Some(backend) => backend,
        None => server.state.settings().await.default_backend,
    };

    let engine = server.engine.clone();
    let comparison = blocking(move || engine.compare(&file.bytes, &file.file_name, backend)).await?;

    server.record_analysis(comparison.original.clone()).await?;
    server.record_analysis(comparison.enhanced.clone()).await?;

    Ok(Json(json!({
        "status": "success",
        "comparison": comparison,
        "disclaimer": DISCLAIMER,
    })))
}

/// POST /api/filters
pub async fn filters(
    State(server): State<WebServer>,
    ApiMultipart(multipart): ApiMultipart,
) -> WebServerResult<Json<Value>> {
    let form = UploadForm::read(multipart).await?;
    let settings = server.state.settings().await;
    let (file, form) = form.single_file()?;
    let enhance = form.enhance.unwrap_or(settings.enhance_by_default);

    let engine = server.engine.clone();
    let variants = blocking(move || {
        let set = engine.filters(&file.bytes, &file.file_name, enhance)?;
        FilterKind::ALL
            .into_iter()
            .map(|kind| {
                let png = imaging::encode_png(set.get(kind))?;
                Ok(json!({
                    "kind": kind,
                    "caption": kind.caption(),
                    "png_base64": STANDARD.encode(png),
                }))
            })
            .collect::<analysis::Result<Vec<Value>>>()
    })
    .await?;

    Ok(Json(json!({
        "status": "success",
        "enhanced": enhance,
        "variants": variants,
    })))
}

/// GET /api/analyses
pub async fn list_analyses(
    State(server): State<WebServer>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> WebServerResult<Json<Vec<AnalysisResult>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_PAGE);
    let analyses = match query.patient_id {
        Some(patient_id) => {
            let mut analyses = server.services.analyses.for_patient(patient_id).await;
            analyses.truncate(limit);
            analyses
        }
        None => server.services.analyses.recent(limit).await,
    };
    Ok(Json(analyses))
}

/// GET /api/analyses/:id
pub async fn get_analysis(
    State(server): State<WebServer>,
    Path(id): Path<String>,
) -> WebServerResult<Json<AnalysisResult>> {
    let id = parse_uuid(&id)?;
    Ok(Json(server.services.analyses.get(id).await?))
}
