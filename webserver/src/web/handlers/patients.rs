//! Patient registry endpoints

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::error::WebServerResult;
use crate::types::PatientQuery;
use crate::web::extract::{ApiJson, ApiQuery};
use crate::webserver_impl::WebServer;
use shared::{AnalysisResult, NewPatient, Patient, PatientId, PatientUpdate};

fn parse_patient_id(raw: &str) -> WebServerResult<PatientId> {
    Ok(raw.parse()?)
}

/// GET /api/patients
pub async fn list_patients(
    State(server): State<WebServer>,
    ApiQuery(query): ApiQuery<PatientQuery>,
) -> Json<Vec<Patient>> {
    let q = query.q.filter(|q| !q.trim().is_empty());
    Json(server.services.patients.list(q).await)
}

/// POST /api/patients
pub async fn create_patient(
    State(server): State<WebServer>,
    ApiJson(patient): ApiJson<NewPatient>,
) -> WebServerResult<(StatusCode, Json<Patient>)> {
    let patient = server.services.patients.create(patient).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// GET /api/patients/:id
pub async fn get_patient(State(server): State<WebServer>, Path(id): Path<String>) -> WebServerResult<Json<Patient>> {
    let id = parse_patient_id(&id)?;
    Ok(Json(server.services.patients.get(id).await?))
}

/// PUT /api/patients/:id
pub async fn update_patient(
    State(server): State<WebServer>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<PatientUpdate>,
) -> WebServerResult<Json<Patient>> {
    let id = parse_patient_id(&id)?;
    Ok(Json(server.services.patients.update(id, update).await?))
}

/// DELETE /api/patients/:id
///
/// Stored analyses stay in the history but lose their patient link.
pub async fn delete_patient(State(server): State<WebServer>, Path(id): Path<String>) -> WebServerResult<Json<Value>> {
    let id = parse_patient_id(&id)?;
    let removed = server.services.patients.delete(id).await?;
    let detached = server.services.analyses.detach_patient(id).await;

    Ok(Json(json!({
        "status": "deleted",
        "id": removed.id,
        "detached_analyses": detached,
    })))
}

/// GET /api/patients/:id/analyses
pub async fn patient_analyses(
    State(server): State<WebServer>,
    Path(id): Path<String>,
) -> WebServerResult<Json<Vec<AnalysisResult>>> {
    let id = parse_patient_id(&id)?;
    server.services.patients.get(id).await?;
    Ok(Json(server.services.analyses.for_patient(id).await))
}
