//! Patient registry service implementation
//!
//! Patients live in `WebServerState::patients`; nothing here touches disk.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebServerError, WebServerResult};
use crate::state::WebServerState;
use crate::traits::PatientRegistry;
use shared::{NewPatient, Patient, PatientId, PatientUpdate, ProcessId, process_debug, process_info};

/// Real patient registry implementation
#[derive(Clone)]
pub struct RealPatientRegistry {
    state: Arc<WebServerState>,
}

impl RealPatientRegistry {
    pub fn new(state: Arc<WebServerState>) -> Self {
        Self { state }
    }
}

fn same_document(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[async_trait]
impl PatientRegistry for RealPatientRegistry {
    async fn create(&self, patient: NewPatient) -> WebServerResult<Patient> {
        let patient = patient.into_patient()?;

        let mut patients = self.state.patients.write().await;
        if patients.values().any(|p| same_document(&p.document_id, &patient.document_id)) {
            return Err(WebServerError::DuplicateDocument(patient.document_id));
        }
        patients.insert(patient.id, patient.clone());

        process_info!(ProcessId::current(), "👤 Registered patient {} ({})", patient.id, patient.full_name);
        Ok(patient)
    }

    async fn get(&self, id: PatientId) -> WebServerResult<Patient> {
        self.state
            .patients
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(WebServerError::PatientNotFound(id))
    }

    async fn list(&self, query: Option<String>) -> Vec<Patient> {
        let patients = self.state.patients.read().await;
        let mut matching: Vec<Patient> = patients
            .values()
            .filter(|p| query.as_deref().is_none_or(|q| p.matches(q)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            a.full_name
                .to_lowercase()
                .cmp(&b.full_name.to_lowercase())
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        matching
    }

    async fn update(&self, id: PatientId, update: PatientUpdate) -> WebServerResult<Patient> {
        let mut patients = self.state.patients.write().await;

        if let Some(document_id) = update.document_id.as_deref() {
            let taken = patients
                .values()
                .any(|p| p.id != id && same_document(&p.document_id, document_id));
            if taken {
                return Err(WebServerError::DuplicateDocument(document_id.trim().to_string()));
            }
        }

        let patient = patients.get_mut(&id).ok_or(WebServerError::PatientNotFound(id))?;
        patient.apply(update)?;

        process_debug!(ProcessId::current(), "✏️ Updated patient {}", id);
        Ok(patient.clone())
    }

    async fn delete(&self, id: PatientId) -> WebServerResult<Patient> {
        let removed = self
            .state
            .patients
            .write()
            .await
            .remove(&id)
            .ok_or(WebServerError::PatientNotFound(id))?;

        process_info!(ProcessId::current(), "🗑️ Deleted patient {}", id);
        Ok(removed)
    }

    async fn attach_analysis(&self, id: PatientId, analysis_id: Uuid) -> WebServerResult<()> {
        let mut patients = self.state.patients.write().await;
        let patient = patients.get_mut(&id).ok_or(WebServerError::PatientNotFound(id))?;
        if !patient.analyses.contains(&analysis_id) {
            patient.analyses.push(analysis_id);
        }
        Ok(())
    }

    async fn count(&self) -> usize {
        self.state.patients.read().await.len()
    }

    async fn snapshot(&self) -> Vec<Patient> {
        let mut patients: Vec<Patient> = self.state.patients.read().await.values().cloned().collect();
        patients.sort_by_key(|p| p.created_at);
        patients
    }

    async fn restore(&self, patients: Vec<Patient>) -> WebServerResult<()> {
        let mut ids = HashSet::new();
        let mut documents = HashSet::new();
        for patient in &patients {
            if !ids.insert(patient.id) {
                return Err(WebServerError::Snapshot(format!("duplicate patient id {}", patient.id)));
            }
            if !documents.insert(patient.document_id.trim().to_lowercase()) {
                return Err(WebServerError::Snapshot(format!(
                    "duplicate document id {}",
                    patient.document_id
                )));
            }
        }

        let mut current = self.state.patients.write().await;
        *current = patients.into_iter().map(|p| (p.id, p)).collect();
        Ok(())
    }
}
