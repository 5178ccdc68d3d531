//! Analysis history service implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{WebServerError, WebServerResult};
use crate::state::WebServerState;
use crate::traits::AnalysisStore;
use shared::{AnalysisResult, BatchReport, PatientId, ProcessId, process_debug};

/// Real analysis store backed by `WebServerState`
#[derive(Clone)]
pub struct RealAnalysisStore {
    state: Arc<WebServerState>,
}

impl RealAnalysisStore {
    pub fn new(state: Arc<WebServerState>) -> Self {
        Self { state }
    }

    async fn history_limit(&self) -> usize {
        self.state.settings.read().await.history_limit
    }
}

/// Drop the oldest batches until at most `limit` remain; batches share the history bound
fn evict_batches(batches: &mut HashMap<Uuid, BatchReport>, limit: usize) -> usize {
    let mut evicted = 0;
    while batches.len() > limit {
        let oldest = batches.values().min_by_key(|b| b.created_at).map(|b| b.batch_id);
        match oldest {
            Some(id) => {
                batches.remove(&id);
                evicted += 1;
            }
            None => break,
        }
    }
    evicted
}

#[async_trait]
impl AnalysisStore for RealAnalysisStore {
    async fn insert(&self, result: AnalysisResult) -> usize {
        let limit = self.history_limit().await;
        let evicted = self.state.analyses.write().await.insert(result, limit);
        if evicted > 0 {
            process_debug!(ProcessId::current(), "🧹 History full, evicted {} analyses", evicted);
        }
        evicted
    }

    async fn get(&self, id: Uuid) -> WebServerResult<AnalysisResult> {
        self.state
            .analyses
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(WebServerError::AnalysisNotFound(id))
    }

    async fn recent(&self, limit: usize) -> Vec<AnalysisResult> {
        self.state
            .analyses
            .read()
            .await
            .iter_recent()
            .take(limit)
            .cloned()
            .collect()
    }

    async fn for_patient(&self, patient_id: PatientId) -> Vec<AnalysisResult> {
        self.state
            .analyses
            .read()
            .await
            .iter_recent()
            .filter(|r| r.patient_id == Some(patient_id))
            .cloned()
            .collect()
    }

    async fn detach_patient(&self, patient_id: PatientId) -> usize {
        let mut detached = 0;
        for result in self.state.analyses.write().await.values_mut() {
            if result.patient_id == Some(patient_id) {
                result.patient_id = None;
                detached += 1;
            }
        }
        for report in self.state.batches.write().await.values_mut() {
            for result in report.results.iter_mut() {
                if result.patient_id == Some(patient_id) {
                    result.patient_id = None;
                }
            }
        }
        detached
    }

    async fn set_history_limit(&self, limit: usize) -> usize {
        let evicted = self.state.analyses.write().await.truncate(limit);
        let dropped = evict_batches(&mut *self.state.batches.write().await, limit);
        if dropped > 0 {
            process_debug!(ProcessId::current(), "🧹 History limit lowered, dropped {} batches", dropped);
        }
        evicted
    }

    async fn insert_batch(&self, report: BatchReport) -> usize {
        let limit = self.history_limit().await;
        let mut evicted = 0;
        {
            let mut history = self.state.analyses.write().await;
            for result in &report.results {
                evicted += history.insert(result.clone(), limit);
            }
        }

        let mut batches = self.state.batches.write().await;
        batches.insert(report.batch_id, report);
        evict_batches(&mut batches, limit);
        evicted
    }

    async fn get_batch(&self, batch_id: Uuid) -> WebServerResult<BatchReport> {
        self.state
            .batches
            .read()
            .await
            .get(&batch_id)
            .cloned()
            .ok_or(WebServerError::BatchNotFound(batch_id))
    }

    async fn count(&self) -> usize {
        self.state.analyses.read().await.len()
    }

    async fn snapshot(&self) -> (Vec<AnalysisResult>, Vec<BatchReport>) {
        let analyses = self.state.analyses.read().await.iter_oldest().cloned().collect();
        let mut batches: Vec<BatchReport> = self.state.batches.read().await.values().cloned().collect();
        batches.sort_by_key(|b| b.created_at);
        (analyses, batches)
    }

    async fn restore(&self, analyses: Vec<AnalysisResult>, batches: Vec<BatchReport>) {
        let limit = self.history_limit().await;
        {
            let mut history = self.state.analyses.write().await;
            history.clear();
            for result in analyses {
                history.insert(result, limit);
            }
        }
        let mut current = self.state.batches.write().await;
        *current = batches.into_iter().map(|b| (b.batch_id, b)).collect();
        evict_batches(&mut current, limit);
    }
}
