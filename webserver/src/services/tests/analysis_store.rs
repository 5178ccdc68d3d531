//! Tests for the AnalysisStore service

use super::fixtures::*;
use super::helpers::*;
use crate::config::RuntimeSettings;
use crate::error::WebServerError;
use crate::services::RealAnalysisStore;
use crate::traits::AnalysisStore;
use chrono::{Duration, Utc};
use shared::{BatchReport, ClassifierBackend, PatientId};
use uuid::Uuid;

mod real_analysis_store_tests {
    use super::*;

    /// Single-result batch created `age_minutes` ago
    fn aged_batch(name: &str, age_minutes: i64) -> BatchReport {
        let mut report = BatchReport::new(
            Uuid::new_v4(),
            ClassifierBackend::Simulated,
            vec![analysis_result(name, 0, None)],
            Vec::new(),
        );
        report.created_at = Utc::now() - Duration::minutes(age_minutes);
        report
    }

    fn limited(limit: usize) -> RealAnalysisStore {
        RealAnalysisStore::new(create_test_state_with_settings(RuntimeSettings {
            history_limit: limit,
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = RealAnalysisStore::new(create_test_state());
        let result = analysis_result("a.png", 0, None);
        let id = result.id;

        assert_eq!(store.insert(result.clone()).await, 0);
        assert_eq!(store.get(id).await.unwrap(), result);
        assert!(matches!(
            store.get(Uuid::new_v4()).await,
            Err(WebServerError::AnalysisNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_limit_evicts_oldest() {
        let store = limited(2);
        let first = analysis_result("first.png", 0, None);
        let first_id = first.id;
        store.insert(first).await;
        store.insert(analysis_result("second.png", 1, None)).await;
        assert_eq!(store.insert(analysis_result("third.png", 2, None)).await, 1);

        assert_eq!(store.count().await, 2);
        assert!(store.get(first_id).await.is_err());
        let recent: Vec<_> = store.recent(10).await.into_iter().map(|r| r.file_name).collect();
        assert_eq!(recent, vec!["third.png", "second.png"]);
        assert_eq!(store.recent(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_lowering_limit_truncates() {
        let store = RealAnalysisStore::new(create_test_state());
        for i in 0..5 {
            store.insert(analysis_result(&format!("{i}.png"), 0, None)).await;
        }
        assert_eq!(store.set_history_limit(3).await, 2);
        assert_eq!(store.count().await, 3);
        assert_eq!(store.recent(1).await[0].file_name, "4.png");
    }

    #[tokio::test]
    async fn test_for_patient_and_detach() {
        let store = RealAnalysisStore::new(create_test_state());
        let patient = PatientId::new();
        store.insert(analysis_result("mine-1.png", 0, Some(patient))).await;
        store.insert(analysis_result("other.png", 0, Some(PatientId::new()))).await;
        store.insert(analysis_result("mine-2.png", 3, Some(patient))).await;

        let mine: Vec<_> = store.for_patient(patient).await.into_iter().map(|r| r.file_name).collect();
        assert_eq!(mine, vec!["mine-2.png", "mine-1.png"]);

        assert_eq!(store.detach_patient(patient).await, 2);
        assert!(store.for_patient(patient).await.is_empty());
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn test_batches_are_stored_with_their_results() {
        let store = RealAnalysisStore::new(create_test_state());
        let results = vec![analysis_result("b1.png", 0, None), analysis_result("b2.png", 4, None)];
        let first_id = results[0].id;
        let report = BatchReport::new(Uuid::new_v4(), ClassifierBackend::Simulated, results, Vec::new());
        let batch_id = report.batch_id;

        store.insert_batch(report).await;
        assert_eq!(store.count().await, 2);
        assert!(store.get(first_id).await.is_ok());
        assert_eq!(store.get_batch(batch_id).await.unwrap().results.len(), 2);
        assert!(matches!(
            store.get_batch(Uuid::new_v4()).await,
            Err(WebServerError::BatchNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_preserves_order() {
        let store = RealAnalysisStore::new(create_test_state());
        for name in ["one.png", "two.png", "three.png"] {
            store.insert(analysis_result(name, 1, None)).await;
        }
        let (analyses, batches) = store.snapshot().await;
        assert!(batches.is_empty());

        let restored = RealAnalysisStore::new(create_test_state());
        restored.insert(analysis_result("stale.png", 0, None)).await;
        restored.restore(analyses, batches).await;

        let names: Vec<_> = restored.recent(10).await.into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, vec!["three.png", "two.png", "one.png"]);
    }

    #[tokio::test]
    async fn test_lowering_limit_drops_oldest_batches() {
        let store = RealAnalysisStore::new(create_test_state());
        let old = aged_batch("old.png", 30);
        let middle = aged_batch("middle.png", 20);
        let new = aged_batch("new.png", 10);
        let ids = [old.batch_id, middle.batch_id, new.batch_id];
        for report in [old, middle, new] {
            store.insert_batch(report).await;
        }

        store.set_history_limit(1).await;
        assert_eq!(store.count().await, 1);
        assert!(store.get_batch(ids[0]).await.is_err());
        assert!(store.get_batch(ids[1]).await.is_err());
        assert!(store.get_batch(ids[2]).await.is_ok());
    }

    #[tokio::test]
    async fn test_restore_bounds_batches() {
        let store = limited(2);
        let batches = vec![aged_batch("a.png", 30), aged_batch("b.png", 20), aged_batch("c.png", 10)];
        let oldest = batches[0].batch_id;
        let newest = batches[2].batch_id;

        store.restore(Vec::new(), batches).await;
        let (_, kept) = store.snapshot().await;
        assert_eq!(kept.len(), 2);
        assert!(store.get_batch(oldest).await.is_err());
        assert!(store.get_batch(newest).await.is_ok());
    }
}
