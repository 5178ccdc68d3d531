//! Handlers over mocked mail and snapshot services

mod helpers;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use fixtures::*;
use helpers::*;
use webserver::WebServerError;
use webserver::traits::{MockReportMailer, MockSnapshotStore};
use webserver::types::SnapshotSummary;

async fn analyse_one(test: &TestServer) -> String {
    let form = MultipartBody::new().file("file", "cervix.png", &sample_png());
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
    body["analysis"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_mail_failure_is_bad_gateway() {
    let test = TestServer::with_services(|services| {
        let mut mailer = MockReportMailer::new();
        mailer.expect_transport_name().return_const("smtp");
        mailer
            .expect_send_report()
            .withf(|report| {
                report.recipient == "doctor@example.org"
                    && report.attachment_name.ends_with(".pdf")
                    && report.pdf.starts_with(b"%PDF")
                    && report.subject.starts_with("Colposcopy analysis report")
            })
            .times(1)
            .returning(|_| Err(WebServerError::MailDelivery("relay refused".to_string())));
        services.mailer = Arc::new(mailer);
    });

    let id = analyse_one(&test).await;
    let body = expect_json(
        test.json(
            Method::POST,
            &format!("/api/analyses/{id}/email"),
            json!({ "to": "doctor@example.org" }),
        )
        .await,
        StatusCode::BAD_GATEWAY,
    )
    .await;
    assert!(body["message"].as_str().unwrap().contains("relay refused"));
}

#[tokio::test]
async fn test_missing_recipient_never_reaches_mailer() {
    let test = TestServer::with_services(|services| {
        let mut mailer = MockReportMailer::new();
        mailer.expect_transport_name().return_const("outbox");
        mailer.expect_send_report().times(0);
        services.mailer = Arc::new(mailer);
    });

    let id = analyse_one(&test).await;
    expect_json(
        test.json(Method::POST, &format!("/api/analyses/{id}/email"), json!({})).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn test_custom_subject_and_message_are_passed_through() {
    let test = TestServer::with_services(|services| {
        let mut mailer = MockReportMailer::new();
        mailer.expect_transport_name().return_const("outbox");
        mailer
            .expect_send_report()
            .withf(|report| report.subject == "Results" && report.body == "See attached.")
            .times(1)
            .returning(|report| {
                Ok(webserver::types::DeliveryReceipt {
                    recipient: report.recipient,
                    transport: "outbox".to_string(),
                    reference: "mock.eml".to_string(),
                    delivered_at: Utc::now(),
                })
            });
        services.mailer = Arc::new(mailer);
    });

    let id = analyse_one(&test).await;
    let body = expect_json(
        test.json(
            Method::POST,
            &format!("/api/analyses/{id}/email"),
            json!({ "to": "doctor@example.org", "subject": "Results", "message": "See attached." }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["delivery"]["reference"], "mock.eml");
}

#[tokio::test]
async fn test_save_snapshot_captures_state() {
    let test = TestServer::with_services(|services| {
        let mut snapshots = MockSnapshotStore::new();
        snapshots.expect_location().return_const("memory".to_string());
        snapshots
            .expect_save()
            .withf(|snapshot| snapshot.version == 1 && snapshot.analyses.len() == 1 && snapshot.patients.is_empty())
            .times(1)
            .returning(|snapshot| Ok(SnapshotSummary::of(&snapshot, "memory")));
        services.snapshots = Arc::new(snapshots);
    });

    analyse_one(&test).await;
    let body = expect_json(test.post_empty("/api/snapshot/save").await, StatusCode::OK).await;
    assert_eq!(body["snapshot"]["path"], "memory");
    assert_eq!(body["snapshot"]["analyses"], 1);
}

#[tokio::test]
async fn test_failed_snapshot_load_is_reported() {
    let test = TestServer::with_services(|services| {
        let mut snapshots = MockSnapshotStore::new();
        snapshots.expect_location().return_const("memory".to_string());
        snapshots
            .expect_load()
            .times(1)
            .returning(|| Err(WebServerError::Snapshot("unsupported version 9".to_string())));
        services.snapshots = Arc::new(snapshots);
    });

    let body = expect_json(
        test.post_empty("/api/snapshot/load").await,
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .await;
    assert!(body["message"].as_str().unwrap().contains("unsupported version 9"));
}
