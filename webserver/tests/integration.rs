//! Integration tests for webserver
//!
//! Drive the full router with real services over temporary directories.

mod helpers;

use axum::http::{Method, StatusCode, header};
use serde_json::json;

use fixtures::*;
use helpers::*;
use webserver::types::ServerEvent;

#[tokio::test]
async fn test_health_and_status() {
    let test = TestServer::new();

    let health = expect_json(test.get("/health").await, StatusCode::OK).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["connections"], 0);

    let status = expect_json(test.get("/api/status").await, StatusCode::OK).await;
    assert_eq!(status["data"]["stored_analyses"], 0);
    assert_eq!(status["data"]["mail_transport"], "outbox");
    assert_eq!(status["data"]["default_backend"], "simulated");
}

#[tokio::test]
async fn test_classes_carry_disclaimer() {
    let test = TestServer::new();

    let body = expect_json(test.get("/api/classes").await, StatusCode::OK).await;
    let classes = body["classes"].as_array().unwrap();
    assert_eq!(classes.len(), 5);
    assert_eq!(classes[0]["id"], "normal");
    assert_eq!(classes[4]["risk_level"], "high");
    assert!(!body["disclaimer"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_analyze_stores_result() {
    let test = TestServer::new();

    let form = MultipartBody::new()
        .file("file", "cervix.png", &sample_png())
        .text("enhance", "true");
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;

    let analysis = &body["analysis"];
    assert_eq!(body["status"], "success");
    assert_eq!(analysis["file_name"], "cervix.png");
    assert_eq!(analysis["enhanced"], true);
    assert_eq!(analysis["image"]["format"], "PNG");
    assert_eq!(analysis["image"]["width"], 48);
    let sum: f64 = analysis["probabilities"]["values"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_f64().unwrap())
        .sum();
    assert!((sum - 1.0).abs() < 1e-6);

    let id = analysis["id"].as_str().unwrap();
    let fetched = expect_json(test.get(&format!("/api/analyses/{id}")).await, StatusCode::OK).await;
    assert_eq!(fetched["id"], analysis["id"]);

    let history = expect_json(test.get("/api/analyses").await, StatusCode::OK).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(test.server.state().get_analyses_performed(), 1);
}

#[tokio::test]
async fn test_analyze_with_model_backend() {
    let test = TestServer::new();

    let form = MultipartBody::new()
        .file("file", "cervix.png", &sample_png())
        .text("backend", "model")
        .text("enhance", "off");
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
    assert_eq!(body["analysis"]["backend"], "model");
    assert_eq!(body["analysis"]["enhanced"], false);
}

#[tokio::test]
async fn test_analyze_rejects_bad_input() {
    let test = TestServer::new();

    let form = MultipartBody::new().file("file", "notes.txt", &not_an_image());
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["status"], "error");

    let form = MultipartBody::new().text("enhance", "true");
    expect_json(test.upload("/api/analyze", form).await, StatusCode::BAD_REQUEST).await;

    let form = MultipartBody::new()
        .file("file", "cervix.png", &sample_png())
        .text("backend", "oracle");
    expect_json(test.upload("/api/analyze", form).await, StatusCode::BAD_REQUEST).await;

    // Nothing was stored
    let history = expect_json(test.get("/api/analyses").await, StatusCode::OK).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_analyze_unknown_patient_is_not_found() {
    let test = TestServer::new();

    let form = MultipartBody::new()
        .file("file", "cervix.png", &sample_png())
        .text("patient_id", "5f0c6a3e-8f7b-4c47-9a39-0d8f4c1b2a10");
    expect_json(test.upload("/api/analyze", form).await, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let test = TestServer::with_config(|config| config.max_upload_mb = 1);

    let big = vec![0u8; 2 * 1024 * 1024];
    let form = MultipartBody::new().file("file", "huge.png", &big);
    let response = test.upload("/api/analyze", form).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_invalid_and_unknown_ids() {
    let test = TestServer::new();

    expect_json(test.get("/api/analyses/not-a-uuid").await, StatusCode::BAD_REQUEST).await;
    expect_json(
        test.get("/api/analyses/5f0c6a3e-8f7b-4c47-9a39-0d8f4c1b2a10").await,
        StatusCode::NOT_FOUND,
    )
    .await;
    expect_json(
        test.get("/api/batches/5f0c6a3e-8f7b-4c47-9a39-0d8f4c1b2a10").await,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn test_batch_reports_failures_per_file() {
    let test = TestServer::new();

    let form = MultipartBody::new()
        .file("files", "a.png", &sample_png())
        .file("files", "broken.png", &not_an_image())
        .file("files", "b.png", &sample_png());
    let body = expect_json(test.upload("/api/analyze/batch", form).await, StatusCode::OK).await;

    let batch = &body["batch"];
    assert_eq!(batch["results"].as_array().unwrap().len(), 2);
    assert_eq!(batch["failures"].as_array().unwrap().len(), 1);
    assert_eq!(batch["failures"][0]["file_name"], "broken.png");

    let batch_id = batch["batch_id"].as_str().unwrap();
    let stored = expect_json(test.get(&format!("/api/batches/{batch_id}")).await, StatusCode::OK).await;
    assert_eq!(stored["batch_id"], batch["batch_id"]);

    let pdf = test.get(&format!("/api/batches/{batch_id}/report.pdf")).await;
    assert_eq!(pdf.status(), StatusCode::OK);
    assert!(body_bytes(pdf).await.starts_with(b"%PDF"));

    let history = expect_json(test.get("/api/analyses").await, StatusCode::OK).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_batch_progress_is_broadcast() {
    let test = TestServer::new();
    let mut events = test.server.state().client_broadcast.subscribe();

    let form = MultipartBody::new()
        .file("files", "a.png", &sample_png())
        .file("files", "broken.png", &not_an_image())
        .file("files", "b.png", &sample_png());
    let body = expect_json(test.upload("/api/analyze/batch", form).await, StatusCode::OK).await;

    let mut progress = Vec::new();
    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        match event {
            ServerEvent::BatchProgress { done, total } => progress.push((done, total)),
            ServerEvent::BatchCompleted { batch_id, analysed, failed } => completed = Some((batch_id, analysed, failed)),
            _ => {}
        }
    }
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

    let (batch_id, analysed, failed) = completed.unwrap();
    assert_eq!(batch_id.to_string(), body["batch"]["batch_id"].as_str().unwrap());
    assert_eq!((analysed, failed), (2, 1));
}

#[tokio::test]
async fn test_lowering_history_limit_drops_old_batches() {
    let test = TestServer::new();

    let mut batch_ids = Vec::new();
    for i in 0..3 {
        let form = MultipartBody::new().file("files", &format!("img{i}.png"), &sample_png());
        let body = expect_json(test.upload("/api/analyze/batch", form).await, StatusCode::OK).await;
        batch_ids.push(body["batch"]["batch_id"].as_str().unwrap().to_string());
    }

    expect_json(
        test.json(Method::PUT, "/api/config", json!({ "history_limit": 1 })).await,
        StatusCode::OK,
    )
    .await;

    let history = expect_json(test.get("/api/analyses").await, StatusCode::OK).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    for old in &batch_ids[..2] {
        expect_json(test.get(&format!("/api/batches/{old}")).await, StatusCode::NOT_FOUND).await;
    }
    expect_json(test.get(&format!("/api/batches/{}", batch_ids[2])).await, StatusCode::OK).await;
}

#[tokio::test]
async fn test_malformed_json_and_query_use_error_body() {
    let test = TestServer::new();

    let mut patient = patient_json("Ana Ruiz", "X-9");
    patient["age"] = json!(300);
    let body = expect_json(test.json(Method::POST, "/api/patients", patient).await, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("Invalid JSON body"));

    let response = test.get("/api/analyses?limit=abc").await;
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "application/json"
    );
    let body = expect_json(response, StatusCode::BAD_REQUEST).await;
    assert!(body["message"].as_str().unwrap().contains("Invalid query string"));

    let plain = test
        .send(
            axum::http::Request::builder()
                .method(Method::PUT)
                .uri("/api/config")
                .body(axum::body::Body::from("{}"))
                .unwrap(),
        )
        .await;
    let body = expect_json(plain, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["status"], "error");

    let not_multipart = test.json(Method::POST, "/api/analyze", json!({ "file": "x" })).await;
    let body = expect_json(not_multipart, StatusCode::BAD_REQUEST).await;
    assert!(body["message"].as_str().unwrap().contains("multipart"));
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let test = TestServer::new();
    let form = MultipartBody::new().text("backend", "simulated");
    expect_json(test.upload("/api/analyze/batch", form).await, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
async fn test_compare_stores_both_results() {
    let test = TestServer::new();

    let form = MultipartBody::new().file("file", "cervix.png", &sample_png());
    let body = expect_json(test.upload("/api/analyze/compare", form).await, StatusCode::OK).await;

    let comparison = &body["comparison"];
    assert_eq!(comparison["original"]["enhanced"], false);
    assert_eq!(comparison["enhanced"]["enhanced"], true);
    let agree = comparison["original"]["predicted"] == comparison["enhanced"]["predicted"];
    assert_eq!(comparison["agreement"], agree);

    let history = expect_json(test.get("/api/analyses").await, StatusCode::OK).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_filters_return_every_variant() {
    let test = TestServer::new();

    let form = MultipartBody::new().file("file", "cervix.png", &sample_png());
    let body = expect_json(test.upload("/api/filters", form).await, StatusCode::OK).await;

    let variants = body["variants"].as_array().unwrap();
    assert_eq!(variants.len(), analysis::FilterKind::ALL.len());
    for variant in variants {
        assert!(!variant["png_base64"].as_str().unwrap().is_empty());
        assert!(!variant["caption"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_pdf_report_download() {
    let test = TestServer::new();

    let form = MultipartBody::new().file("file", "cervix.png", &sample_png());
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
    let id = body["analysis"]["id"].as_str().unwrap().to_string();

    let response = test.get(&format!("/api/analyses/{id}/report.pdf")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"colpovision-report-"));
    assert!(body_bytes(response).await.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_email_report_to_outbox() {
    let test = TestServer::new();

    let form = MultipartBody::new().file("file", "cervix.png", &sample_png());
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
    let id = body["analysis"]["id"].as_str().unwrap().to_string();

    // Anonymous analysis and no explicit recipient
    expect_json(
        test.json(Method::POST, &format!("/api/analyses/{id}/email"), json!({})).await,
        StatusCode::BAD_REQUEST,
    )
    .await;

    let body = expect_json(
        test.json(
            Method::POST,
            &format!("/api/analyses/{id}/email"),
            json!({ "to": "doctor@example.org" }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["delivery"]["recipient"], "doctor@example.org");
    assert_eq!(body["delivery"]["transport"], "outbox");

    let written: Vec<_> = std::fs::read_dir(test.outbox()).unwrap().collect();
    assert_eq!(written.len(), 1);
}

#[tokio::test]
async fn test_email_defaults_to_patient_address() {
    let test = TestServer::new();

    let patient = expect_json(
        test.json(Method::POST, "/api/patients", patient_json("Ana Ruiz", "DOC-1")).await,
        StatusCode::CREATED,
    )
    .await;
    let patient_id = patient["id"].as_str().unwrap();

    let form = MultipartBody::new()
        .file("file", "cervix.png", &sample_png())
        .text("patient_id", patient_id);
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
    let id = body["analysis"]["id"].as_str().unwrap().to_string();

    let body = expect_json(
        test.json(Method::POST, &format!("/api/analyses/{id}/email"), json!({})).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["delivery"]["recipient"], "patient@example.org");
}

#[tokio::test]
async fn test_static_files() {
    let test = TestServer::new();

    // No frontend yet: built-in page
    let response = test.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("ColpoVision"));

    std::fs::create_dir_all(test.dir.path().join("static")).unwrap();
    std::fs::write(test.dir.path().join("static/index.html"), "<h1>custom ui</h1>").unwrap();
    std::fs::write(test.dir.path().join("static/app.js"), "console.log(1)").unwrap();

    let html = String::from_utf8(body_bytes(test.get("/").await).await).unwrap();
    assert_eq!(html, "<h1>custom ui</h1>");

    let response = test.get("/static/app.js").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/javascript");

    expect_json(test.get("/static/missing.css").await, StatusCode::NOT_FOUND).await;
}

#[test]
fn test_bundled_ui_escapes_server_strings() {
    let script = include_str!("../../static/app.js");
    assert!(script.contains("function escapeHtml"));
    for field in ["file_name", "full_name", "document_id", "recommendation", "predicted"] {
        for owner in ["a", "p", "result"] {
            let raw = format!("${{{owner}.{field}}}");
            assert!(!script.contains(&raw), "unescaped {raw} in app.js");
        }
    }
}
