//! Runtime configuration and snapshot persistence

mod helpers;

use axum::http::{Method, StatusCode};
use serde_json::json;

use fixtures::*;
use helpers::*;

#[tokio::test]
async fn test_config_roundtrip() {
    let test = TestServer::new();

    let config = expect_json(test.get("/api/config").await, StatusCode::OK).await;
    assert_eq!(config["settings"]["clinic_name"], "ColpoVision");
    assert_eq!(config["server"]["mail"]["mode"], "outbox");

    let updated = expect_json(
        test.json(
            Method::PUT,
            "/api/config",
            json!({ "clinic_name": "Clinica Norte", "default_backend": "model" }),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["settings"]["clinic_name"], "Clinica Norte");
    assert_eq!(updated["settings"]["default_backend"], "model");
    assert_eq!(updated["settings"]["enhance_by_default"], true);

    // New default applies to requests that do not pick a backend
    let form = MultipartBody::new().file("file", "cervix.png", &sample_png());
    let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
    assert_eq!(body["analysis"]["backend"], "model");

    expect_json(
        test.json(Method::PUT, "/api/config", json!({ "history_limit": 0 })).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn test_concurrent_partial_updates_both_apply() {
    let test = TestServer::new();
    let server = test.server.clone();

    let name = webserver::SettingsUpdate {
        clinic_name: Some("Clinica Sur".to_string()),
        ..Default::default()
    };
    let enhance = webserver::SettingsUpdate {
        enhance_by_default: Some(false),
        ..Default::default()
    };
    let (a, b) = tokio::join!(server.update_settings(name), server.update_settings(enhance));
    a.unwrap();
    b.unwrap();

    let config = expect_json(test.get("/api/config").await, StatusCode::OK).await;
    assert_eq!(config["settings"]["clinic_name"], "Clinica Sur");
    assert_eq!(config["settings"]["enhance_by_default"], false);
}

#[tokio::test]
async fn test_smtp_password_is_not_exposed() {
    let test = TestServer::with_config(|config| {
        config.mail.transport = webserver::MailTransportConfig::Smtp {
            host: "smtp.example.org".to_string(),
            port: 587,
            username: Some("reports".to_string()),
            password: Some("hunter2".to_string()),
            tls: false,
        };
    });

    let body = expect_json(test.get("/api/config").await, StatusCode::OK).await;
    assert_eq!(body["server"]["mail"]["mode"], "smtp");
    assert!(!body.to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_history_limit_evicts_oldest() {
    let test = TestServer::new();

    let mut ids = Vec::new();
    for i in 0..3 {
        let form = MultipartBody::new().file("file", &format!("img{i}.png"), &sample_png());
        let body = expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
        ids.push(body["analysis"]["id"].as_str().unwrap().to_string());
    }

    expect_json(
        test.json(Method::PUT, "/api/config", json!({ "history_limit": 2 })).await,
        StatusCode::OK,
    )
    .await;

    let history = expect_json(test.get("/api/analyses").await, StatusCode::OK).await;
    let kept: Vec<&str> = history.as_array().unwrap().iter().map(|a| a["id"].as_str().unwrap()).collect();
    assert_eq!(kept, vec![ids[2].as_str(), ids[1].as_str()]);
    expect_json(test.get(&format!("/api/analyses/{}", ids[0])).await, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn test_snapshot_save_and_restore_in_new_server() {
    let test = TestServer::new();

    let patient = expect_json(
        test.json(Method::POST, "/api/patients", patient_json("Elena Vidal", "E-77")).await,
        StatusCode::CREATED,
    )
    .await;
    let form = MultipartBody::new()
        .file("file", "cervix.png", &sample_png())
        .text("patient_id", patient["id"].as_str().unwrap());
    expect_json(test.upload("/api/analyze", form).await, StatusCode::OK).await;
    expect_json(
        test.json(Method::PUT, "/api/config", json!({ "clinic_name": "Clinica Este" })).await,
        StatusCode::OK,
    )
    .await;

    let saved = expect_json(test.post_empty("/api/snapshot/save").await, StatusCode::OK).await;
    assert_eq!(saved["snapshot"]["patients"], 1);
    assert_eq!(saved["snapshot"]["analyses"], 1);

    // Fresh process over the same directory
    let TestServer { server, dir, .. } = test;
    let config = server.config().clone();
    drop(server);
    let restarted = TestServer::from_parts(config, dir);

    let empty = expect_json(restarted.get("/api/patients").await, StatusCode::OK).await;
    assert!(empty.as_array().unwrap().is_empty());

    let loaded = expect_json(restarted.post_empty("/api/snapshot/load").await, StatusCode::OK).await;
    assert_eq!(loaded["snapshot"]["analyses"], 1);

    let patients = expect_json(restarted.get("/api/patients").await, StatusCode::OK).await;
    assert_eq!(patients[0]["document_id"], "E-77");
    assert_eq!(patients[0]["analyses"].as_array().unwrap().len(), 1);

    let config = expect_json(restarted.get("/api/config").await, StatusCode::OK).await;
    assert_eq!(config["settings"]["clinic_name"], "Clinica Este");

    // Duplicate document ids still conflict after a restore
    expect_json(
        restarted.json(Method::POST, "/api/patients", patient_json("Other", "e-77")).await,
        StatusCode::CONFLICT,
    )
    .await;
}

#[tokio::test]
async fn test_load_without_snapshot_is_not_found() {
    let test = TestServer::new();
    expect_json(test.post_empty("/api/snapshot/load").await, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn test_corrupt_snapshot_keeps_state() {
    let test = TestServer::new();
    expect_json(
        test.json(Method::POST, "/api/patients", patient_json("Marta Gil", "M-1")).await,
        StatusCode::CREATED,
    )
    .await;

    std::fs::write(test.dir.path().join("snapshot.json"), "{ not json").unwrap();
    let response = test.post_empty("/api/snapshot/load").await;
    assert!(response.status().is_server_error());

    let patients = expect_json(test.get("/api/patients").await, StatusCode::OK).await;
    assert_eq!(patients.as_array().unwrap().len(), 1);
}
