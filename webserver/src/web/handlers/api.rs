//! REST API handlers
//!
//! Health, status, class catalogue, runtime configuration and snapshots

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde_json::{Value, json};

use crate::config::{MailTransportConfig, SettingsUpdate};
use crate::error::WebServerResult;
use crate::web::extract::ApiJson;
use crate::webserver_impl::WebServer;
use shared::{DISCLAIMER, DiagnosticClass, ProcessId, process_info, recommendation};

/// GET /health
pub async fn health_check(State(server): State<WebServer>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().timestamp(),
        "uptime": server.state.get_uptime_seconds(),
        "connections": server.state.get_connection_count()
    }))
}

/// GET /api/status
pub async fn get_status(State(server): State<WebServer>) -> Json<Value> {
    let settings = server.state.settings().await;

    Json(json!({
        "status": "ok",
        "data": {
            "server_status": if server.state.is_running() { "running" } else { "stopping" },
            "uptime_seconds": server.state.get_uptime_seconds(),
            "connected_clients": server.services.broadcaster.client_count(),
            "patients": server.services.patients.count().await,
            "stored_analyses": server.services.analyses.count().await,
            "analyses_performed": server.state.get_analyses_performed(),
            "default_backend": settings.default_backend,
            "enhance_by_default": settings.enhance_by_default,
            "mail_transport": server.services.mailer.transport_name(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

/// GET /api/classes
pub async fn get_classes() -> Json<Value> {
    let classes: Vec<Value> = DiagnosticClass::ALL
        .iter()
        .map(|class| {
            json!({
                "id": class.id(),
                "index": class.index(),
                "label": class.label(),
                "risk_level": class.risk_level(),
                "recommendation": recommendation(*class),
            })
        })
        .collect();

    Json(json!({
        "classes": classes,
        "disclaimer": DISCLAIMER,
    }))
}

fn config_view(server: &WebServer, settings: &crate::config::RuntimeSettings) -> Value {
    let config = server.config();
    let mail = match &config.mail.transport {
        MailTransportConfig::Outbox { dir } => json!({ "mode": "outbox", "dir": dir }),
        MailTransportConfig::Smtp { host, port, tls, .. } => {
            json!({ "mode": "smtp", "host": host, "port": port, "tls": tls })
        }
    };

    json!({
        "settings": settings,
        "server": {
            "max_upload_mb": config.max_upload_mb,
            "snapshot_path": config.snapshot_path,
            "autosave": config.autosave,
            "input_size": config.engine.input_size,
            "mail": mail,
        }
    })
}

/// GET /api/config
pub async fn get_config(State(server): State<WebServer>) -> Json<Value> {
    let settings = server.state.settings().await;
    Json(config_view(&server, &settings))
}

/// PUT /api/config
pub async fn update_config(
    State(server): State<WebServer>,
    ApiJson(update): ApiJson<SettingsUpdate>,
) -> WebServerResult<Json<Value>> {
    let settings = server.update_settings(update).await?;
    process_info!(ProcessId::current(), "⚙️ Runtime settings updated: {:?}", settings);
    Ok(Json(config_view(&server, &settings)))
}

/// POST /api/snapshot/save
pub async fn save_snapshot(State(server): State<WebServer>) -> WebServerResult<Json<Value>> {
    let summary = server.save_snapshot().await?;
    Ok(Json(json!({ "status": "success", "snapshot": summary })))
}

/// POST /api/snapshot/load
pub async fn load_snapshot(State(server): State<WebServer>) -> WebServerResult<Json<Value>> {
    let summary = server.load_snapshot().await?;
    Ok(Json(json!({ "status": "success", "snapshot": summary })))
}
