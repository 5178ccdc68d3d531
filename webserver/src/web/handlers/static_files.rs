//! Static file serving handlers
//!
//! Serve the browser UI with proper caching and content types

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, Response},
};

use crate::error::{WebServerError, WebServerResult};
use crate::webserver_impl::WebServer;

/// Shown when the static directory has no index.html
const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>ColpoVision</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 50px; color: #1f2937; }
        code { background: #f3f4f6; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>ColpoVision</h1>
    <p>The server is running but no frontend was found in the static directory.</p>
    <p>The REST API is available under <code>/api</code>, e.g. <code>GET /api/classes</code>.</p>
</body>
</html>"#;

/// Serve index.html for root path
pub async fn serve_index(State(server): State<WebServer>) -> Html<String> {
    match server.services.static_server.serve_file("index.html").await {
        Ok(response) => Html(String::from_utf8_lossy(&response.content).into_owned()),
        Err(_) => Html(FALLBACK_INDEX.to_string()),
    }
}

/// Serve static files
pub async fn serve_static(State(server): State<WebServer>, Path(path): Path<String>) -> WebServerResult<Response> {
    let file = server.services.static_server.serve_file(&path).await?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type);
    if let Some(cache_control) = file.cache_control {
        response = response.header(header::CACHE_CONTROL, cache_control);
    }

    response
        .body(file.content.into())
        .map_err(|e| WebServerError::internal(format!("Failed to build response: {e}")))
}

