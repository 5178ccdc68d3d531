//! Static file serving service
//!
//! Serves the browser UI with proper caching and content types

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{WebServerError, WebServerResult};
use crate::traits::{StaticFileResponse, StaticFileServer};
use shared::{ProcessId, process_debug, process_error, process_warn};

/// Real static file server implementation
#[derive(Clone)]
pub struct RealStaticFileServer {
    /// Base directory for static files
    base_dir: PathBuf,

    /// MIME type mappings
    mime_types: HashMap<&'static str, &'static str>,
}

impl RealStaticFileServer {
    /// Create new static file server
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        let mime_types = HashMap::from([
            ("html", "text/html; charset=utf-8"),
            ("css", "text/css"),
            ("js", "application/javascript"),
            ("json", "application/json"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("svg", "image/svg+xml"),
            ("ico", "image/x-icon"),
            ("woff2", "font/woff2"),
        ]);

        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            mime_types,
        }
    }

    fn extension(path: &str) -> Option<String> {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Get MIME type from file extension
    fn get_mime_type(&self, path: &str) -> String {
        Self::extension(path)
            .and_then(|ext| self.mime_types.get(ext.as_str()).copied())
            .unwrap_or("application/octet-stream")
            .to_string()
    }

    /// Get cache control header based on file type
    fn get_cache_control(&self, path: &str) -> Option<String> {
        let max_age = match Self::extension(path)?.as_str() {
            "html" => return Some("no-cache".to_string()),
            "js" | "css" => 3600,
            "png" | "jpg" | "jpeg" | "svg" | "ico" => 86400,
            "woff2" => 604800,
            _ => return None,
        };
        Some(format!("public, max-age={max_age}"))
    }

    /// Resolve file path and prevent directory traversal
    fn resolve_path(&self, request_path: &str) -> WebServerResult<PathBuf> {
        let clean_path = request_path.trim_start_matches('/');
        let file_path = if clean_path.is_empty() { "index.html" } else { clean_path };

        let canonical_path = self
            .base_dir
            .join(file_path)
            .canonicalize()
            .map_err(|_| WebServerError::FileNotFound(request_path.to_string()))?;

        let canonical_base = self.base_dir.canonicalize().map_err(|e| {
            process_error!(ProcessId::current(), "Failed to canonicalize static directory: {}", e);
            WebServerError::internal("Static file base directory not accessible")
        })?;

        if !canonical_path.starts_with(&canonical_base) {
            return Err(WebServerError::AccessDenied(request_path.to_string()));
        }

        Ok(canonical_path)
    }
}

#[async_trait]
impl StaticFileServer for RealStaticFileServer {
    async fn serve_file(&self, path: &str) -> WebServerResult<StaticFileResponse> {
        let mut file_path = self.resolve_path(path)?;
        let mut served_name = path.to_string();

        if file_path.is_dir() {
            file_path = file_path.join("index.html");
            served_name = "index.html".to_string();
            if !file_path.exists() {
                return Err(WebServerError::AccessDenied("Directory listing not allowed".to_string()));
            }
        }

        match fs::read(&file_path).await {
            Ok(content) => {
                process_debug!(ProcessId::current(), "📄 Served static file: {} ({} bytes)", path, content.len());

                let mut response = StaticFileResponse::new(content, self.get_mime_type(&served_name));
                if let Some(cache) = self.get_cache_control(&served_name) {
                    response = response.with_cache_control(cache);
                }
                Ok(response)
            }
            Err(e) => {
                process_warn!(ProcessId::current(), "❌ Failed to read static file {}: {}", path, e);
                Err(WebServerError::FileNotFound(path.to_string()))
            }
        }
    }

    async fn file_exists(&self, path: &str) -> bool {
        match self.resolve_path(path) {
            Ok(file_path) => file_path.is_file(),
            Err(_) => false,
        }
    }
}

impl Default for RealStaticFileServer {
    fn default() -> Self {
        Self::new("./static")
    }
}
