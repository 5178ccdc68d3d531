//! Server configuration
//!
//! Values come from an optional JSON file and are then overridden by command
//! line flags. `RuntimeSettings` is the part that can be changed while the
//! server runs (and is persisted in snapshots).

use analysis::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{WebServerError, WebServerResult};
use shared::{ClassifierBackend, validate_email};

pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_HISTORY_LIMIT: usize = 500;
pub const MAX_HISTORY_LIMIT: usize = 100_000;

/// Settings adjustable through `/api/config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Printed in report headers
    pub clinic_name: String,
    pub default_backend: ClassifierBackend,
    pub enhance_by_default: bool,
    /// Maximum number of analyses kept in memory
    pub history_limit: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            clinic_name: "ColpoVision".to_string(),
            default_backend: ClassifierBackend::Simulated,
            enhance_by_default: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl RuntimeSettings {
    pub fn validate(&self) -> WebServerResult<()> {
        if self.clinic_name.trim().is_empty() {
            return Err(WebServerError::invalid("clinic_name cannot be empty"));
        }
        if self.history_limit == 0 || self.history_limit > MAX_HISTORY_LIMIT {
            return Err(WebServerError::invalid(format!(
                "history_limit must be in 1..={MAX_HISTORY_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Copy with the provided fields replaced
    pub fn merged(&self, update: SettingsUpdate) -> RuntimeSettings {
        RuntimeSettings {
            clinic_name: update
                .clinic_name
                .map(|name| name.trim().to_string())
                .unwrap_or_else(|| self.clinic_name.clone()),
            default_backend: update.default_backend.unwrap_or(self.default_backend),
            enhance_by_default: update.enhance_by_default.unwrap_or(self.enhance_by_default),
            history_limit: update.history_limit.unwrap_or(self.history_limit),
        }
    }
}

/// Body of `PUT /api/config`; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub default_backend: Option<ClassifierBackend>,
    #[serde(default)]
    pub enhance_by_default: Option<bool>,
    #[serde(default)]
    pub history_limit: Option<usize>,
}

/// How report emails leave the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MailTransportConfig {
    /// Write `.eml` files to a directory instead of sending
    Outbox { dir: PathBuf },
    /// Relay through an SMTP server
    Smtp {
        host: String,
        port: u16,
        #[serde(default)]
        username: Option<String>,
        #[serde(default, skip_serializing)]
        password: Option<String>,
        /// STARTTLS, or implicit TLS on port 465
        #[serde(default = "default_true")]
        tls: bool,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub transport: MailTransportConfig,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "ColpoVision <reports@colpovision.local>".to_string(),
            transport: MailTransportConfig::Outbox {
                dir: PathBuf::from("./data/outbox"),
            },
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub log_level: String,
    pub snapshot_path: PathBuf,
    /// Restore the snapshot at startup when the file exists
    pub load_snapshot: bool,
    /// Save a snapshot on graceful shutdown
    pub autosave: bool,
    pub max_upload_mb: usize,
    pub engine: EngineConfig,
    pub mail: MailConfig,
    pub settings: RuntimeSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("./static"),
            log_level: "info".to_string(),
            snapshot_path: PathBuf::from("./data/colpovision-snapshot.json"),
            load_snapshot: false,
            autosave: false,
            max_upload_mb: 25,
            engine: EngineConfig::default(),
            mail: MailConfig::default(),
            settings: RuntimeSettings::default(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file; missing keys take their defaults
    pub fn from_file(path: &Path) -> WebServerResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WebServerError::config(format!("Cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| WebServerError::config(format!("Invalid config {}: {}", path.display(), e)))
    }

    pub fn bind_address(&self) -> WebServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| WebServerError::config(format!("Invalid bind address: {e}")))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn validate(&self) -> WebServerResult<()> {
        self.bind_address()?;
        if self.max_upload_mb == 0 {
            return Err(WebServerError::config("max_upload_mb must be positive"));
        }
        validate_email(extract_address(&self.mail.from))
            .map_err(|_| WebServerError::config(format!("Invalid sender address: {}", self.mail.from)))?;
        if let MailTransportConfig::Smtp { host, port, .. } = &self.mail.transport {
            if host.trim().is_empty() || *port == 0 {
                return Err(WebServerError::config("SMTP host and port are required"));
            }
        }
        self.settings.validate()
    }
}

/// `Name <addr>` or bare `addr`
fn extract_address(mailbox: &str) -> &str {
    match (mailbox.find('<'), mailbox.rfind('>')) {
        (Some(start), Some(end)) if start < end => &mailbox[start + 1..end],
        _ => mailbox,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address().unwrap().port(), DEFAULT_PORT);
        assert_eq!(config.max_upload_bytes(), 25 * 1024 * 1024);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"port": 9000, "settings": {{"clinic_name": "Clinica Sur"}}, "mail": {{"transport": {{"mode": "smtp", "host": "smtp.example.org", "port": 587}}}}}}"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.settings.clinic_name, "Clinica Sur");
        assert_eq!(config.settings.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(matches!(
            config.mail.transport,
            MailTransportConfig::Smtp { tls: true, port: 587, .. }
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(AppConfig::from_file(file.path()), Err(WebServerError::Config(_))));
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = RuntimeSettings::default();
        settings.history_limit = 0;
        assert!(settings.validate().is_err());

        let mut settings = RuntimeSettings::default();
        settings.clinic_name = "  ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_merge_keeps_absent_fields() {
        let current = RuntimeSettings::default();
        let update = SettingsUpdate {
            history_limit: Some(10),
            default_backend: Some(ClassifierBackend::Model),
            ..Default::default()
        };
        let merged = current.merged(update);
        assert_eq!(merged.history_limit, 10);
        assert_eq!(merged.default_backend, ClassifierBackend::Model);
        assert_eq!(merged.clinic_name, current.clinic_name);
        assert!(merged.enhance_by_default);
    }

    #[test]
    fn test_sender_address_extraction() {
        assert_eq!(extract_address("Clinic <a@b.org>"), "a@b.org");
        assert_eq!(extract_address("a@b.org"), "a@b.org");

        let mut config = AppConfig::default();
        config.mail.from = "nobody".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_smtp_password_never_serialized() {
        let mut config = AppConfig::default();
        config.mail.transport = MailTransportConfig::Smtp {
            host: "smtp.example.org".to_string(),
            port: 465,
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            tls: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
