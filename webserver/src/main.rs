//! WebServer entry point
//!
//! Configuration comes from an optional JSON file, then command line flags
//! (which may also be set through the environment or a `.env` file).

use clap::Parser;
use shared::{ClassifierBackend, ProcessId, logging, process_info};
use std::path::PathBuf;
use tokio::signal;

use webserver::{AppConfig, MailTransportConfig, WebServer, WebServerResult};

#[derive(Parser, Debug)]
#[command(name = "webserver")]
#[command(about = "ColpoVision colposcopy triage web server")]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "COLPO_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "COLPO_HOST")]
    host: Option<String>,

    /// Port for HTTP server (browser connections)
    #[arg(long, env = "COLPO_PORT")]
    port: Option<u16>,

    /// Static files directory
    #[arg(long, env = "COLPO_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "COLPO_LOG_LEVEL")]
    log_level: Option<String>,

    /// Snapshot file used by save/load
    #[arg(long, env = "COLPO_SNAPSHOT")]
    snapshot_path: Option<PathBuf>,

    /// Restore the snapshot at startup if it exists
    #[arg(long)]
    load_snapshot: bool,

    /// Save a snapshot on shutdown
    #[arg(long)]
    autosave: bool,

    /// Seed for the simulated classifier
    #[arg(long, env = "COLPO_SEED")]
    seed: Option<u64>,

    /// Backend used when a request does not pick one (model, simulated)
    #[arg(long, env = "COLPO_BACKEND")]
    default_backend: Option<ClassifierBackend>,

    /// JSON weights for the placeholder network
    #[arg(long, env = "COLPO_WEIGHTS")]
    weights: Option<PathBuf>,

    /// Upload size limit in megabytes
    #[arg(long, env = "COLPO_MAX_UPLOAD_MB")]
    max_upload_mb: Option<usize>,

    /// Sender mailbox for report emails
    #[arg(long, env = "COLPO_MAIL_FROM")]
    mail_from: Option<String>,

    /// Write report emails as .eml files into this directory
    #[arg(long, env = "COLPO_OUTBOX", conflicts_with = "smtp_host")]
    outbox: Option<PathBuf>,

    /// Deliver report emails through this SMTP relay
    #[arg(long, env = "COLPO_SMTP_HOST")]
    smtp_host: Option<String>,

    #[arg(long, env = "COLPO_SMTP_PORT", default_value = "587")]
    smtp_port: u16,

    #[arg(long, env = "COLPO_SMTP_USER")]
    smtp_user: Option<String>,

    #[arg(long, env = "COLPO_SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// Connect without TLS (local relays only)
    #[arg(long)]
    smtp_insecure: bool,
}

impl Args {
    /// Layer the flags that were given over the file or default config
    fn into_config(self) -> WebServerResult<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = dir;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(path) = self.snapshot_path {
            config.snapshot_path = path;
        }
        config.load_snapshot |= self.load_snapshot;
        config.autosave |= self.autosave;
        if self.seed.is_some() {
            config.engine.seed = self.seed;
        }
        if let Some(backend) = self.default_backend {
            config.settings.default_backend = backend;
        }
        if self.weights.is_some() {
            config.engine.weights_path = self.weights;
        }
        if let Some(mb) = self.max_upload_mb {
            config.max_upload_mb = mb;
        }
        if let Some(from) = self.mail_from {
            config.mail.from = from;
        }
        if let Some(dir) = self.outbox {
            config.mail.transport = MailTransportConfig::Outbox { dir };
        }
        if let Some(host) = self.smtp_host {
            config.mail.transport = MailTransportConfig::Smtp {
                host,
                port: self.smtp_port,
                username: self.smtp_user,
                password: self.smtp_password,
                tls: !self.smtp_insecure,
            };
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> WebServerResult<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    ProcessId::init_webserver();

    let config = args.into_config()?;
    logging::init_tracing_with_level(Some(&config.log_level));

    process_info!(
        ProcessId::current(),
        "🌐 WebServer starting on {}:{} (static: {}, backend: {})",
        config.host,
        config.port,
        config.static_dir.display(),
        config.settings.default_backend
    );

    let webserver = WebServer::from_config(config)?;

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => logging::log_shutdown(ProcessId::current(), "Received Ctrl+C signal"),
            Err(err) => logging::log_error(ProcessId::current(), "Signal handling", &err),
        }
    };

    webserver.run(shutdown).await?;

    logging::log_success(ProcessId::current(), "WebServer stopped gracefully");
    Ok(())
}
