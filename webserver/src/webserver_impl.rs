//! Main webserver implementation
//!
//! `WebServer` owns the shared state, the analysis engine and every service,
//! and is handed to axum as router state.

use analysis::AnalysisEngine;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::{AppConfig, RuntimeSettings, SettingsUpdate};
use crate::error::{WebServerError, WebServerResult};
use crate::services::{
    FileSnapshotStore, RealAnalysisStore, RealClientBroadcaster, RealPatientRegistry, RealStaticFileServer,
    mailer_from_config,
};
use crate::state::WebServerState;
use crate::traits::{AnalysisStore, ClientBroadcaster, PatientRegistry, ReportMailer, SnapshotStore, StaticFileServer};
use crate::types::{AlertLevel, ServerEvent, Snapshot, SnapshotSummary};
use crate::web::handlers::{analyze, api, patients, reports, static_files, websocket};
use shared::{AnalysisResult, BatchReport, ProcessId, logging, process_info, process_warn};

/// Service implementations the server is assembled from
#[derive(Clone)]
pub struct ServiceSet {
    pub patients: Arc<dyn PatientRegistry>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub mailer: Arc<dyn ReportMailer>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub broadcaster: Arc<dyn ClientBroadcaster>,
    pub static_server: Arc<dyn StaticFileServer>,
}

impl ServiceSet {
    /// Production services over `state`
    pub fn real(state: &Arc<WebServerState>, config: &AppConfig) -> WebServerResult<Self> {
        Ok(Self {
            patients: Arc::new(RealPatientRegistry::new(state.clone())),
            analyses: Arc::new(RealAnalysisStore::new(state.clone())),
            mailer: mailer_from_config(&config.mail)?,
            snapshots: Arc::new(FileSnapshotStore::new(&config.snapshot_path)),
            broadcaster: Arc::new(RealClientBroadcaster::new(state.clone())),
            static_server: Arc::new(RealStaticFileServer::new(&config.static_dir)),
        })
    }
}

/// Main webserver struct with dependency injection
#[derive(Clone)]
pub struct WebServer {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) state: Arc<WebServerState>,
    pub(crate) engine: Arc<AnalysisEngine>,
    pub(crate) services: ServiceSet,
}

impl WebServer {
    pub fn new(
        config: AppConfig,
        state: Arc<WebServerState>,
        engine: Arc<AnalysisEngine>,
        services: ServiceSet,
    ) -> Self {
        Self {
            config: Arc::new(config),
            state,
            engine,
            services,
        }
    }

    /// Validate configuration and assemble the production server
    pub fn from_config(config: AppConfig) -> WebServerResult<Self> {
        config.validate()?;
        let state = Arc::new(WebServerState::new(config.bind_address()?, config.settings.clone()));
        let engine = Arc::new(AnalysisEngine::from_config(&config.engine)?);
        let services = ServiceSet::real(&state, &config)?;
        Ok(Self::new(config, state, engine, services))
    }

    /// Build the Axum router with all routes
    pub fn build_router(&self) -> Router {
        Router::new()
            // Static file routes
            .route("/", get(static_files::serve_index))
            .route("/static/*path", get(static_files::serve_static))
            // WebSocket route
            .route("/ws", get(websocket::websocket_handler))
            // Health and server info
            .route("/health", get(api::health_check))
            .route("/api/status", get(api::get_status))
            .route("/api/classes", get(api::get_classes))
            .route("/api/config", get(api::get_config).put(api::update_config))
            .route("/api/snapshot/save", post(api::save_snapshot))
            .route("/api/snapshot/load", post(api::load_snapshot))
            // Analysis
            .route("/api/analyze", post(analyze::analyze))
            .route("/api/analyze/batch", post(analyze::analyze_batch))
            .route("/api/analyze/compare", post(analyze::compare))
            .route("/api/filters", post(analyze::filters))
            .route("/api/analyses", get(analyze::list_analyses))
            .route("/api/analyses/:id", get(analyze::get_analysis))
            // Reports
            .route("/api/analyses/:id/report.pdf", get(reports::analysis_pdf))
            .route("/api/analyses/:id/email", post(reports::email_report))
            .route("/api/batches/:id", get(reports::get_batch))
            .route("/api/batches/:id/report.pdf", get(reports::batch_pdf))
            // Patients
            .route("/api/patients", get(patients::list_patients).post(patients::create_patient))
            .route(
                "/api/patients/:id",
                get(patients::get_patient)
                    .put(patients::update_patient)
                    .delete(patients::delete_patient),
            )
            .route("/api/patients/:id/analyses", get(patients::patient_analyses))
            .layer(
                ServiceBuilder::new()
                    .layer(CorsLayer::permissive())
                    .layer(DefaultBodyLimit::max(self.config.max_upload_bytes()))
                    .into_inner(),
            )
            .with_state(self.clone())
    }

    /// Serve until `shutdown` resolves, then autosave if enabled
    pub async fn run<F>(&self, shutdown: F) -> WebServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.config.load_snapshot {
            self.load_startup_snapshot().await;
        }

        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(self.state.bind_address)
            .await
            .map_err(|e| WebServerError::ServerStartup(format!("Failed to bind to {}: {}", self.state.bind_address, e)))?;

        logging::log_startup(
            ProcessId::current(),
            &format!("listening on http://{}", self.state.bind_address),
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| WebServerError::ServerStartup(format!("Server error: {e}")))?;

        self.state.set_running(false);
        if self.config.autosave {
            match self.save_snapshot().await {
                Ok(summary) => logging::log_success(
                    ProcessId::current(),
                    &format!("Autosaved {} analyses to {}", summary.analyses, summary.path),
                ),
                Err(e) => logging::log_error(ProcessId::current(), "Autosave", &e),
            }
        }
        Ok(())
    }

    async fn load_startup_snapshot(&self) {
        if !self.services.snapshots.exists().await {
            process_info!(
                ProcessId::current(),
                "📂 No snapshot at {}, starting empty",
                self.services.snapshots.location()
            );
            return;
        }
        if let Err(e) = self.load_snapshot().await {
            process_warn!(ProcessId::current(), "⚠️ Snapshot not loaded: {}", e);
        }
    }

    /// Get server state for external access
    pub fn state(&self) -> &Arc<WebServerState> {
        &self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Store a finished analysis, link it to its patient and notify clients
    pub async fn record_analysis(&self, result: AnalysisResult) -> WebServerResult<AnalysisResult> {
        if let Some(patient_id) = result.patient_id {
            self.services.patients.attach_analysis(patient_id, result.id).await?;
        }
        self.services.analyses.insert(result.clone()).await;
        self.state.record_analyses(1);
        self.services.broadcaster.broadcast(ServerEvent::analysis_completed(&result));
        Ok(result)
    }

    pub async fn record_batch(&self, report: BatchReport) -> BatchReport {
        self.services.analyses.insert_batch(report.clone()).await;
        self.state.record_analyses(report.results.len() as u64);
        self.services.broadcaster.broadcast(ServerEvent::batch_completed(&report));
        report
    }

    /// Merge a partial update into the current settings and apply it
    ///
    /// Read, merge and write happen under one guard so concurrent updates
    /// never drop each other's fields.
    pub async fn update_settings(&self, update: SettingsUpdate) -> WebServerResult<RuntimeSettings> {
        let settings = {
            let mut current = self.state.settings.write().await;
            let merged = current.merged(update);
            merged.validate()?;
            *current = merged.clone();
            merged
        };
        let evicted = self.services.analyses.set_history_limit(settings.history_limit).await;
        if evicted > 0 {
            process_info!(ProcessId::current(), "🧹 History limit lowered, {} analyses evicted", evicted);
        }
        Ok(settings)
    }

    /// Current in-memory state as a snapshot document
    pub async fn capture_snapshot(&self) -> Snapshot {
        let (analyses, batches) = self.services.analyses.snapshot().await;
        Snapshot::new(
            self.state.settings().await,
            self.services.patients.snapshot().await,
            analyses,
            batches,
        )
    }

    /// Replace in-memory state wholesale
    pub async fn restore_snapshot(&self, snapshot: Snapshot) -> WebServerResult<()> {
        snapshot
            .settings
            .validate()
            .map_err(|e| WebServerError::Snapshot(format!("invalid settings: {e}")))?;
        self.services.patients.restore(snapshot.patients).await?;
        *self.state.settings.write().await = snapshot.settings;
        self.services.analyses.restore(snapshot.analyses, snapshot.batches).await;
        Ok(())
    }

    pub async fn save_snapshot(&self) -> WebServerResult<SnapshotSummary> {
        let snapshot = self.capture_snapshot().await;
        self.services.snapshots.save(snapshot).await
    }

    pub async fn load_snapshot(&self) -> WebServerResult<SnapshotSummary> {
        let snapshot = self.services.snapshots.load().await?;
        let summary = SnapshotSummary::of(&snapshot, self.services.snapshots.location());
        self.restore_snapshot(snapshot).await?;
        self.services.broadcaster.broadcast(ServerEvent::alert(
            AlertLevel::Info,
            format!(
                "Snapshot loaded: {} patients, {} analyses",
                summary.patients, summary.analyses
            ),
        ));
        Ok(summary)
    }
}
