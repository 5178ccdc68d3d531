//! Webserver state management
//!
//! Shared in-memory state. Services hold an `Arc<WebServerState>` and operate
//! on the maps in here.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::config::RuntimeSettings;
use crate::types::ServerEvent;
use shared::{AnalysisResult, BatchReport, Patient, PatientId};

/// Insertion-ordered analysis history with a size bound
#[derive(Debug, Default)]
pub struct AnalysisHistory {
    order: VecDeque<Uuid>,
    items: HashMap<Uuid, AnalysisResult>,
}

impl AnalysisHistory {
    /// Insert or replace; returns how many old entries were evicted
    pub fn insert(&mut self, result: AnalysisResult, limit: usize) -> usize {
        let id = result.id;
        if self.items.insert(id, result).is_none() {
            self.order.push_back(id);
        }
        self.truncate(limit)
    }

    /// Drop oldest entries until at most `limit` remain
    pub fn truncate(&mut self, limit: usize) -> usize {
        let mut evicted = 0;
        while self.order.len() > limit {
            if let Some(id) = self.order.pop_front() {
                self.items.remove(&id);
                evicted += 1;
            }
        }
        evicted
    }

    pub fn get(&self, id: &Uuid) -> Option<&AnalysisResult> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut AnalysisResult> {
        self.items.get_mut(id)
    }

    /// Newest first
    pub fn iter_recent(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.order.iter().rev().filter_map(|id| self.items.get(id))
    }

    /// Oldest first
    pub fn iter_oldest(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut AnalysisResult> {
        self.items.values_mut()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.items.clear();
    }
}

/// Core webserver state
#[derive(Debug)]
pub struct WebServerState {
    pub bind_address: SocketAddr,

    // Browser connection management
    pub client_broadcast: broadcast::Sender<ServerEvent>,
    pub connection_count: Arc<AtomicU32>,

    // Domain data
    pub patients: Arc<RwLock<HashMap<PatientId, Patient>>>,
    pub analyses: Arc<RwLock<AnalysisHistory>>,
    pub batches: Arc<RwLock<HashMap<Uuid, BatchReport>>>,
    pub settings: Arc<RwLock<RuntimeSettings>>,

    // Server state
    pub is_running: Arc<AtomicBool>,
    pub analyses_performed: Arc<AtomicU64>,
    pub server_start_time: Instant,
}

impl WebServerState {
    /// Create a new webserver state
    pub fn new(bind_address: SocketAddr, settings: RuntimeSettings) -> Self {
        let (client_broadcast, _) = broadcast::channel(1000);

        Self {
            bind_address,
            client_broadcast,
            connection_count: Arc::new(AtomicU32::new(0)),
            patients: Arc::new(RwLock::new(HashMap::new())),
            analyses: Arc::new(RwLock::new(AnalysisHistory::default())),
            batches: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(settings)),
            is_running: Arc::new(AtomicBool::new(true)),
            analyses_performed: Arc::new(AtomicU64::new(0)),
            server_start_time: Instant::now(),
        }
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Set running state
    pub fn set_running(&self, running: bool) {
        self.is_running.store(running, Ordering::Relaxed);
    }

    /// Get server uptime in seconds
    pub fn get_uptime_seconds(&self) -> u64 {
        self.server_start_time.elapsed().as_secs()
    }

    /// Get client connection count
    pub fn get_connection_count(&self) -> u32 {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Increment connection count
    pub fn increment_connection_count(&self) -> u32 {
        self.connection_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement connection count
    pub fn decrement_connection_count(&self) -> u32 {
        self.connection_count.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    /// Count images classified since startup
    pub fn record_analyses(&self, count: u64) -> u64 {
        self.analyses_performed.fetch_add(count, Ordering::Relaxed) + count
    }

    pub fn get_analyses_performed(&self) -> u64 {
        self.analyses_performed.load(Ordering::Relaxed)
    }

    pub async fn settings(&self) -> RuntimeSettings {
        self.settings.read().await.clone()
    }
}
