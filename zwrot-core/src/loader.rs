use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::error::LoadError;
use crate::models::{DashboardStats, Invoice};
use crate::stats;

/// Where the invoice collection comes from.
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    /// Fetches the full invoice collection.
    async fn fetch(&self) -> Result<Vec<Invoice>, LoadError>;
}

/// Reads invoices from the static JSON data file on disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InvoiceSource for FileSource {
    async fn fetch(&self) -> Result<Vec<Invoice>, LoadError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| LoadError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        parse_invoices(&raw)
    }
}

/// Fetches invoices over HTTP, bypassing caches with a timestamp query.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl InvoiceSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<Invoice>, LoadError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("t", Utc::now().timestamp_millis())])
            .send()
            .await
            .map_err(|e| LoadError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LoadError::Unavailable(format!("HTTP {}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::Unavailable(e.to_string()))?;
        parse_invoices(&body)
    }
}

fn parse_invoices(raw: &[u8]) -> Result<Vec<Invoice>, LoadError> {
    serde_json::from_slice(raw).map_err(|e| LoadError::Malformed(e.to_string()))
}

/// Invoices together with the statistics computed from them.
///
/// Built in one step and never mutated, so readers always see stats
/// that match the invoices.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSnapshot {
    pub invoices: Vec<Invoice>,
    pub stats: DashboardStats,
    pub last_updated: DateTime<Utc>,
}

impl InvoiceSnapshot {
    pub fn new(invoices: Vec<Invoice>) -> Self {
        let stats = stats::compute(&invoices);
        Self {
            invoices,
            stats,
            last_updated: Utc::now(),
        }
    }
}

/// Current state of the invoice data.
#[derive(Debug, Clone)]
pub enum LoadState {
    Loading,
    Ready(Arc<InvoiceSnapshot>),
    Failed(LoadError),
}

/// Something the wizard can ask to reload its data after a refresh.
#[async_trait]
pub trait Reload: Send + Sync {
    async fn reload(&self);
}

/// Owner of the loaded invoice collection.
///
/// Starts in [`LoadState::Loading`]; call [`InvoiceStore::refetch`] once
/// at startup and again whenever the underlying data changes.
pub struct InvoiceStore {
    source: Arc<dyn InvoiceSource>,
    state: RwLock<LoadState>,
    /// Serialises refetches so results are applied in request order
    refetch_guard: Mutex<()>,
}

impl InvoiceStore {
    pub fn new(source: Arc<dyn InvoiceSource>) -> Self {
        Self {
            source,
            state: RwLock::new(LoadState::Loading),
            refetch_guard: Mutex::new(()),
        }
    }

    /// Returns the current load state.
    pub async fn state(&self) -> LoadState {
        self.state.read().await.clone()
    }

    /// Returns the loaded snapshot, if any.
    pub async fn snapshot(&self) -> Option<Arc<InvoiceSnapshot>> {
        match &*self.state.read().await {
            LoadState::Ready(snapshot) => Some(snapshot.clone()),
            _ => None,
        }
    }

    /// Loads the invoice collection again and replaces the snapshot.
    ///
    /// On failure the error replaces any previous data; the wizard is
    /// blocked until a later refetch succeeds.
    ///
    /// # Errors
    ///
    /// Returns the `LoadError` that was recorded in the state.
    pub async fn refetch(&self) -> Result<Arc<InvoiceSnapshot>, LoadError> {
        let _guard = self.refetch_guard.lock().await;
        *self.state.write().await = LoadState::Loading;

        match self.source.fetch().await {
            Ok(invoices) => {
                let snapshot = Arc::new(InvoiceSnapshot::new(invoices));
                info!(
                    "Loaded {} invoice(s), total {}",
                    snapshot.stats.invoice_count, snapshot.stats.total_amount
                );
                *self.state.write().await = LoadState::Ready(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                error!("Failed to load invoices: {}", e);
                *self.state.write().await = LoadState::Failed(e.clone());
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Reload for InvoiceStore {
    async fn reload(&self) {
        // The outcome is recorded in the store state.
        let _ = self.refetch().await;
    }
}
