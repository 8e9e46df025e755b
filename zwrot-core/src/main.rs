use std::sync::Arc;

use dotenv::dotenv;
use tokio::signal;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zwrot_core::api::{create_router, AppState};
use zwrot_core::config::AppConfig;
use zwrot_core::helper::{HelperApi, HttpHelper};
use zwrot_core::loader::{FileSource, HttpSource, InvoiceSource, InvoiceStore};
use zwrot_core::wizard::{MemoryHistory, WizardController, WizardSettings};

/// Waits for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    info!("Received Ctrl+C, shutting down gracefully...");
}

/// Picks the invoice source: the remote URL when configured, else the
/// local data file.
fn invoice_source(config: &AppConfig) -> anyhow::Result<Arc<dyn InvoiceSource>> {
    match &config.invoice_data_url {
        Some(url) => {
            let client = reqwest::Client::builder()
                .timeout(config.helper_timeout)
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
            info!("Loading invoices from {}", url);
            Ok(Arc::new(HttpSource::new(client, url.clone())))
        }
        None => {
            info!("Loading invoices from {}", config.invoice_data_path.display());
            Ok(Arc::new(FileSource::new(config.invoice_data_path.clone())))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Zwrot Core Server...");

    let config = AppConfig::from_env()?;

    let helper: Arc<dyn HelperApi> = Arc::new(
        HttpHelper::new(config.helper_url.clone(), config.helper_timeout)
            .map_err(|e| anyhow::anyhow!("Failed to build helper client: {}", e))?,
    );

    let store = Arc::new(InvoiceStore::new(invoice_source(&config)?));

    // A failed first load is served as an error state; a later refresh
    // may still succeed.
    if let Err(e) = store.refetch().await {
        warn!("Starting without invoice data: {}", e);
    }

    let history = Arc::new(MemoryHistory::default());
    let wizard = Arc::new(WizardController::new(
        history.clone(),
        helper.clone(),
        store.clone(),
        WizardSettings {
            poll_interval: config.poll_interval,
            request_timeout: config.helper_timeout,
        },
    ));

    let app = create_router(AppState {
        store,
        wizard: wizard.clone(),
        history,
        helper,
    });

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);
    info!("Helper expected at {}", config.helper_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    wizard.dispose().await;

    info!("Zwrot Core Server stopped");
    Ok(())
}
