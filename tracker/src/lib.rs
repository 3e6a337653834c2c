pub mod api;
pub mod auth;
pub mod config;
pub mod history;
pub mod metrics_defs;
pub mod record;
pub mod service;
pub mod sheets;
pub mod store;

use api::AppState;
use auth::AdminAuth;
use config::{Config, StoreConfig, ValidationError};
use service::TrackingService;
use sheets::GoogleSheets;
use std::sync::Arc;
use store::{MemorySheet, SheetStore, StoreError};

#[derive(thiserror::Error, Debug)]
pub enum TrackerError {
    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),
    #[error("could not open sheet store: {0}")]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens the configured store. For Google Sheets this resolves the tab once,
/// before any request is served.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn SheetStore>, StoreError> {
    match config {
        StoreConfig::GoogleSheets(sheets) => Ok(Arc::new(GoogleSheets::connect(sheets).await?)),
        StoreConfig::Memory(memory) => {
            tracing::warn!("Using the in-memory store. Records are lost on restart.");
            Ok(Arc::new(MemorySheet::new(memory.header.clone())))
        }
    }
}

pub async fn run(config: Config) -> Result<(), TrackerError> {
    config.validate()?;

    let store = open_store(&config.store).await?;
    tracing::info!(store = %store.describe(), "Sheet store ready");

    let service = TrackingService::new(store, &config.identifier_column);
    let auth = AdminAuth::new(&config.admin);
    api::serve(&config.listener, AppState::new(service, auth)).await?;
    Ok(())
}
