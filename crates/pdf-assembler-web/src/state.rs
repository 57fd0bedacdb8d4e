use pdf_assembler_core::{AppConfig, DocumentProcessor, Result};
use std::time::Duration;
use tracing::info;

/// Global application state
pub struct AppState {
    pub processor: DocumentProcessor,
    pub config: AppConfig,
}

impl AppState {
    /// Open the configured store and wrap it in a processor.
    pub fn new(config: AppConfig) -> Result<Self> {
        let processor = DocumentProcessor::from_config(&config.store)?;
        info!(
            "Using {} document store ({})",
            config.store.backend,
            processor.store().name()
        );

        Ok(Self { processor, config })
    }

    /// How long stored documents are kept, if retention is enabled.
    pub const fn retention(&self) -> Option<Duration> {
        match self.config.store.retention_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Drop documents older than the retention window.
    pub async fn purge_expired(&self) {
        let Some(max_age) = self.retention() else {
            return;
        };

        match self.processor.store().purge_older_than(max_age).await {
            Ok(0) => {}
            Ok(count) => info!("Purged {} expired documents", count),
            Err(e) => tracing::warn!("Failed to purge expired documents: {}", e),
        }
    }
}
