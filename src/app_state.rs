//! Application State Management
//!
//! `AppState` is the single piece of shared, process-wide state threaded
//! through every HTTP handler via axum's `State` extractor. Unlike a
//! connection-per-request SQL client, sled's `Db`/`Tree` handles are cheaply
//! cloneable and safe to share across threads, so the store is opened once
//! at startup and held behind an `Arc` for the life of the process.

use std::sync::Arc;

use crate::{artifact::ArtifactSink, config::Config, storage::Store};

pub struct AppState {
    pub store: Arc<Store>,
    pub artifacts: Arc<ArtifactSink>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let store = Store::open(&config.store.db_path)?;
        let artifacts = ArtifactSink::new(config.store.images_dir.clone())?;

        Ok(Arc::new(AppState {
            store: Arc::new(store),
            artifacts: Arc::new(artifacts),
        }))
    }

    /// Flush and close the store on shutdown.
    pub async fn shutdown(&self) {
        if let Err(e) = self.store.close().await {
            tracing::error!(error = %e, "failed to close task store cleanly");
        }
    }
}
