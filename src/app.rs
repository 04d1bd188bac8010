use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::capacity::CapacityTable;
use crate::config::Config;
use crate::importers::WorkbookImporter;
use crate::services::AnalysisService;

/// Running HTTP service
///
/// Holds the server task handle so callers can await it or abort it.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
}

impl Application {
    /// Build the shared capacity table, importer and analysis service, then
    /// spawn the HTTP API server (Axum)
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let table = Arc::new(CapacityTable::standard());
        info!("Loaded capacity table with {} meter sizes", table.len());

        let analysis_service =
            AnalysisService::new(table, Arc::new(WorkbookImporter::default()));

        let app_state = AppState {
            analysis_service,
            default_bounds_mode: config.bounds_mode,
            max_upload_bytes: config.max_upload_bytes,
        };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

        info!("Application initialized successfully");
        Ok(Self { server_handle })
    }

    /// Run until the server stops (which runs indefinitely unless error)
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
