//! gazedeck-en - Capture Enhancement Microservice
//!
//! Runs the batch capture-enhancement orchestrator for GazeDeck sessions:
//! drives raw webcam frames through the external vision service, merges the
//! returned measurements into each set's parameter table, and serves the
//! pollable status/control surface used by the capture UI.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gazedeck_en::config::EnhanceConfig;
use gazedeck_en::layout::SessionLayout;
use gazedeck_en::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting gazedeck-en (Capture Enhancement) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve root folder
    let resolver = gazedeck_common::config::RootFolderResolver::new("enhance");
    let root_folder = resolver.resolve();

    // Step 2: Create root folder directory if missing
    let initializer = gazedeck_common::config::RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    // Step 3: Create the capture/enhanced session tree
    let layout = SessionLayout::new(initializer.root_folder());
    layout
        .ensure_directories()
        .map_err(|e| anyhow::anyhow!("Failed to initialize session directories: {}", e))?;
    info!("Capture directory: {}", layout.capture_dir().display());
    info!("Enhanced directory: {}", layout.enhanced_dir().display());

    // Step 4: Load service configuration
    let config = EnhanceConfig::load();
    info!("Vision service: {}", config.vision_base_url);
    let port = config.port;

    // Create application state
    let state = AppState::new(config, layout);

    // Build router
    let app = gazedeck_en::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
