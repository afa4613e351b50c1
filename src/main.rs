//! Game Settings Engine - headless driver.
//!
//! Loads the launcher configuration and game settings schema from a config
//! directory, resolves the path variables, reads the current value of every
//! option from the game's files and logs what it found.
//!
//! # Usage
//!
//! ```text
//! game-settings-engine [CONFIG_DIR]
//! ```
//!
//! `CONFIG_DIR` defaults to the working directory, which is also taken as the
//! game folder (`%GAME_DIR%`). Engine settings come from
//! `CONFIG_DIR/engine.toml` and `GSE_*` environment variables.
//!
//! # Execution Flow
//!
//! 1. Load engine settings and initialize logging
//! 2. Create the tokio runtime
//! 3. Build the engine (path variables, Mod Organizer profile)
//! 4. Load and validate `settings.json`
//! 5. Extract parameters and log the resulting messages
//! 6. Log the metrics summary and shut down

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use game_settings_engine::models::{Severity, UserMessage};
use game_settings_engine::services::AnchorPaths;
use game_settings_engine::{APP_NAME, ConfigManager, GameSettingsEngine, VERSION};

fn main() -> Result<()> {
    let config_dir = std::env::args()
        .nth(1)
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| Utf8PathBuf::from("."));

    let config_manager = ConfigManager::new(&config_dir)?;
    let settings = config_manager.load_engine_settings()?;

    let log_dir = config_manager.log_dir(&settings);
    let _guard = game_settings_engine::logging::setup_logging(&settings, &log_dir)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("gse-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let result = runtime.block_on(run(config_manager, settings));

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    result.inspect_err(|e| tracing::error!("Engine error: {:#}", e))
}

async fn run(
    config_manager: ConfigManager,
    settings: game_settings_engine::EngineSettings,
) -> Result<()> {
    let anchors = AnchorPaths::from_environment()?;
    tracing::info!(
        "Game folder: {}, documents: {}",
        anchors.game_dir,
        anchors.documents
    );

    let engine = GameSettingsEngine::new(config_manager, settings, anchors).await?;

    for message in engine.load_schema().await? {
        log_message(&message);
    }

    let report = engine.extract_parameters().await?;
    for message in report.messages() {
        log_message(&message);
    }
    for (key, parameter) in &report.parameters {
        tracing::info!("{} = {} ({})", key, parameter.value, parameter.owner_file_name);
    }

    engine.metrics().log_summary();
    Ok(())
}

fn log_message(message: &UserMessage) {
    match message.severity {
        Severity::Error => tracing::error!("{}", message.text),
        Severity::Warning => tracing::warn!("{}", message.text),
        Severity::Info => tracing::info!("{}", message.text),
    }
}
