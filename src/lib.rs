// Game Settings Engine - schema, config-file adapters and backups for game launchers
//
// This is the library crate containing the engine and its data structures.
// The binary crate (main.rs) is a headless driver around it.

pub mod adapters;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{EngineError, GameSettingsEngine};
pub use error::{FormatError, IoError};
pub use models::{EngineSettings, GameSettingsConfig, LauncherConfig, SessionState};
pub use state::{SessionChange, SessionManager};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
