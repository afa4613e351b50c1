use crate::error::FormatError;
use crate::models::{EngineSettings, GameSettingsConfig, LauncherConfig, SchemaError};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;

pub const LAUNCHER_CONFIG_FILE: &str = "config.json";
pub const SCHEMA_FILE: &str = "settings.json";
pub const ENGINE_SETTINGS_FILE: &str = "engine.toml";

/// Prefix of environment variables overriding [`EngineSettings`], e.g.
/// `GSE_DEBUG_MODE=true`.
pub const ENV_PREFIX: &str = "GSE";

/// Configuration manager for the launcher's JSON files and the engine's own
/// settings.
///
/// Manages three files in the configuration directory:
/// - `config.json`: launcher config (window, buttons, Mod Organizer)
/// - `settings.json`: the game settings schema
/// - `engine.toml`: optional engine settings, overridable from `GSE_*`
///   environment variables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    launcher_config_path: Utf8PathBuf,
    schema_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `config.json` and `settings.json`
    ///
    /// # Returns
    /// A new ConfigManager instance; the directory is created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            launcher_config_path: config_dir.join(LAUNCHER_CONFIG_FILE),
            schema_path: config_dir.join(SCHEMA_FILE),
            config_dir,
        })
    }

    /// Load `config.json`, or defaults if it doesn't exist.
    pub fn load_launcher_config(&self) -> Result<LauncherConfig> {
        load_json(&self.launcher_config_path, "launcher config")
    }

    pub fn save_launcher_config(&self, config: &LauncherConfig) -> Result<()> {
        save_json(&self.launcher_config_path, config, "launcher config")
    }

    /// Load `settings.json`, or an empty schema if it doesn't exist.
    pub fn load_schema(&self) -> Result<GameSettingsConfig> {
        self.load_schema_from(&self.schema_path)
    }

    /// Load a schema from an arbitrary `.json` file.
    ///
    /// # Errors
    /// [`FormatError::WrongExtension`] for any other extension and
    /// [`FormatError::MalformedJson`] when the content does not parse; both are
    /// reachable through `downcast_ref`.
    pub fn load_schema_from(&self, path: &Utf8Path) -> Result<GameSettingsConfig> {
        self.load_schema_checked_from(path).map(|(schema, _)| schema)
    }

    /// Like [`ConfigManager::load_schema`], also returning the options that
    /// were left out because they cannot be represented.
    pub fn load_schema_checked(&self) -> Result<(GameSettingsConfig, Vec<SchemaError>)> {
        self.load_schema_checked_from(&self.schema_path)
    }

    pub fn load_schema_checked_from(
        &self,
        path: &Utf8Path,
    ) -> Result<(GameSettingsConfig, Vec<SchemaError>)> {
        ensure_json(path)?;

        if !path.exists() {
            tracing::warn!("game settings file not found at {}, using defaults", path);
            return Ok((GameSettingsConfig::default(), Vec::new()));
        }

        let file_contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read game settings: {}", path))?;

        let (schema, rejected) = GameSettingsConfig::from_json_per_option(&file_contents)
            .map_err(|source| FormatError::MalformedJson {
                path: path.to_path_buf(),
                source,
            })?;

        for error in &rejected {
            tracing::warn!("Skipping option in {}: {}", path, error);
        }
        tracing::info!(
            "Loaded game settings from {} ({} option(s), {} skipped)",
            path,
            schema.game_settings_options.len(),
            rejected.len()
        );
        Ok((schema, rejected))
    }

    pub fn save_schema(&self, schema: &GameSettingsConfig) -> Result<()> {
        save_json(&self.schema_path, schema, "game settings")
    }

    /// Layered engine settings: defaults, then `engine.toml`, then `GSE_*`
    /// environment variables.
    pub fn load_engine_settings(&self) -> Result<EngineSettings> {
        load_engine_settings(&self.config_dir, None)
    }

    /// Backup root from `settings`, relative to the config directory unless
    /// absolute.
    pub fn backup_dir(&self, settings: &EngineSettings) -> Utf8PathBuf {
        self.relative_to_config(&settings.backup_dir)
    }

    pub fn log_dir(&self, settings: &EngineSettings) -> Utf8PathBuf {
        self.relative_to_config(&settings.log_dir)
    }

    fn relative_to_config(&self, path: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn schema_path(&self) -> &Utf8Path {
        &self.schema_path
    }
}

/// Build [`EngineSettings`] from `<config_dir>/engine.toml` and the
/// environment. `env` replaces the process environment when given.
pub fn load_engine_settings(
    config_dir: &Utf8Path,
    env: Option<HashMap<String, String>>,
) -> Result<EngineSettings> {
    let path = config_dir.join(ENGINE_SETTINGS_FILE);

    let settings = ::config::Config::builder()
        .add_source(::config::File::new(path.as_str(), ::config::FileFormat::Toml).required(false))
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .with_context(|| format!("Failed to read engine settings from {}", path))?
        .try_deserialize::<EngineSettings>()
        .with_context(|| format!("Invalid engine settings in {}", path))?;

    tracing::debug!("Engine settings: {:?}", settings);
    Ok(settings)
}

fn ensure_json(path: &Utf8Path) -> Result<(), FormatError> {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(()),
        _ => Err(FormatError::WrongExtension {
            path: path.to_path_buf(),
            expected: "json".to_string(),
        }),
    }
}

fn load_json<T: DeserializeOwned + Default>(path: &Utf8Path, what: &str) -> Result<T> {
    ensure_json(path)?;

    if !path.exists() {
        tracing::warn!("{} file not found at {}, using defaults", what, path);
        return Ok(T::default());
    }

    let file_contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}: {}", what, path))?;

    let value = serde_json::from_str(&file_contents).map_err(|source| FormatError::MalformedJson {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Loaded {} from {}", what, path);
    Ok(value)
}

fn save_json<T: Serialize>(path: &Utf8Path, value: &T, what: &str) -> Result<()> {
    ensure_json(path)?;

    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {} to JSON", what))?;

    fs::write(path, json).with_context(|| format!("Failed to write {}: {}", what, path))?;

    tracing::info!("Saved {} to {}", what, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let launcher = manager.load_launcher_config().unwrap();
        assert_eq!(launcher, LauncherConfig::default());

        let schema = manager.load_schema().unwrap();
        assert!(schema.game_settings_options.is_empty());
        assert_eq!(schema.base_files_encoding, "win1251");
    }

    #[test]
    fn test_save_load_launcher_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = LauncherConfig::default();
        config.documents_path = "%DOCUMENTS%\\My Games\\Skyrim".to_string();
        config.mod_organizer.is_used = true;
        manager.save_launcher_config(&config).unwrap();

        let loaded = manager.load_launcher_config().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let (manager, _temp_dir) = create_test_config_manager();
        let path = manager.config_dir().join("settings.yaml");
        fs::write(&path, "{}").unwrap();

        let err = manager.load_schema_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FormatError>(),
            Some(FormatError::WrongExtension { .. })
        ));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(manager.schema_path(), "{ not json").unwrap();

        let err = manager.load_schema().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FormatError>(),
            Some(FormatError::MalformedJson { .. })
        ));
    }

    #[test]
    fn test_engine_settings_layering() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::write(
            manager.config_dir().join(ENGINE_SETTINGS_FILE),
            "log_prefix = \"skyrim\"\nbackup_dir = \"snapshots\"\n",
        )
        .unwrap();

        let mut env = HashMap::new();
        env.insert("GSE_DEBUG_MODE".to_string(), "true".to_string());
        env.insert("GSE_BACKUP_DIR".to_string(), "/var/backups".to_string());

        let settings = load_engine_settings(manager.config_dir(), Some(env)).unwrap();
        assert_eq!(settings.log_prefix, "skyrim");
        assert!(settings.debug_mode);
        assert_eq!(settings.backup_dir, "/var/backups");
        assert_eq!(settings.log_dir, "logs");
    }

    #[test]
    fn test_engine_settings_defaults_without_file() {
        let (manager, _temp_dir) = create_test_config_manager();
        let settings = load_engine_settings(manager.config_dir(), Some(HashMap::new())).unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_relative_dirs() {
        let (manager, _temp_dir) = create_test_config_manager();
        let settings = EngineSettings::default();
        assert_eq!(manager.backup_dir(&settings), manager.config_dir().join("backups"));
        assert_eq!(manager.log_dir(&settings), manager.config_dir().join("logs"));
    }
}
