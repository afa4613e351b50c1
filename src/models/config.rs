use serde::{Deserialize, Serialize};

/// Launcher configuration from `config.json`.
///
/// Window geometry and buttons are consumed by the UI layer; the engine only
/// reads [`documents_path`](Self::documents_path) and
/// [`mod_organizer`](Self::mod_organizer) to build the path-variable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,

    #[serde(default)]
    pub is_resizable: bool,

    /// Template for `%DOCS_GAME%`, e.g. `%DOCUMENTS%\My Games\Skyrim Special Edition`.
    #[serde(default)]
    pub documents_path: String,

    #[serde(default)]
    pub play_button: LauncherButton,

    #[serde(default)]
    pub custom_buttons: Vec<CustomButton>,

    #[serde(default)]
    pub mod_organizer: ModOrganizerConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            min_width: None,
            min_height: None,
            max_width: None,
            max_height: None,
            is_resizable: false,
            documents_path: String::new(),
            play_button: LauncherButton::default(),
            custom_buttons: Vec::new(),
            mod_organizer: ModOrganizerConfig::default(),
        }
    }
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherButton {
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    #[default]
    Run,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomButton {
    pub id: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub action: ButtonAction,
}

/// Mod Organizer integration. Path fields are templates over the path
/// variables that precede them in resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModOrganizerConfig {
    #[serde(default)]
    pub is_used: bool,

    #[serde(default = "default_mo_version")]
    pub version: u8,

    #[serde(rename = "pathToMOFolder", default = "default_mo_folder")]
    pub path_to_mo_folder: String,

    #[serde(rename = "pathToINI", default = "default_mo_ini")]
    pub path_to_ini: String,

    #[serde(default = "default_mo_profiles")]
    pub path_to_profiles: String,

    #[serde(default = "default_mo_mods")]
    pub path_to_mods: String,
}

impl Default for ModOrganizerConfig {
    fn default() -> Self {
        Self {
            is_used: false,
            version: default_mo_version(),
            path_to_mo_folder: default_mo_folder(),
            path_to_ini: default_mo_ini(),
            path_to_profiles: default_mo_profiles(),
            path_to_mods: default_mo_mods(),
        }
    }
}

fn default_mo_version() -> u8 {
    2
}

fn default_mo_folder() -> String {
    "%GAME_DIR%\\Mod Organizer".to_string()
}

fn default_mo_ini() -> String {
    "%MO_DIR%\\ModOrganizer.ini".to_string()
}

fn default_mo_profiles() -> String {
    "%MO_DIR%\\profiles".to_string()
}

fn default_mo_mods() -> String {
    "%MO_DIR%\\mods".to_string()
}

/// Runtime settings of the engine itself, layered from `engine.toml` and
/// `GSE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_console_output")]
    pub console_output: bool,

    /// Backup root, relative to the config directory unless absolute.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            debug_mode: false,
            console_output: default_console_output(),
            backup_dir: default_backup_dir(),
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "game-settings".to_string()
}

fn default_console_output() -> bool {
    true
}

fn default_backup_dir() -> String {
    "backups".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launcher_config_defaults() {
        let config: LauncherConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 600);
        assert!(!config.mod_organizer.is_used);
        assert_eq!(config.mod_organizer.version, 2);
        assert_eq!(config.mod_organizer.path_to_ini, "%MO_DIR%\\ModOrganizer.ini");
    }

    #[test]
    fn test_mod_organizer_field_names() {
        let json = r#"{
            "modOrganizer": {
                "isUsed": true,
                "version": 1,
                "pathToMOFolder": "%GAME_DIR%\\MO",
                "pathToINI": "%MO_DIR%\\MO.ini"
            }
        }"#;
        let config: LauncherConfig = serde_json::from_str(json).unwrap();
        assert!(config.mod_organizer.is_used);
        assert_eq!(config.mod_organizer.version, 1);
        assert_eq!(config.mod_organizer.path_to_mo_folder, "%GAME_DIR%\\MO");
        assert_eq!(config.mod_organizer.path_to_mods, "%MO_DIR%\\mods");

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["modOrganizer"]["pathToMOFolder"], "%GAME_DIR%\\MO");
        assert_eq!(value["modOrganizer"]["pathToINI"], "%MO_DIR%\\MO.ini");
    }

    #[test]
    fn test_buttons() {
        let json = r#"{
            "playButton": { "path": "%GAME_DIR%\\game.exe", "label": "Play" },
            "customButtons": [{ "id": "docs", "path": "%DOCS_GAME%", "action": "open" }]
        }"#;
        let config: LauncherConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.play_button.label, "Play");
        assert!(config.play_button.args.is_empty());
        assert_eq!(config.custom_buttons[0].action, ButtonAction::Open);
    }

    #[test]
    fn test_engine_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.log_dir, "logs");
        assert_eq!(settings.backup_dir, "backups");
        assert!(settings.console_output);
        assert!(!settings.debug_mode);
    }
}
