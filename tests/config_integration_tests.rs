//! Integration tests for ConfigManager and the on-disk configuration files
//!
//! These tests verify:
//! - `settings.json` round trips through the typed schema
//! - The wire layout written back matches what launchers expect
//! - An option that cannot be represented is skipped, its siblings load
//! - `config.json` Mod Organizer defaults

use camino::Utf8PathBuf;
use game_settings_engine::error::FormatError;
use game_settings_engine::models::{Controller, ControllerType, ItemLocation, OptionKind};
use game_settings_engine::{ConfigManager, GameSettingsConfig};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

const FULL_SCHEMA: &str = r#"{
    "baseFilesEncoding": "win1251",
    "gameSettingsGroups": [
        { "name": "Video", "label": "Video" },
        { "name": "Audio", "label": "Audio" }
    ],
    "gameSettingsFiles": [
        { "id": "f1", "name": "prefs", "label": "Prefs", "path": "%DOCS_GAME%\\SkyrimPrefs.ini", "view": "sectional" },
        { "id": "f2", "name": "launcher", "label": "Launcher", "path": "%GAME_DIR%\\Launcher.xml", "view": "tag", "encoding": "utf-8" }
    ],
    "gameSettingsOptions": [
        {
            "id": "o1", "optionType": "default", "file": "prefs", "label": "Fullscreen",
            "settingGroup": "Video", "controllerType": "checkbox",
            "items": [{ "id": "i1", "name": "bFull Screen", "iniGroup": "Display" }]
        },
        {
            "id": "o2", "optionType": "group", "file": "prefs", "label": "Volume",
            "settingGroup": "Audio", "controllerType": "range", "min": 0, "max": 1, "step": 0.05,
            "items": [
                { "id": "i2", "name": "fVal0", "iniGroup": "AudioMenu" },
                { "id": "i3", "name": "fVal1", "iniGroup": "AudioMenu" }
            ]
        },
        {
            "id": "o3", "optionType": "related", "file": "launcher", "label": "Window",
            "items": [
                {
                    "id": "i4", "name": "Window", "valuePath": "Settings/Graphics", "valueName": "mode",
                    "controllerType": "select", "selectOptions": { "Windowed": "0", "Borderless": "1" }
                },
                {
                    "id": "i5", "name": "Window", "valuePath": "Settings/Graphics", "valueName": "vsync",
                    "controllerType": "switcher"
                }
            ]
        },
        {
            "id": "o4", "optionType": "combined", "file": "prefs", "label": "Resolution",
            "separator": "x", "selectOptions": { "HD": "1280x720" },
            "items": [
                { "id": "i6", "name": "iSize W", "iniGroup": "Display" },
                { "id": "i7", "name": "iSize H", "iniGroup": "Display" }
            ]
        }
    ]
}"#;

#[test]
fn test_invalid_option_does_not_block_its_siblings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join("settings.json"), FULL_SCHEMA).unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let (schema, rejected) = manager.load_schema_checked().unwrap();

    let ids: Vec<&str> = schema
        .game_settings_options
        .iter()
        .map(|o| o.id.as_str())
        .collect();
    assert_eq!(ids, vec!["o1", "o2", "o3"]);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].id, "o4");
    assert!(rejected[0].reason.contains("separator"));

    assert_eq!(manager.load_schema().unwrap(), schema);
}

#[test]
fn test_unparsable_schema_is_malformed() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join("settings.json"), "[1, 2").unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let err = manager.load_schema().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::MalformedJson { .. })
    ));
}

fn valid_schema() -> String {
    FULL_SCHEMA
        .replace(r#""separator": "x""#, r#""separator": ":""#)
        .replace("1280x720", "1280:720")
}

#[test]
fn test_load_full_schema() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join("settings.json"), valid_schema()).unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let schema = manager.load_schema().unwrap();

    assert_eq!(schema.game_settings_options.len(), 4);
    assert_eq!(schema.encoding_for(schema.file_by_name("prefs").unwrap()), "win1251");
    assert_eq!(schema.encoding_for(schema.file_by_name("launcher").unwrap()), "utf-8");

    let volume = schema.option_by_id("o2").unwrap();
    assert!(matches!(
        volume.kind,
        OptionKind::Group {
            controller: Controller::Range { step, .. },
            ..
        } if step == 0.05
    ));

    let window = schema.option_by_id("o3").unwrap();
    let OptionKind::Related { items } = &window.kind else {
        panic!("expected related option");
    };
    assert_eq!(items[0].controller.controller_type(), ControllerType::Select);
    assert_eq!(items[1].controller, Controller::Switcher);
    assert_eq!(
        items[1].item.location,
        ItemLocation::Tag {
            value_path: "Settings/Graphics".to_string(),
            value_name: "vsync".to_string(),
        }
    );

    let resolution = schema.option_by_id("o4").unwrap();
    assert!(matches!(resolution.kind, OptionKind::Combined { separator: ':', .. }));
}

#[test]
fn test_schema_save_load_round_trip() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join("settings.json"), valid_schema()).unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let schema = manager.load_schema().unwrap();
    manager.save_schema(&schema).unwrap();
    let reloaded = manager.load_schema().unwrap();

    assert_eq!(schema, reloaded);
}

#[test]
fn test_saved_schema_wire_layout() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join("settings.json"), valid_schema()).unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let schema = manager.load_schema().unwrap();
    manager.save_schema(&schema).unwrap();

    let written = fs::read_to_string(manager.schema_path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    let options = json["gameSettingsOptions"].as_array().unwrap();

    assert_eq!(options[0]["optionType"], "default");
    assert_eq!(options[0]["items"][0]["iniGroup"], "Display");
    assert!(options[0]["items"][0].get("controllerType").is_none());

    assert_eq!(options[2]["items"][0]["controllerType"], "select");
    assert!(options[2].get("controllerType").is_none());

    assert_eq!(options[3]["controllerType"], "select");
    assert_eq!(options[3]["separator"], ":");
}

#[test]
fn test_load_schema_from_other_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let other = config_path.join("import.json");
    fs::write(&other, valid_schema()).unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let schema = manager.load_schema_from(&other).unwrap();
    assert_eq!(schema.game_settings_groups.len(), 2);

    let err = manager
        .load_schema_from(&config_path.join("import.yaml"))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::WrongExtension { .. })
    ));
}

#[test]
fn test_missing_schema_is_empty() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let schema = manager.load_schema().unwrap();
    assert_eq!(schema, GameSettingsConfig::default());
    assert!(schema.game_settings_options.is_empty());
}

#[test]
fn test_launcher_config_mod_organizer_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join("config.json"),
        r#"{ "documentsPath": "%DOCUMENTS%\\My Games\\Skyrim", "modOrganizer": { "isUsed": true } }"#,
    )
    .unwrap();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = manager.load_launcher_config().unwrap();
    assert!(config.mod_organizer.is_used);
    assert_eq!(config.mod_organizer.path_to_mo_folder, "%GAME_DIR%\\Mod Organizer");
    assert_eq!(config.mod_organizer.path_to_ini, "%MO_DIR%\\ModOrganizer.ini");
    assert_eq!(config.mod_organizer.path_to_profiles, "%MO_DIR%\\profiles");
    assert_eq!(config.documents_path, "%DOCUMENTS%\\My Games\\Skyrim");
}

#[test]
fn test_config_dir_is_created() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("launcher").join("config");

    let manager = ConfigManager::new(&nested).unwrap();
    assert!(nested.exists());
    assert_eq!(manager.config_dir(), &nested);
}
