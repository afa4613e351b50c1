//! Game settings schema: files, groups and options as stored in `settings.json`.
//!
//! Options are held as an explicit union ([`OptionKind`]) so every
//! combination of option type and controller only carries the fields it
//! uses. The JSON file keeps the flat layout the launcher has always written;
//! conversion happens at the serde boundary through [`RawOption`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Characters allowed as the value separator of a combined option.
pub const SEPARATORS: [char; 5] = [',', ';', ':', '|', '/'];

/// Default encoding of game config files when neither the file nor the
/// schema says otherwise.
pub const DEFAULT_FILES_ENCODING: &str = "win1251";

/// Default delimiter characters for [`FileView::Line`] files.
pub const DEFAULT_LINE_DELIMITERS: &str = "= ";

/// Textual format of a managed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileView {
    /// `[Section]` + `key=value` lines.
    Sectional,
    /// Flat `key<delimiter>value` lines.
    Line,
    /// Nested tags with attributes (XML).
    Tag,
}

impl fmt::Display for FileView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sectional => "sectional",
            Self::Line => "line",
            Self::Tag => "tag",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Default,
    Group,
    Related,
    Combined,
}

impl OptionType {
    /// Whether the option spans several file parameters.
    pub fn is_composite(self) -> bool {
        !matches!(self, Self::Default)
    }

    /// Whether the option carries one controller at option level.
    pub fn has_option_controller(self) -> bool {
        !matches!(self, Self::Related)
    }

    pub fn min_items(self) -> usize {
        match self {
            Self::Combined => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerType {
    Checkbox,
    Range,
    Select,
    Switcher,
}

impl OptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Group => "group",
            Self::Related => "related",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "group" => Ok(Self::Group),
            "related" => Ok(Self::Related),
            "combined" => Ok(Self::Combined),
            other => Err(format!("unknown option type '{}'", other)),
        }
    }
}

impl ControllerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checkbox => "checkbox",
            Self::Range => "range",
            Self::Select => "select",
            Self::Switcher => "switcher",
        }
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checkbox" => Ok(Self::Checkbox),
            "range" => Ok(Self::Range),
            "select" => Ok(Self::Select),
            "switcher" => Ok(Self::Switcher),
            other => Err(format!("unknown controller type '{}'", other)),
        }
    }
}

/// Schema field names, used to point lookup and validation errors at the
/// exact input the operator has to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    Id,
    Label,
    Description,
    File,
    SettingGroup,
    OptionType,
    ControllerType,
    Separator,
    Items,
    Name,
    IniGroup,
    ValueName,
    ValuePath,
    Min,
    Max,
    Step,
    SelectOptions,
    Path,
    View,
    Encoding,
}

impl FieldName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Label => "label",
            Self::Description => "description",
            Self::File => "file",
            Self::SettingGroup => "settingGroup",
            Self::OptionType => "optionType",
            Self::ControllerType => "controllerType",
            Self::Separator => "separator",
            Self::Items => "items",
            Self::Name => "name",
            Self::IniGroup => "iniGroup",
            Self::ValueName => "valueName",
            Self::ValuePath => "valuePath",
            Self::Min => "min",
            Self::Max => "max",
            Self::Step => "step",
            Self::SelectOptions => "selectOptions",
            Self::Path => "path",
            Self::View => "view",
            Self::Encoding => "encoding",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file the launcher manages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettingsFile {
    pub id: String,
    pub name: String,
    pub label: String,
    /// Path template starting with a path variable, e.g. `%DOCS_GAME%\Skyrim.ini`.
    pub path: String,
    pub view: FileView,
    /// Overrides the schema-wide encoding when not empty.
    #[serde(default)]
    pub encoding: String,
}

impl GameSettingsFile {
    pub fn effective_encoding<'a>(&'a self, default: &'a str) -> &'a str {
        if self.encoding.trim().is_empty() {
            default
        } else {
            &self.encoding
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettingsGroup {
    pub name: String,
    pub label: String,
}

/// How an option presents its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Controller {
    Checkbox,
    Switcher,
    Range { min: f64, max: f64, step: f64 },
    Select { options: IndexMap<String, String> },
}

impl Controller {
    pub fn controller_type(&self) -> ControllerType {
        match self {
            Self::Checkbox => ControllerType::Checkbox,
            Self::Switcher => ControllerType::Switcher,
            Self::Range { .. } => ControllerType::Range,
            Self::Select { .. } => ControllerType::Select,
        }
    }
}

/// Where an item lives inside its file, per file view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemLocation {
    Sectional { ini_group: String },
    Line,
    Tag { value_path: String, value_name: String },
}

impl ItemLocation {
    pub fn view(&self) -> FileView {
        match self {
            Self::Sectional { .. } => FileView::Sectional,
            Self::Line => FileView::Line,
            Self::Tag { .. } => FileView::Tag,
        }
    }
}

/// A single file-resident parameter referenced by an option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionItem {
    pub id: String,
    /// Parameter key or tag name inside the file.
    pub name: String,
    pub location: ItemLocation,
}

/// An item that brings its own controller (Related options).
#[derive(Debug, Clone, PartialEq)]
pub struct ControlledItem {
    pub item: OptionItem,
    pub controller: Controller,
}

/// The option-type specific part of an option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// One parameter, one control.
    Default {
        controller: Controller,
        item: OptionItem,
    },
    /// One control writing the same value to every item.
    Group {
        controller: Controller,
        items: Vec<OptionItem>,
    },
    /// Several parameters shown together, each with its own control.
    Related { items: Vec<ControlledItem> },
    /// One select whose values are `separator`-joined tuples, one part per item.
    Combined {
        separator: char,
        options: IndexMap<String, String>,
        items: Vec<OptionItem>,
    },
}

/// The persisted schema unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOption", into = "RawOption")]
pub struct GameSettingsOption {
    pub id: String,
    /// `name` of the [`GameSettingsFile`] this option reads from.
    pub file: String,
    pub label: String,
    pub description: String,
    pub setting_group: Option<String>,
    pub kind: OptionKind,
}

impl GameSettingsOption {
    pub fn option_type(&self) -> OptionType {
        match self.kind {
            OptionKind::Default { .. } => OptionType::Default,
            OptionKind::Group { .. } => OptionType::Group,
            OptionKind::Related { .. } => OptionType::Related,
            OptionKind::Combined { .. } => OptionType::Combined,
        }
    }

    /// Controller at option level; `None` for Related options.
    pub fn controller_type(&self) -> Option<ControllerType> {
        match &self.kind {
            OptionKind::Default { controller, .. } | OptionKind::Group { controller, .. } => {
                Some(controller.controller_type())
            }
            OptionKind::Related { .. } => None,
            OptionKind::Combined { .. } => Some(ControllerType::Select),
        }
    }

    /// All file parameters of the option, in declaration order.
    pub fn items(&self) -> Vec<&OptionItem> {
        match &self.kind {
            OptionKind::Default { item, .. } => vec![item],
            OptionKind::Group { items, .. } | OptionKind::Combined { items, .. } => {
                items.iter().collect()
            }
            OptionKind::Related { items } => items.iter().map(|c| &c.item).collect(),
        }
    }
}

/// Whole `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettingsConfig {
    #[serde(default = "default_files_encoding")]
    pub base_files_encoding: String,

    #[serde(default = "default_line_delimiters")]
    pub line_delimiters: String,

    #[serde(default)]
    pub game_settings_groups: Vec<GameSettingsGroup>,

    #[serde(default)]
    pub game_settings_files: Vec<GameSettingsFile>,

    #[serde(default)]
    pub game_settings_options: Vec<GameSettingsOption>,
}

impl Default for GameSettingsConfig {
    fn default() -> Self {
        Self {
            base_files_encoding: default_files_encoding(),
            line_delimiters: default_line_delimiters(),
            game_settings_groups: Vec::new(),
            game_settings_files: Vec::new(),
            game_settings_options: Vec::new(),
        }
    }
}

fn default_files_encoding() -> String {
    DEFAULT_FILES_ENCODING.to_string()
}

fn default_line_delimiters() -> String {
    DEFAULT_LINE_DELIMITERS.to_string()
}

impl GameSettingsConfig {
    pub fn file_by_name(&self, name: &str) -> Option<&GameSettingsFile> {
        self.game_settings_files.iter().find(|f| f.name == name)
    }

    pub fn option_by_id(&self, id: &str) -> Option<&GameSettingsOption> {
        self.game_settings_options.iter().find(|o| o.id == id)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&GameSettingsGroup> {
        self.game_settings_groups.iter().find(|g| g.name == name)
    }

    /// Encoding used for `file`, falling back to `baseFilesEncoding`.
    pub fn encoding_for<'a>(&'a self, file: &'a GameSettingsFile) -> &'a str {
        file.effective_encoding(&self.base_files_encoding)
    }

    /// Files referenced by at least one option, in file declaration order.
    pub fn used_files(&self) -> Vec<&GameSettingsFile> {
        self.game_settings_files
            .iter()
            .filter(|f| self.game_settings_options.iter().any(|o| o.file == f.name))
            .collect()
    }

    /// Parse `settings.json` option by option.
    ///
    /// Options that cannot be represented are returned as [`SchemaError`]s and
    /// left out of the schema; everything else still loads. Only a document
    /// that is not JSON, or whose files and groups are invalid, fails as a
    /// whole.
    pub fn from_json_per_option(text: &str) -> serde_json::Result<(Self, Vec<SchemaError>)> {
        let mut document: serde_json::Value = serde_json::from_str(text)?;
        let raw_options = document
            .as_object_mut()
            .and_then(|fields| fields.remove("gameSettingsOptions"));
        let mut schema: Self = serde_json::from_value(document)?;

        let raw_options = match raw_options {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(options)) => options,
            Some(_) => {
                return Err(serde::de::Error::custom(
                    "gameSettingsOptions must be an array",
                ));
            }
        };

        let mut rejected = Vec::new();
        for raw in raw_options {
            let id = raw
                .get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            let option = serde_json::from_value::<RawOption>(raw)
                .map_err(|e| SchemaError {
                    id,
                    reason: e.to_string(),
                })
                .and_then(GameSettingsOption::try_from);
            match option {
                Ok(option) => schema.game_settings_options.push(option),
                Err(e) => rejected.push(e),
            }
        }
        Ok((schema, rejected))
    }
}

/// A persisted option that cannot be represented.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid option '{id}': {reason}")]
pub struct SchemaError {
    pub id: String,
    pub reason: String,
}

/// Flat JSON layout of an option.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOption {
    pub id: String,
    pub option_type: Option<OptionType>,
    pub file: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_type: Option<ControllerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_options: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// Flat JSON layout of an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ini_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_type: Option<ControllerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_options: Option<IndexMap<String, String>>,
}

struct ControllerFields<'a> {
    controller_type: Option<ControllerType>,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
    select_options: Option<&'a IndexMap<String, String>>,
}

fn controller_from_fields(fields: ControllerFields<'_>) -> Result<Controller, String> {
    match fields.controller_type {
        None => Err("missing controllerType".to_string()),
        Some(ControllerType::Checkbox) => Ok(Controller::Checkbox),
        Some(ControllerType::Switcher) => Ok(Controller::Switcher),
        Some(ControllerType::Range) => match (fields.min, fields.max, fields.step) {
            (Some(min), Some(max), Some(step)) => Ok(Controller::Range { min, max, step }),
            _ => Err("range controller needs min, max and step".to_string()),
        },
        Some(ControllerType::Select) => Ok(Controller::Select {
            options: fields.select_options.cloned().unwrap_or_default(),
        }),
    }
}

fn controller_into_fields(
    controller: Controller,
) -> (
    Option<ControllerType>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<IndexMap<String, String>>,
) {
    let controller_type = Some(controller.controller_type());
    match controller {
        Controller::Checkbox | Controller::Switcher => (controller_type, None, None, None, None),
        Controller::Range { min, max, step } => {
            (controller_type, Some(min), Some(max), Some(step), None)
        }
        Controller::Select { options } => (controller_type, None, None, None, Some(options)),
    }
}

impl RawItem {
    fn to_item(&self) -> OptionItem {
        let location = if let Some(ini_group) = &self.ini_group {
            ItemLocation::Sectional {
                ini_group: ini_group.clone(),
            }
        } else if self.value_path.is_some() || self.value_name.is_some() {
            ItemLocation::Tag {
                value_path: self.value_path.clone().unwrap_or_default(),
                value_name: self.value_name.clone().unwrap_or_default(),
            }
        } else {
            ItemLocation::Line
        };

        OptionItem {
            id: self.id.clone(),
            name: self.name.clone(),
            location,
        }
    }

    fn controller(&self) -> Result<Controller, String> {
        controller_from_fields(ControllerFields {
            controller_type: self.controller_type,
            min: self.min,
            max: self.max,
            step: self.step,
            select_options: self.select_options.as_ref(),
        })
        .map_err(|reason| format!("item '{}': {}", self.id, reason))
    }

    fn from_item(item: OptionItem) -> Self {
        let mut raw = Self {
            id: item.id,
            name: item.name,
            ..Self::default()
        };
        match item.location {
            ItemLocation::Sectional { ini_group } => raw.ini_group = Some(ini_group),
            ItemLocation::Line => {}
            ItemLocation::Tag {
                value_path,
                value_name,
            } => {
                raw.value_path = Some(value_path);
                raw.value_name = Some(value_name);
            }
        }
        raw
    }

    fn with_controller(mut self, controller: Controller) -> Self {
        let (controller_type, min, max, step, select_options) = controller_into_fields(controller);
        self.controller_type = controller_type;
        self.min = min;
        self.max = max;
        self.step = step;
        self.select_options = select_options;
        self
    }
}

impl TryFrom<RawOption> for GameSettingsOption {
    type Error = SchemaError;

    fn try_from(raw: RawOption) -> Result<Self, Self::Error> {
        let fail = |reason: String| SchemaError {
            id: raw.id.clone(),
            reason,
        };

        let option_type = raw.option_type.unwrap_or(OptionType::Default);
        let option_controller = || {
            controller_from_fields(ControllerFields {
                controller_type: raw.controller_type,
                min: raw.min,
                max: raw.max,
                step: raw.step,
                select_options: raw.select_options.as_ref(),
            })
        };

        let kind = match option_type {
            OptionType::Default => {
                let [item] = raw.items.as_slice() else {
                    return Err(fail(format!(
                        "default option needs exactly one item, found {}",
                        raw.items.len()
                    )));
                };
                OptionKind::Default {
                    controller: option_controller().map_err(fail)?,
                    item: item.to_item(),
                }
            }
            OptionType::Group => OptionKind::Group {
                controller: option_controller().map_err(fail)?,
                items: raw.items.iter().map(RawItem::to_item).collect(),
            },
            OptionType::Related => OptionKind::Related {
                items: raw
                    .items
                    .iter()
                    .map(|item| {
                        Ok(ControlledItem {
                            item: item.to_item(),
                            controller: item.controller()?,
                        })
                    })
                    .collect::<Result<_, String>>()
                    .map_err(fail)?,
            },
            OptionType::Combined => {
                let separator = raw
                    .separator
                    .as_deref()
                    .and_then(parse_separator)
                    .ok_or_else(|| {
                        fail(format!(
                            "combined option needs a separator out of {:?}",
                            SEPARATORS
                        ))
                    })?;
                OptionKind::Combined {
                    separator,
                    options: raw.select_options.clone().unwrap_or_default(),
                    items: raw.items.iter().map(RawItem::to_item).collect(),
                }
            }
        };

        Ok(Self {
            id: raw.id,
            file: raw.file,
            label: raw.label,
            description: raw.description,
            setting_group: raw.setting_group.filter(|g| !g.is_empty()),
            kind,
        })
    }
}

impl From<GameSettingsOption> for RawOption {
    fn from(option: GameSettingsOption) -> Self {
        let option_type = option.option_type();
        let mut raw = Self {
            id: option.id,
            option_type: Some(option_type),
            file: option.file,
            label: option.label,
            description: option.description,
            setting_group: option.setting_group,
            ..Self::default()
        };

        let with_option_controller = |mut raw: Self, controller: Controller| {
            let (controller_type, min, max, step, select_options) =
                controller_into_fields(controller);
            raw.controller_type = controller_type;
            raw.min = min;
            raw.max = max;
            raw.step = step;
            raw.select_options = select_options;
            raw
        };

        match option.kind {
            OptionKind::Default { controller, item } => {
                raw.items = vec![RawItem::from_item(item)];
                with_option_controller(raw, controller)
            }
            OptionKind::Group { controller, items } => {
                raw.items = items.into_iter().map(RawItem::from_item).collect();
                with_option_controller(raw, controller)
            }
            OptionKind::Related { items } => {
                raw.items = items
                    .into_iter()
                    .map(|c| RawItem::from_item(c.item).with_controller(c.controller))
                    .collect();
                raw
            }
            OptionKind::Combined {
                separator,
                options,
                items,
            } => {
                raw.items = items.into_iter().map(RawItem::from_item).collect();
                raw.separator = Some(separator.to_string());
                raw.controller_type = Some(ControllerType::Select);
                raw.select_options = Some(options);
                raw
            }
        }
    }
}

/// Accept a separator only if it is a single character out of [`SEPARATORS`].
pub fn parse_separator(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if SEPARATORS.contains(&c) => Some(c),
        _ => None,
    }
}
