//! Full editable shape of an option.
//!
//! While an operator edits an option every field stays populated, including
//! the ones the current option type, controller or file view hides. This lets
//! the operator flip between types without losing what was typed. The draft
//! is projected to a [`GameSettingsOption`](super::GameSettingsOption) by
//! [`to_persisted_shape`](crate::services::normalizer::to_persisted_shape).

use super::schema::{ControllerType, FieldName, OptionType, SEPARATORS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerDraft {
    pub controller_type: ControllerType,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// `Label=Value` lines, exactly as typed.
    pub select_options: String,
}

impl Default for ControllerDraft {
    fn default() -> Self {
        Self {
            controller_type: ControllerType::Checkbox,
            min: 0.0,
            max: 100.0,
            step: 1.0,
            select_options: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub id: String,
    pub name: String,
    pub ini_group: String,
    pub value_path: String,
    pub value_name: String,
    pub controller: ControllerDraft,
}

impl ItemDraft {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            ini_group: String::new(),
            value_path: String::new(),
            value_name: String::new(),
            controller: ControllerDraft::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    pub id: String,
    pub option_type: OptionType,
    pub file: String,
    pub label: String,
    pub description: String,
    /// Empty when the option is not in a group.
    pub setting_group: String,
    /// Option-level controller (Default, Group, Combined).
    pub controller: ControllerDraft,
    pub separator: String,
    pub items: Vec<ItemDraft>,
}

impl OptionDraft {
    pub fn new(id: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            option_type: OptionType::Default,
            file: file.into(),
            label: String::new(),
            description: String::new(),
            setting_group: String::new(),
            controller: ControllerDraft::default(),
            separator: SEPARATORS[0].to_string(),
            items: Vec::new(),
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&ItemDraft> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut ItemDraft> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    /// Controller that applies to `item_id` under the current option type.
    pub fn controller_for(&self, item_id: Option<&str>) -> Option<&ControllerDraft> {
        match (self.option_type, item_id) {
            (OptionType::Related, Some(id)) => self.item(id).map(|i| &i.controller),
            (OptionType::Related, None) => None,
            (_, None) => Some(&self.controller),
            (_, Some(_)) => None,
        }
    }

    /// Effective controller type; Combined options are always selects.
    pub fn effective_controller_type(&self) -> Option<ControllerType> {
        match self.option_type {
            OptionType::Related => None,
            OptionType::Combined => Some(ControllerType::Select),
            _ => Some(self.controller.controller_type),
        }
    }
}

/// A single edit coming from the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DraftEdit {
    /// Set `field` of the option (`item_id == None`) or of one item.
    #[serde(rename_all = "camelCase")]
    Set {
        item_id: Option<String>,
        field: FieldName,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    AddItem { item_id: String },
    #[serde(rename_all = "camelCase")]
    RemoveItem { item_id: String },
}

/// Parse `Label=Value` lines into an ordered map.
///
/// Lines without `=` and blank lines are ignored here; the validator reports
/// them. Labels and values are trimmed; the first occurrence of a label wins.
pub fn parse_select_options(text: &str) -> IndexMap<String, String> {
    let mut options = IndexMap::new();
    for line in text.lines() {
        let Some((label, value)) = line.split_once('=') else {
            continue;
        };
        let label = label.trim();
        if label.is_empty() || options.contains_key(label) {
            continue;
        }
        options.insert(label.to_string(), value.trim().to_string());
    }
    options
}

/// Inverse of [`parse_select_options`].
pub fn format_select_options(options: &IndexMap<String, String>) -> String {
    options
        .iter()
        .map(|(label, value)| format!("{}={}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
}
