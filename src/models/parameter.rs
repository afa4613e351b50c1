use super::schema::FieldName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a runtime parameter: the option and item it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamKey {
    pub option_id: String,
    pub item_id: String,
}

impl ParamKey {
    pub fn new(option_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            option_id: option_id.into(),
            item_id: item_id.into(),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.option_id, self.item_id)
    }
}

/// A value read from a game file, ready for the UI to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettingsParameter {
    /// Parameter name inside the file.
    pub name: String,
    /// Value found in the file at load time.
    pub default: String,
    /// Current (possibly edited) value.
    pub value: String,
    pub owner_option_id: String,
    pub owner_file_name: String,
}

/// One item of an option that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    /// `None` when the failure concerns the option as a whole (e.g. its file).
    pub item_id: Option<String>,
    pub field: FieldName,
    pub message: String,
}

/// Aggregated failure of one option during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionFailure {
    pub option_id: String,
    pub option_label: String,
    pub failures: Vec<ItemFailure>,
}

impl OptionFailure {
    pub fn summary(&self) -> String {
        let details = self
            .failures
            .iter()
            .map(|f| match &f.item_id {
                Some(item) => format!("[{}] {}: {}", item, f.field, f.message),
                None => format!("{}: {}", f.field, f.message),
            })
            .collect::<Vec<_>>()
            .join("; ");
        format!("Option '{}' was not loaded: {}", self.option_label, details)
    }
}
