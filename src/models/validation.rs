//! Validation error bag.
//!
//! Errors are keyed by `(owner, field)` and each key holds a set of
//! [`Cause`]s, so several conditions can be active on one field at the same
//! time and clearing one of them never touches the others.

use super::schema::FieldName;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The schema entity a validation error belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Owner {
    Option {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    Item {
        option_id: String,
        item_id: String,
    },
    File {
        id: String,
    },
    Group {
        name: String,
    },
}

impl Owner {
    pub fn option(id: impl Into<String>) -> Self {
        Self::Option { id: id.into() }
    }

    pub fn item(option_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self::Item {
            option_id: option_id.into(),
            item_id: item_id.into(),
        }
    }

    /// Whether this owner is the option `option_id` or one of its items.
    pub fn belongs_to_option(&self, option_id: &str) -> bool {
        match self {
            Self::Option { id } => id == option_id,
            Self::Item { option_id: id, .. } => id == option_id,
            _ => false,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Option { id } => write!(f, "option {}", id),
            Self::Item { option_id, item_id } => write!(f, "item {} of option {}", item_id, option_id),
            Self::File { id } => write!(f, "file {}", id),
            Self::Group { name } => write!(f, "group {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ErrorKey {
    pub owner: Owner,
    pub field: FieldName,
}

impl ErrorKey {
    pub fn new(owner: Owner, field: FieldName) -> Self {
        Self { owner, field }
    }
}

/// A field of an option draft, as addressed by an edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRef {
    /// `None` for option-level fields.
    pub item_id: Option<String>,
    pub field: FieldName,
}

impl FieldRef {
    pub fn option(field: FieldName) -> Self {
        Self {
            item_id: None,
            field,
        }
    }

    pub fn item(item_id: impl Into<String>, field: FieldName) -> Self {
        Self {
            item_id: Some(item_id.into()),
            field,
        }
    }

    /// The error key of this field inside option `option_id`.
    pub fn key(&self, option_id: &str) -> ErrorKey {
        let owner = match &self.item_id {
            Some(item_id) => Owner::item(option_id, item_id.as_str()),
            None => Owner::option(option_id),
        };
        ErrorKey::new(owner, self.field)
    }
}

/// Why a field is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cause {
    Empty,
    NotANumber,
    MinNotLessThanMax,
    StepNotPositive,
    /// A select line does not match `Label=Value` (or the combined template).
    TemplateMismatch,
    /// Fewer select pairs than required.
    LessThanMinimumQuantity,
    DuplicateLabel,
    DuplicateName,
    /// Two files resolve to the same file on disk.
    DuplicatePath,
    TooFewItems,
    InvalidSeparator,
    NotAlphanumeric,
    UnknownVariable,
    UnknownFile,
    UnknownGroup,
    /// Synthetic: at least one item of this composite option has an error.
    Item,
}

impl Cause {
    pub fn message(self) -> &'static str {
        match self {
            Self::Empty => "must not be empty",
            Self::NotANumber => "is not a number",
            Self::MinNotLessThanMax => "min must be less than max",
            Self::StepNotPositive => "step must be greater than zero",
            Self::TemplateMismatch => "does not match the value template",
            Self::LessThanMinimumQuantity => "less than minimum quantity",
            Self::DuplicateLabel => "contains duplicate labels",
            Self::DuplicateName => "duplicates another item",
            Self::DuplicatePath => "points to the same file as another entry",
            Self::TooFewItems => "has too few items",
            Self::InvalidSeparator => "is not an allowed separator",
            Self::NotAlphanumeric => "must contain only letters and digits",
            Self::UnknownVariable => "must start with a known path variable",
            Self::UnknownFile => "refers to an unknown file",
            Self::UnknownGroup => "refers to an unknown group",
            Self::Item => "has an invalid item",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One serializable row of [`ValidationErrors`], for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationEntry {
    pub owner: Owner,
    pub field: FieldName,
    pub causes: Vec<Cause>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: BTreeMap<ErrorKey, BTreeSet<Cause>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `cause` to `key`. Returns false if it was already present.
    pub fn insert(&mut self, key: ErrorKey, cause: Cause) -> bool {
        self.entries.entry(key).or_default().insert(cause)
    }

    /// Remove `cause` from `key`, dropping the key once it has no causes.
    pub fn remove(&mut self, key: &ErrorKey, cause: Cause) -> bool {
        let Some(causes) = self.entries.get_mut(key) else {
            return false;
        };
        let removed = causes.remove(&cause);
        if causes.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    pub fn set(&mut self, key: &ErrorKey, cause: Cause, active: bool) {
        if active {
            self.insert(key.clone(), cause);
        } else {
            self.remove(key, cause);
        }
    }

    pub fn contains(&self, key: &ErrorKey, cause: Cause) -> bool {
        self.entries.get(key).is_some_and(|c| c.contains(&cause))
    }

    pub fn causes(&self, key: &ErrorKey) -> Option<&BTreeSet<Cause>> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of erroneous fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ErrorKey, &BTreeSet<Cause>)> {
        self.entries.iter()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&ErrorKey) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    /// Drop every error of an option and its items.
    pub fn clear_option(&mut self, option_id: &str) {
        self.retain(|key| !key.owner.belongs_to_option(option_id));
    }

    pub fn has_option_errors(&self, option_id: &str) -> bool {
        self.entries
            .keys()
            .any(|key| key.owner.belongs_to_option(option_id))
    }

    pub fn has_item_errors(&self, option_id: &str) -> bool {
        self.entries.keys().any(|key| {
            matches!(&key.owner, Owner::Item { option_id: id, .. } if id == option_id)
        })
    }

    pub fn entries(&self) -> Vec<ValidationEntry> {
        self.entries
            .iter()
            .map(|(key, causes)| ValidationEntry {
                owner: key.owner.clone(),
                field: key.field,
                causes: causes.iter().copied().collect(),
            })
            .collect()
    }

    /// Human-readable lines, one per field and cause.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(key, causes)| {
                causes
                    .iter()
                    .map(move |cause| format!("{} {}: {}", key.owner, key.field, cause))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_key(id: &str) -> ErrorKey {
        ErrorKey::new(Owner::option(id), FieldName::Label)
    }

    #[test]
    fn test_insert_is_deduplicated() {
        let mut errors = ValidationErrors::new();
        assert!(errors.insert(label_key("a"), Cause::Empty));
        assert!(!errors.insert(label_key("a"), Cause::Empty));

        assert_eq!(errors.len(), 1);
        assert_eq!(errors.causes(&label_key("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_keeps_other_causes() {
        let key = ErrorKey::new(Owner::option("a"), FieldName::SelectOptions);
        let mut errors = ValidationErrors::new();
        errors.insert(key.clone(), Cause::TemplateMismatch);
        errors.insert(key.clone(), Cause::LessThanMinimumQuantity);

        errors.remove(&key, Cause::TemplateMismatch);
        assert!(errors.contains(&key, Cause::LessThanMinimumQuantity));
        assert!(!errors.contains(&key, Cause::TemplateMismatch));

        errors.remove(&key, Cause::LessThanMinimumQuantity);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_clear_option_does_not_cross_match() {
        let mut errors = ValidationErrors::new();
        errors.insert(label_key("opt-1"), Cause::Empty);
        errors.insert(label_key("opt-10"), Cause::Empty);
        errors.insert(
            ErrorKey::new(Owner::item("opt-1", "i"), FieldName::Name),
            Cause::Empty,
        );

        errors.clear_option("opt-1");

        assert_eq!(errors.len(), 1);
        assert!(errors.has_option_errors("opt-10"));
        assert!(!errors.has_option_errors("opt-1"));
    }

    #[test]
    fn test_messages_and_entries() {
        let mut errors = ValidationErrors::new();
        errors.insert(
            ErrorKey::new(Owner::item("opt", "i"), FieldName::IniGroup),
            Cause::Empty,
        );

        assert!(errors.has_item_errors("opt"));
        assert_eq!(
            errors.messages(),
            vec!["item i of option opt iniGroup: must not be empty".to_string()]
        );
        let entries = errors.entries();
        assert_eq!(entries[0].causes, vec![Cause::Empty]);
        let json = serde_json::to_value(&entries).unwrap();
        assert_eq!(json[0]["owner"]["kind"], "item");
        assert_eq!(json[0]["owner"]["optionId"], "opt");
        assert_eq!(json[0]["field"], "iniGroup");
    }
}
