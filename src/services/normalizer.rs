//! Conversion between the editable draft of an option and its persisted form.
//!
//! - [`to_full_shape`] overlays a persisted option on the previous draft so
//!   fields hidden by the current type survive.
//! - [`to_persisted_shape`] projects a draft to exactly what the option type,
//!   controller type and file view need. It is total and idempotent.
//! - [`apply_draft_edit`] applies one UI edit to a draft.

use crate::models::{
    ControlledItem, Controller, ControllerDraft, ControllerType, DraftEdit, FieldName, FieldRef,
    FileView, GameSettingsFile, GameSettingsOption, ItemDraft, ItemLocation, OptionDraft,
    OptionItem, OptionKind, OptionType, SEPARATORS, format_select_options, parse_select_options,
    parse_separator,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Item '{item_id}' does not exist")]
    UnknownItem { item_id: String },

    #[error("Item '{item_id}' already exists")]
    DuplicateItem { item_id: String },

    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: FieldName, value: String },

    #[error("Field {field} cannot be edited this way")]
    NotEditable { field: FieldName },
}

/// Result of a successful [`apply_draft_edit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    pub field: FieldRef,
    /// The value of a numeric field did not parse; the draft kept its old
    /// number and the field should carry a `NotANumber` cause.
    pub parse_failed: bool,
}

/// Full draft of a persisted option, with every hidden field at its default.
pub fn draft_from_option(option: &GameSettingsOption) -> OptionDraft {
    let mut draft = OptionDraft::new(option.id.clone(), option.file.clone());
    draft.option_type = option.option_type();
    draft.label = option.label.clone();
    draft.description = option.description.clone();
    draft.setting_group = option.setting_group.clone().unwrap_or_default();

    match &option.kind {
        OptionKind::Default { controller, item } => {
            merge_controller(&mut draft.controller, controller);
            draft.items = vec![item_draft(None, item)];
        }
        OptionKind::Group { controller, items } => {
            merge_controller(&mut draft.controller, controller);
            draft.items = items.iter().map(|i| item_draft(None, i)).collect();
        }
        OptionKind::Related { items } => {
            draft.items = items
                .iter()
                .map(|c| {
                    let mut item = item_draft(None, &c.item);
                    merge_controller(&mut item.controller, &c.controller);
                    item
                })
                .collect();
        }
        OptionKind::Combined {
            separator,
            options,
            items,
        } => {
            draft.controller.controller_type = ControllerType::Select;
            draft.controller.select_options = format_select_options(options);
            draft.separator = separator.to_string();
            draft.items = items.iter().map(|i| item_draft(None, i)).collect();
        }
    }

    draft
}

/// Overlay `edited` on `previous`.
///
/// Every field `edited` carries wins; fields `edited` does not carry keep
/// their previous values. Items are matched by id and `edited` decides
/// which items exist and in which order.
pub fn to_full_shape(previous: &OptionDraft, edited: &GameSettingsOption) -> OptionDraft {
    let mut full = previous.clone();
    full.id = edited.id.clone();
    full.option_type = edited.option_type();
    full.file = edited.file.clone();
    full.label = edited.label.clone();
    full.description = edited.description.clone();
    full.setting_group = edited.setting_group.clone().unwrap_or_default();

    let previous_item = |id: &str| previous.item(id);

    match &edited.kind {
        OptionKind::Default { controller, item } => {
            merge_controller(&mut full.controller, controller);
            full.items = vec![item_draft(previous_item(&item.id), item)];
        }
        OptionKind::Group { controller, items } => {
            merge_controller(&mut full.controller, controller);
            full.items = items
                .iter()
                .map(|i| item_draft(previous_item(&i.id), i))
                .collect();
        }
        OptionKind::Related { items } => {
            full.items = items
                .iter()
                .map(|c| {
                    let mut item = item_draft(previous_item(&c.item.id), &c.item);
                    merge_controller(&mut item.controller, &c.controller);
                    item
                })
                .collect();
        }
        OptionKind::Combined {
            separator,
            options,
            items,
        } => {
            full.controller.controller_type = ControllerType::Select;
            full.controller.select_options = format_select_options(options);
            full.separator = separator.to_string();
            full.items = items
                .iter()
                .map(|i| item_draft(previous_item(&i.id), i))
                .collect();
        }
    }

    full
}

/// Project a draft to the persisted shape for `file`.
///
/// Never fails: a Default option without items gets an empty item and an
/// invalid separator falls back to the first allowed one. Both are reported
/// by the validator before a schema is saved.
pub fn to_persisted_shape(full: &OptionDraft, file: &GameSettingsFile) -> GameSettingsOption {
    let item = |draft: &ItemDraft| persisted_item(draft, file.view);

    let kind = match full.option_type {
        OptionType::Default => OptionKind::Default {
            controller: persisted_controller(&full.controller),
            item: full
                .items
                .first()
                .map(item)
                .unwrap_or_else(|| item(&ItemDraft::new(""))),
        },
        OptionType::Group => OptionKind::Group {
            controller: persisted_controller(&full.controller),
            items: full.items.iter().map(item).collect(),
        },
        OptionType::Related => OptionKind::Related {
            items: full
                .items
                .iter()
                .map(|draft| ControlledItem {
                    item: item(draft),
                    controller: persisted_controller(&draft.controller),
                })
                .collect(),
        },
        OptionType::Combined => OptionKind::Combined {
            separator: parse_separator(&full.separator).unwrap_or(SEPARATORS[0]),
            options: parse_select_options(&full.controller.select_options),
            items: full.items.iter().map(item).collect(),
        },
    };

    let setting_group = full.setting_group.trim();
    GameSettingsOption {
        id: full.id.clone(),
        file: full.file.clone(),
        label: full.label.clone(),
        description: full.description.clone(),
        setting_group: (!setting_group.is_empty()).then(|| setting_group.to_string()),
        kind,
    }
}

/// Apply one UI edit to `draft`.
///
/// # Errors
///
/// Structural problems (unknown or duplicate item, unparsable option or
/// controller type) are returned as [`EditError`]. An unparsable number is
/// not an error here: the draft keeps its previous number and the returned
/// [`AppliedEdit`] says the parse failed.
pub fn apply_draft_edit(draft: &mut OptionDraft, edit: &DraftEdit) -> Result<AppliedEdit, EditError> {
    match edit {
        DraftEdit::AddItem { item_id } => {
            if draft.item(item_id).is_some() {
                return Err(EditError::DuplicateItem {
                    item_id: item_id.clone(),
                });
            }
            draft.items.push(ItemDraft::new(item_id.clone()));
            Ok(applied(FieldRef::option(FieldName::Items)))
        }
        DraftEdit::RemoveItem { item_id } => {
            let before = draft.items.len();
            draft.items.retain(|i| &i.id != item_id);
            if draft.items.len() == before {
                return Err(EditError::UnknownItem {
                    item_id: item_id.clone(),
                });
            }
            Ok(applied(FieldRef::option(FieldName::Items)))
        }
        DraftEdit::Set {
            item_id: None,
            field,
            value,
        } => set_option_field(draft, *field, value),
        DraftEdit::Set {
            item_id: Some(item_id),
            field,
            value,
        } => {
            let item = draft
                .item_mut(item_id)
                .ok_or_else(|| EditError::UnknownItem {
                    item_id: item_id.clone(),
                })?;
            set_item_field(item, *field, value)
        }
    }
}

fn set_option_field(
    draft: &mut OptionDraft,
    field: FieldName,
    value: &str,
) -> Result<AppliedEdit, EditError> {
    let field_ref = FieldRef::option(field);
    match field {
        FieldName::Label => draft.label = value.to_string(),
        FieldName::Description => draft.description = value.to_string(),
        FieldName::File => draft.file = value.trim().to_string(),
        FieldName::SettingGroup => draft.setting_group = value.trim().to_string(),
        FieldName::Separator => draft.separator = value.to_string(),
        FieldName::OptionType => {
            draft.option_type = value.parse().map_err(|_| EditError::InvalidValue {
                field,
                value: value.to_string(),
            })?;
        }
        FieldName::ControllerType | FieldName::Min | FieldName::Max | FieldName::Step
        | FieldName::SelectOptions => {
            return set_controller_field(&mut draft.controller, field_ref, value);
        }
        _ => return Err(EditError::NotEditable { field }),
    }
    Ok(applied(field_ref))
}

fn set_item_field(item: &mut ItemDraft, field: FieldName, value: &str) -> Result<AppliedEdit, EditError> {
    let field_ref = FieldRef::item(item.id.clone(), field);
    match field {
        FieldName::Name => item.name = value.trim().to_string(),
        FieldName::IniGroup => item.ini_group = value.trim().to_string(),
        FieldName::ValuePath => item.value_path = value.trim().to_string(),
        FieldName::ValueName => item.value_name = value.trim().to_string(),
        FieldName::ControllerType | FieldName::Min | FieldName::Max | FieldName::Step
        | FieldName::SelectOptions => {
            return set_controller_field(&mut item.controller, field_ref, value);
        }
        _ => return Err(EditError::NotEditable { field }),
    }
    Ok(applied(field_ref))
}

fn set_controller_field(
    controller: &mut ControllerDraft,
    field_ref: FieldRef,
    value: &str,
) -> Result<AppliedEdit, EditError> {
    let field = field_ref.field;
    let number = |slot: &mut f64| match parse_number(value) {
        Some(n) => {
            *slot = n;
            false
        }
        None => true,
    };

    let parse_failed = match field {
        FieldName::ControllerType => {
            controller.controller_type = value.parse().map_err(|_| EditError::InvalidValue {
                field,
                value: value.to_string(),
            })?;
            false
        }
        FieldName::Min => number(&mut controller.min),
        FieldName::Max => number(&mut controller.max),
        FieldName::Step => number(&mut controller.step),
        FieldName::SelectOptions => {
            controller.select_options = value.to_string();
            false
        }
        _ => return Err(EditError::NotEditable { field }),
    };

    Ok(AppliedEdit {
        field: field_ref,
        parse_failed,
    })
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn applied(field: FieldRef) -> AppliedEdit {
    AppliedEdit {
        field,
        parse_failed: false,
    }
}

/// Merge a persisted controller into a draft controller, keeping the draft
/// fields the controller does not carry.
fn merge_controller(draft: &mut ControllerDraft, controller: &Controller) {
    draft.controller_type = controller.controller_type();
    match controller {
        Controller::Checkbox | Controller::Switcher => {}
        Controller::Range { min, max, step } => {
            draft.min = *min;
            draft.max = *max;
            draft.step = *step;
        }
        Controller::Select { options } => {
            draft.select_options = format_select_options(options);
        }
    }
}

fn item_draft(previous: Option<&ItemDraft>, item: &OptionItem) -> ItemDraft {
    let mut draft = previous
        .cloned()
        .unwrap_or_else(|| ItemDraft::new(item.id.clone()));
    draft.id = item.id.clone();
    draft.name = item.name.clone();
    match &item.location {
        ItemLocation::Sectional { ini_group } => draft.ini_group = ini_group.clone(),
        ItemLocation::Line => {}
        ItemLocation::Tag {
            value_path,
            value_name,
        } => {
            draft.value_path = value_path.clone();
            draft.value_name = value_name.clone();
        }
    }
    draft
}

fn persisted_controller(draft: &ControllerDraft) -> Controller {
    match draft.controller_type {
        ControllerType::Checkbox => Controller::Checkbox,
        ControllerType::Switcher => Controller::Switcher,
        ControllerType::Range => Controller::Range {
            min: draft.min,
            max: draft.max,
            step: draft.step,
        },
        ControllerType::Select => Controller::Select {
            options: parse_select_options(&draft.select_options),
        },
    }
}

fn persisted_item(draft: &ItemDraft, view: FileView) -> OptionItem {
    let location = match view {
        FileView::Sectional => ItemLocation::Sectional {
            ini_group: draft.ini_group.clone(),
        },
        FileView::Line => ItemLocation::Line,
        FileView::Tag => ItemLocation::Tag {
            value_path: draft.value_path.clone(),
            value_name: draft.value_name.clone(),
        },
    };
    OptionItem {
        id: draft.id.clone(),
        name: draft.name.clone(),
        location,
    }
}
