//! Field validator.
//!
//! [`validate`] takes the field that was just edited and returns the new
//! error bag. It only re-evaluates the keys the edit can influence, and every
//! rule owns a fixed set of causes on its key: a rule that no longer fires
//! removes its own causes and leaves any other cause on the same key alone.
//! Running it twice with the same input gives the same result.

use crate::models::{
    Cause, ControllerDraft, ControllerType, ErrorKey, FieldName, FieldRef, FileView,
    GameSettingsConfig, GameSettingsFile, GameSettingsGroup, ItemDraft, OptionDraft, OptionType,
    Owner, ValidationErrors, parse_separator,
};
use crate::services::normalizer::AppliedEdit;
use crate::services::paths::{PathVariableTable, same_location};
use std::collections::HashSet;

const OPTION_FIELDS: [FieldName; 9] = [
    FieldName::Label,
    FieldName::File,
    FieldName::SettingGroup,
    FieldName::Separator,
    FieldName::SelectOptions,
    FieldName::Min,
    FieldName::Max,
    FieldName::Step,
    FieldName::Items,
];

const ITEM_FIELDS: [FieldName; 8] = [
    FieldName::Name,
    FieldName::IniGroup,
    FieldName::ValuePath,
    FieldName::ValueName,
    FieldName::SelectOptions,
    FieldName::Min,
    FieldName::Max,
    FieldName::Step,
];

/// Minimum number of `Label=Value` pairs in a select.
pub const MIN_SELECT_OPTIONS: usize = 2;

/// What the rules may look at besides the option itself.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub schema: &'a GameSettingsConfig,
    /// Used to check file path tokens; without it only the token syntax is
    /// checked.
    pub paths: Option<&'a PathVariableTable>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(schema: &'a GameSettingsConfig, paths: Option<&'a PathVariableTable>) -> Self {
        Self { schema, paths }
    }

    fn file(&self, name: &str) -> Option<&'a GameSettingsFile> {
        self.schema.file_by_name(name)
    }
}

/// Re-validate after `field` of `draft` changed.
pub fn validate(
    field: &FieldRef,
    draft: &OptionDraft,
    ctx: &ValidationContext<'_>,
    current: &ValidationErrors,
) -> ValidationErrors {
    let keys = affected_keys(field, draft);
    let mut errors = current.clone();
    drop_removed_items(&mut errors, draft);
    for key in &keys {
        evaluate_into(&mut errors, key, draft, ctx);
    }
    update_item_marker(&mut errors, draft);
    errors
}

/// Record or clear a failed number parse reported by the normalizer.
pub fn record_parse_result(
    applied: &AppliedEdit,
    option_id: &str,
    current: &ValidationErrors,
) -> ValidationErrors {
    let mut errors = current.clone();
    errors.set(
        &applied.field.key(option_id),
        Cause::NotANumber,
        applied.parse_failed,
    );
    errors
}

/// Re-validate every field of one option. Keys of items that no longer
/// exist are dropped.
pub fn validate_option(
    draft: &OptionDraft,
    ctx: &ValidationContext<'_>,
    current: &ValidationErrors,
) -> ValidationErrors {
    let mut errors = current.clone();
    drop_removed_items(&mut errors, draft);
    for key in all_keys(draft) {
        evaluate_into(&mut errors, &key, draft, ctx);
    }
    update_item_marker(&mut errors, draft);
    errors
}

/// Remove every error of an option and its items.
pub fn clear_owner(option_id: &str, current: &ValidationErrors) -> ValidationErrors {
    let mut errors = current.clone();
    errors.clear_option(option_id);
    errors
}

/// Check all groups: `name` non-empty, alphanumeric and unique.
pub fn validate_groups(groups: &[GameSettingsGroup], current: &ValidationErrors) -> ValidationErrors {
    let mut errors = current.clone();
    errors.retain(|key| !matches!(key.owner, Owner::Group { .. }));

    let mut seen = HashSet::new();
    for group in groups {
        let key = ErrorKey::new(
            Owner::Group {
                name: group.name.clone(),
            },
            FieldName::Name,
        );
        let name = group.name.trim();
        errors.set(&key, Cause::Empty, name.is_empty());
        errors.set(
            &key,
            Cause::NotAlphanumeric,
            !name.is_empty() && !name.chars().all(char::is_alphanumeric),
        );
        errors.set(&key, Cause::DuplicateName, !seen.insert(name.to_string()));

        let label_key = ErrorKey::new(
            Owner::Group {
                name: group.name.clone(),
            },
            FieldName::Label,
        );
        errors.set(&label_key, Cause::Empty, group.label.trim().is_empty());
    }
    errors
}

/// Check all files: `name` non-empty and unique, `path` starting with a
/// known path variable and not pointing at another entry's file. Paths are
/// compared resolved when a table is given, as written otherwise.
pub fn validate_files(
    files: &[GameSettingsFile],
    paths: Option<&PathVariableTable>,
    current: &ValidationErrors,
) -> ValidationErrors {
    let mut errors = current.clone();
    errors.retain(|key| !matches!(key.owner, Owner::File { .. }));

    let mut seen = HashSet::new();
    let mut locations: Vec<String> = Vec::new();
    for file in files {
        let owner = Owner::File {
            id: file.id.clone(),
        };
        let name_key = ErrorKey::new(owner.clone(), FieldName::Name);
        let name = file.name.trim();
        errors.set(&name_key, Cause::Empty, name.is_empty());
        errors.set(
            &name_key,
            Cause::DuplicateName,
            !name.is_empty() && !seen.insert(name.to_string()),
        );

        let path_key = ErrorKey::new(owner, FieldName::Path);
        let path = file.path.trim();
        let known = match paths {
            Some(table) => table.has_known_token(path),
            None => has_token_syntax(path),
        };
        errors.set(&path_key, Cause::Empty, path.is_empty());
        errors.set(&path_key, Cause::UnknownVariable, !path.is_empty() && !known);

        let location = match paths {
            Some(table) => table.resolve(path).ok().map(|p| p.into_string()),
            None => Some(path.to_string()),
        };
        let shared = match location {
            Some(location) if !path.is_empty() && known => {
                let shared = locations.iter().any(|l| same_location(l, &location));
                locations.push(location);
                shared
            }
            _ => false,
        };
        errors.set(&path_key, Cause::DuplicatePath, shared);
    }
    errors
}

fn has_token_syntax(path: &str) -> bool {
    path.strip_prefix('%')
        .and_then(|rest| rest.split_once('%'))
        .is_some_and(|(name, _)| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
        })
}

fn affected_keys(field: &FieldRef, draft: &OptionDraft) -> Vec<ErrorKey> {
    let option = |f: FieldName| ErrorKey::new(Owner::option(draft.id.as_str()), f);
    let item = |id: &str, f: FieldName| ErrorKey::new(Owner::item(draft.id.as_str(), id), f);
    let all_names = || {
        draft
            .items
            .iter()
            .map(|i| item(&i.id, FieldName::Name))
            .collect::<Vec<_>>()
    };

    match &field.item_id {
        None => match field.field {
            FieldName::Label => vec![option(FieldName::Label)],
            FieldName::SettingGroup => vec![option(FieldName::SettingGroup)],
            FieldName::Separator => vec![
                option(FieldName::Separator),
                option(FieldName::SelectOptions),
            ],
            FieldName::SelectOptions => vec![option(FieldName::SelectOptions)],
            FieldName::Min | FieldName::Max | FieldName::Step => vec![
                option(FieldName::Min),
                option(FieldName::Max),
                option(FieldName::Step),
            ],
            FieldName::File
            | FieldName::OptionType
            | FieldName::ControllerType
            | FieldName::Items => all_keys(draft),
            _ => Vec::new(),
        },
        Some(item_id) => match field.field {
            FieldName::Name | FieldName::IniGroup | FieldName::ValuePath | FieldName::ValueName => {
                let mut keys = vec![item(item_id, field.field)];
                keys.extend(all_names());
                keys
            }
            FieldName::ControllerType => vec![
                item(item_id, FieldName::SelectOptions),
                item(item_id, FieldName::Min),
                item(item_id, FieldName::Max),
                item(item_id, FieldName::Step),
            ],
            FieldName::Min | FieldName::Max | FieldName::Step => vec![
                item(item_id, FieldName::Min),
                item(item_id, FieldName::Max),
                item(item_id, FieldName::Step),
            ],
            FieldName::SelectOptions => vec![item(item_id, FieldName::SelectOptions)],
            _ => Vec::new(),
        },
    }
}

fn all_keys(draft: &OptionDraft) -> Vec<ErrorKey> {
    let mut keys: Vec<ErrorKey> = OPTION_FIELDS
        .iter()
        .map(|f| ErrorKey::new(Owner::option(draft.id.as_str()), *f))
        .collect();
    for item in &draft.items {
        keys.extend(
            ITEM_FIELDS
                .iter()
                .map(|f| ErrorKey::new(Owner::item(draft.id.as_str(), item.id.as_str()), *f)),
        );
    }
    keys
}

fn drop_removed_items(errors: &mut ValidationErrors, draft: &OptionDraft) {
    errors.retain(|key| match &key.owner {
        Owner::Item { option_id, item_id } if *option_id == draft.id => {
            draft.item(item_id).is_some()
        }
        _ => true,
    });
}

fn update_item_marker(errors: &mut ValidationErrors, draft: &OptionDraft) {
    let key = ErrorKey::new(Owner::option(draft.id.as_str()), FieldName::Items);
    let active = draft.option_type.is_composite() && errors.has_item_errors(&draft.id);
    errors.set(&key, Cause::Item, active);
}

fn evaluate_into(
    errors: &mut ValidationErrors,
    key: &ErrorKey,
    draft: &OptionDraft,
    ctx: &ValidationContext<'_>,
) {
    for (cause, active) in evaluate(key, draft, ctx) {
        errors.set(key, cause, active);
    }
}

/// Every cause the rule for `key` owns, with whether it currently fires.
fn evaluate(key: &ErrorKey, draft: &OptionDraft, ctx: &ValidationContext<'_>) -> Vec<(Cause, bool)> {
    let view = ctx.file(&draft.file).map(|f| f.view);

    match &key.owner {
        Owner::Option { .. } => evaluate_option_field(key.field, draft, ctx),
        Owner::Item { item_id, .. } => match draft.item(item_id) {
            Some(item) => evaluate_item_field(key.field, item, draft, view),
            None => Vec::new(),
        },
        Owner::File { .. } | Owner::Group { .. } => Vec::new(),
    }
}

fn evaluate_option_field(
    field: FieldName,
    draft: &OptionDraft,
    ctx: &ValidationContext<'_>,
) -> Vec<(Cause, bool)> {
    match field {
        FieldName::Label => vec![(Cause::Empty, draft.label.trim().is_empty())],
        FieldName::File => {
            let empty = draft.file.trim().is_empty();
            vec![
                (Cause::Empty, empty),
                (Cause::UnknownFile, !empty && ctx.file(&draft.file).is_none()),
            ]
        }
        FieldName::SettingGroup => {
            let group = draft.setting_group.trim();
            vec![(
                Cause::UnknownGroup,
                !group.is_empty() && ctx.schema.group_by_name(group).is_none(),
            )]
        }
        FieldName::Separator => vec![(
            Cause::InvalidSeparator,
            draft.option_type == OptionType::Combined && parse_separator(&draft.separator).is_none(),
        )],
        FieldName::SelectOptions => {
            let active = draft.effective_controller_type() == Some(ControllerType::Select);
            let arity = (draft.option_type == OptionType::Combined)
                .then(|| (draft.items.len(), parse_separator(&draft.separator)));
            select_causes(&draft.controller.select_options, arity, active)
        }
        FieldName::Min | FieldName::Max | FieldName::Step => {
            let active = matches!(draft.option_type, OptionType::Default | OptionType::Group);
            range_causes(field, &draft.controller, active)
        }
        FieldName::Items => vec![(
            Cause::TooFewItems,
            draft.items.len() < draft.option_type.min_items(),
        )],
        _ => Vec::new(),
    }
}

fn evaluate_item_field(
    field: FieldName,
    item: &ItemDraft,
    draft: &OptionDraft,
    view: Option<FileView>,
) -> Vec<(Cause, bool)> {
    let related = draft.option_type == OptionType::Related;
    match field {
        FieldName::Name => {
            let empty = item.name.trim().is_empty();
            let duplicate = !empty
                && draft.option_type.is_composite()
                && draft
                    .items
                    .iter()
                    .filter(|other| other.id != item.id)
                    .any(|other| identity(other, view) == identity(item, view));
            vec![(Cause::Empty, empty), (Cause::DuplicateName, duplicate)]
        }
        FieldName::IniGroup => vec![(
            Cause::Empty,
            view == Some(FileView::Sectional) && item.ini_group.trim().is_empty(),
        )],
        FieldName::ValuePath => vec![(
            Cause::Empty,
            view == Some(FileView::Tag) && item.value_path.trim().is_empty(),
        )],
        FieldName::ValueName => vec![(
            Cause::Empty,
            view == Some(FileView::Tag) && item.value_name.trim().is_empty(),
        )],
        FieldName::SelectOptions => select_causes(
            &item.controller.select_options,
            None,
            related && item.controller.controller_type == ControllerType::Select,
        ),
        FieldName::Min | FieldName::Max | FieldName::Step => {
            range_causes(field, &item.controller, related)
        }
        _ => Vec::new(),
    }
}

/// What makes two items the same parameter of the same file.
fn identity(item: &ItemDraft, view: Option<FileView>) -> Vec<String> {
    let name = item.name.trim().to_ascii_lowercase();
    match view {
        Some(FileView::Sectional) => vec![item.ini_group.trim().to_ascii_lowercase(), name],
        Some(FileView::Tag) => vec![
            item.value_path.trim().to_string(),
            item.name.trim().to_string(),
            item.value_name.trim().to_string(),
        ],
        Some(FileView::Line) | None => vec![name],
    }
}

fn range_causes(field: FieldName, controller: &ControllerDraft, active: bool) -> Vec<(Cause, bool)> {
    let active = active && controller.controller_type == ControllerType::Range;
    match field {
        FieldName::Min | FieldName::Max => vec![(
            Cause::MinNotLessThanMax,
            active && controller.min >= controller.max,
        )],
        FieldName::Step => vec![(Cause::StepNotPositive, active && controller.step <= 0.0)],
        _ => Vec::new(),
    }
}

/// Causes of a select text.
///
/// `combined` carries the item count and separator of a Combined option:
/// each value must then have exactly one part per item.
fn select_causes(
    text: &str,
    combined: Option<(usize, Option<char>)>,
    active: bool,
) -> Vec<(Cause, bool)> {
    let mut mismatch = false;
    let mut labels = HashSet::new();
    let mut duplicate = false;
    let mut pairs = 0;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let Some((label, value)) = line.split_once('=') else {
            mismatch = true;
            continue;
        };
        let label = label.trim();
        let fits = !label.is_empty()
            && match combined {
                Some((arity, Some(separator))) => value.split(separator).count() == arity,
                Some((_, None)) => false,
                None => true,
            };
        if !fits {
            mismatch = true;
            continue;
        }
        pairs += 1;
        if !labels.insert(label.to_string()) {
            duplicate = true;
        }
    }

    vec![
        (Cause::TemplateMismatch, active && mismatch),
        (Cause::LessThanMinimumQuantity, active && pairs < MIN_SELECT_OPTIONS),
        (Cause::DuplicateLabel, active && duplicate),
    ]
}
