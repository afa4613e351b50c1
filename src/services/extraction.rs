//! Parameter extraction: reading the current value of every option from the
//! game's files, and writing edited values back.
//!
//! Options are independent of each other. A composite option (Group,
//! Related, Combined) either yields a parameter for every item or none at
//! all, with one aggregated failure listing every item that could not be
//! resolved.

use crate::adapters::{LoadedFile, Locator, adapter_for};
use crate::error::{FormatError, IoError, read_file};
use crate::models::{
    FieldName, GameSettingsConfig, GameSettingsFile, GameSettingsOption, GameSettingsParameter,
    ItemFailure, OptionFailure, OptionKind, OptionItem, ParamKey, UserMessage,
};
use crate::services::paths::{PathError, PathVariable, PathVariableTable};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::task::JoinSet;

/// Why a managed file could not be loaded.
#[derive(Error, Debug)]
pub enum FileLoadError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Loading '{0}' was interrupted")]
    Interrupted(String),
}

/// Loaded files by file name.
pub type LoadedFiles = HashMap<String, Result<LoadedFile, FileLoadError>>;

/// Read and parse one managed file.
pub async fn load_file(
    file: GameSettingsFile,
    paths: &PathVariableTable,
    encoding: String,
    line_delimiters: &str,
) -> Result<LoadedFile, FileLoadError> {
    let path = paths.resolve_native(&file.path)?;
    let bytes = read_file(&path).await?;
    let adapter = adapter_for(file.view, line_delimiters);
    let parsed = adapter.read(&bytes, &encoding)?;
    tracing::debug!("Loaded {} ({} bytes, {})", path, bytes.len(), encoding);

    Ok(LoadedFile {
        file,
        path,
        encoding,
        adapter,
        parsed,
    })
}

/// Load the given files concurrently and collect them by name.
pub async fn load_files<'a>(
    files: impl IntoIterator<Item = &'a GameSettingsFile>,
    schema: &GameSettingsConfig,
    paths: &PathVariableTable,
) -> LoadedFiles {
    let mut tasks = JoinSet::new();
    let mut names = Vec::new();

    for file in files {
        let file = file.clone();
        let encoding = schema.encoding_for(&file).to_string();
        let delimiters = schema.line_delimiters.clone();
        let paths = paths.clone();
        names.push(file.name.clone());

        tasks.spawn(async move {
            let name = file.name.clone();
            let result = load_file(file, &paths, encoding, &delimiters).await;
            (name, result)
        });
    }

    let mut loaded = LoadedFiles::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, result)) => {
                if let Err(e) = &result {
                    tracing::warn!("Failed to load '{}': {}", name, e);
                }
                loaded.insert(name, result);
            }
            Err(e) => tracing::error!("File loading task failed: {}", e),
        }
    }

    for name in names {
        if !loaded.contains_key(&name) {
            loaded.insert(name.clone(), Err(FileLoadError::Interrupted(name)));
        }
    }
    loaded
}

/// Load every file referenced by at least one option.
pub async fn load_used_files(schema: &GameSettingsConfig, paths: &PathVariableTable) -> LoadedFiles {
    load_files(schema.used_files(), schema, paths).await
}

/// Outcome of [`extract`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    /// Resolved parameters in schema order.
    pub parameters: IndexMap<ParamKey, GameSettingsParameter>,
    /// One entry per option that could not be resolved.
    pub failures: Vec<OptionFailure>,
}

impl ExtractionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Parameters of one option, in item order.
    pub fn option_parameters(&self, option_id: &str) -> Vec<&GameSettingsParameter> {
        self.parameters
            .iter()
            .filter(|(key, _)| key.option_id == option_id)
            .map(|(_, p)| p)
            .collect()
    }

    /// One message per failed option: an error when its file could not be
    /// loaded, a warning when only some of its values are missing.
    pub fn messages(&self) -> Vec<UserMessage> {
        self.failures
            .iter()
            .map(|f| {
                if f.failures.iter().any(|i| i.field == FieldName::File) {
                    UserMessage::error(f.summary())
                } else {
                    UserMessage::warning(f.summary())
                }
            })
            .collect()
    }
}

/// Find the current value of every option in `files`.
///
/// `active_profile` only enriches failure messages of files that live in a
/// Mod Organizer profile.
pub fn extract(
    options: &[GameSettingsOption],
    files: &LoadedFiles,
    active_profile: Option<&str>,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for option in options {
        match resolve_option(option, files, active_profile) {
            Ok(parameters) => {
                tracing::debug!(
                    "Option '{}' resolved to {} parameter(s)",
                    option.id,
                    parameters.len()
                );
                report.parameters.extend(parameters);
            }
            Err(failures) => {
                let failure = OptionFailure {
                    option_id: option.id.clone(),
                    option_label: option.label.clone(),
                    failures,
                };
                tracing::warn!("{}", failure.summary());
                report.failures.push(failure);
            }
        }
    }

    tracing::info!(
        "Extracted {} parameter(s), {} option(s) failed",
        report.parameters.len(),
        report.failures.len()
    );
    report
}

fn resolve_option(
    option: &GameSettingsOption,
    files: &LoadedFiles,
    active_profile: Option<&str>,
) -> Result<Vec<(ParamKey, GameSettingsParameter)>, Vec<ItemFailure>> {
    let loaded = match files.get(&option.file) {
        Some(Ok(loaded)) => loaded,
        Some(Err(e)) => {
            return Err(vec![ItemFailure {
                item_id: None,
                field: FieldName::File,
                message: e.to_string(),
            }]);
        }
        None => {
            return Err(vec![ItemFailure {
                item_id: None,
                field: FieldName::File,
                message: format!("File '{}' is not available", option.file),
            }]);
        }
    };

    let note = profile_note(&loaded.file, active_profile);
    let mut parameters = Vec::new();
    let mut failures = Vec::new();

    for item in option.items() {
        let value = Locator::for_item(item, loaded.file.view).and_then(|l| loaded.get(&l));
        match value {
            Ok(value) => parameters.push((
                ParamKey::new(option.id.as_str(), item.id.as_str()),
                GameSettingsParameter {
                    name: item.name.clone(),
                    default: value.clone(),
                    value,
                    owner_option_id: option.id.clone(),
                    owner_file_name: option.file.clone(),
                },
            )),
            Err(e) => failures.push(ItemFailure {
                item_id: Some(item.id.clone()),
                field: e.field(),
                message: format!("{}{}", e, note),
            }),
        }
    }

    if failures.is_empty() {
        Ok(parameters)
    } else {
        Err(failures)
    }
}

fn profile_note(file: &GameSettingsFile, active_profile: Option<&str>) -> String {
    match active_profile {
        Some(profile) if file.path.starts_with(&PathVariable::MoProfile.token()) => {
            format!(" (Mod Organizer profile '{}')", profile)
        }
        _ => String::new(),
    }
}

/// A new value for an option, or for one item of a Related option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEdit {
    pub option_id: String,
    /// Required for Related options, ignored otherwise.
    #[serde(default)]
    pub item_id: Option<String>,
    pub value: String,
}

/// Outcome of [`apply_values`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Values written, per item.
    pub written: Vec<(ParamKey, String)>,
    /// Names of the files that were modified.
    pub touched_files: IndexSet<String>,
    pub failures: Vec<OptionFailure>,
}

/// Write `edits` into the loaded files.
///
/// Group options write the same value to every item; Combined options split
/// the value on their separator, one part per item. An edit either updates
/// every item of its option or none.
pub fn apply_values(
    options: &[GameSettingsOption],
    files: &mut LoadedFiles,
    edits: &[ParameterEdit],
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for edit in edits {
        let Some(option) = options.iter().find(|o| o.id == edit.option_id) else {
            tracing::warn!("Ignoring value for unknown option '{}'", edit.option_id);
            continue;
        };

        let outcome = item_values(option, edit).and_then(|values| {
            let loaded = match files.get_mut(&option.file) {
                Some(Ok(loaded)) => loaded,
                Some(Err(e)) => return Err(file_failure(e.to_string())),
                None => {
                    return Err(file_failure(format!(
                        "File '{}' is not available",
                        option.file
                    )));
                }
            };
            write_items(loaded, &values)?;
            Ok(values)
        });

        match outcome {
            Ok(values) => {
                report.touched_files.insert(option.file.clone());
                report.written.extend(values.into_iter().map(|(item, value)| {
                    (ParamKey::new(option.id.as_str(), item.id.as_str()), value)
                }));
            }
            Err(failure) => report.failures.push(OptionFailure {
                option_id: option.id.clone(),
                option_label: option.label.clone(),
                failures: vec![failure],
            }),
        }
    }

    report
}

fn file_failure(message: String) -> ItemFailure {
    ItemFailure {
        item_id: None,
        field: FieldName::File,
        message,
    }
}

/// Split one edit into per-item values.
fn item_values<'a>(
    option: &'a GameSettingsOption,
    edit: &ParameterEdit,
) -> Result<Vec<(&'a OptionItem, String)>, ItemFailure> {
    match &option.kind {
        OptionKind::Default { item, .. } => Ok(vec![(item, edit.value.clone())]),
        OptionKind::Group { items, .. } => {
            Ok(items.iter().map(|i| (i, edit.value.clone())).collect())
        }
        OptionKind::Related { items } => {
            let item_id = edit.item_id.as_deref().unwrap_or_default();
            items
                .iter()
                .find(|c| c.item.id == item_id)
                .map(|c| vec![(&c.item, edit.value.clone())])
                .ok_or_else(|| ItemFailure {
                    item_id: edit.item_id.clone(),
                    field: FieldName::Items,
                    message: format!("Item '{}' does not exist", item_id),
                })
        }
        OptionKind::Combined {
            separator, items, ..
        } => {
            let parts: Vec<&str> = edit.value.split(*separator).collect();
            if parts.len() != items.len() {
                return Err(ItemFailure {
                    item_id: None,
                    field: FieldName::SelectOptions,
                    message: format!(
                        "Value '{}' has {} part(s), expected {}",
                        edit.value,
                        parts.len(),
                        items.len()
                    ),
                });
            }
            Ok(items
                .iter()
                .zip(parts)
                .map(|(i, part)| (i, part.to_string()))
                .collect())
        }
    }
}

/// Write all values or none. Values are set on a copy of the document that
/// replaces the loaded one only once every item was written.
fn write_items(loaded: &mut LoadedFile, values: &[(&OptionItem, String)]) -> Result<(), ItemFailure> {
    let locators = values
        .iter()
        .map(|(item, _)| {
            Locator::for_item(item, loaded.file.view).map_err(|e| ItemFailure {
                item_id: Some(item.id.clone()),
                field: e.field(),
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut staged = loaded.parsed.boxed_clone();
    for (locator, (item, value)) in locators.iter().zip(values) {
        loaded
            .adapter
            .set(staged.as_mut(), locator, value)
            .map_err(|e| ItemFailure {
                item_id: Some(item.id.clone()),
                field: e.field(),
                message: e.to_string(),
            })?;
    }
    loaded.parsed = staged;
    Ok(())
}
