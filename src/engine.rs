//! The engine facade.
//!
//! [`GameSettingsEngine`] is what a launcher UI talks to. It owns the
//! configuration manager, the path-variable table, the session, the backup
//! service and the per-path write locks, and wires the services together:
//!
//! ```text
//! load_schema ──► drafts + validation ──► apply_edit ──► save_schema
//!      │
//!      └──► extract_parameters ──► save_parameters
//! create_backup / list_backups / restore_backup / delete_backup
//! ```
//!
//! Results that the UI shows are returned; the session is updated as a side
//! effect and emits [`SessionChange`](crate::state::SessionChange) events.

use crate::config::ConfigManager;
use crate::error::write_file;
use crate::metrics::Metrics;
use crate::models::{
    DraftEdit, EngineSettings, GameSettingsConfig, GameSettingsFile, GameSettingsGroup,
    OptionDraft, UserMessage, ValidationErrors,
};
use crate::services::backup::{BackupError, BackupManifest, BackupService};
use crate::services::extraction::{
    ApplyReport, ExtractionReport, ParameterEdit, apply_values, extract, load_files,
    load_used_files,
};
use crate::services::locks::WriteLocks;
use crate::services::normalizer::{EditError, apply_draft_edit, draft_from_option, to_persisted_shape};
use crate::services::paths::{
    AnchorPaths, ModOrganizerSettings, PathVariable, PathVariableTable, same_location, to_native,
};
use crate::services::validation::{
    ValidationContext, clear_owner, record_parse_result, validate, validate_files,
    validate_groups, validate_option,
};
use crate::state::SessionManager;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Cannot save while {count} validation error(s) are pending")]
    ValidationPending { count: usize },

    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    #[error("Option '{0}' already exists")]
    DuplicateOption(String),

    #[error("Option '{option_id}' refers to unknown file '{file}'")]
    UnknownFile { option_id: String, file: String },

    #[error("Files '{first}' and '{second}' point to the same file on disk")]
    SharedFile { first: String, second: String },

    #[error(transparent)]
    Edit(#[from] EditError),
}

pub struct GameSettingsEngine {
    config: ConfigManager,
    settings: EngineSettings,
    anchors: AnchorPaths,
    paths: RwLock<PathVariableTable>,
    session: SessionManager,
    backups: BackupService,
    locks: WriteLocks,
    metrics: Arc<Metrics>,
}

impl GameSettingsEngine {
    /// Build the engine and resolve the path variables once.
    ///
    /// # Arguments
    /// * `config` - Manager of the directory holding `config.json` and `settings.json`
    /// * `settings` - Engine settings; the backup root is taken from here
    /// * `anchors` - Game folder and documents folder of this run
    pub async fn new(
        config: ConfigManager,
        settings: EngineSettings,
        anchors: AnchorPaths,
    ) -> Result<Self> {
        let locks = WriteLocks::new();
        let backups = BackupService::new(config.backup_dir(&settings), locks.clone());

        let engine = Self {
            config,
            settings,
            anchors,
            paths: RwLock::new(PathVariableTable::new()),
            session: SessionManager::new(),
            backups,
            locks,
            metrics: Arc::new(Metrics::new()),
        };
        engine.refresh_mod_organizer().await?;
        Ok(engine)
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    /// Snapshot of the current path variables.
    pub async fn paths(&self) -> PathVariableTable {
        self.paths.read().await.clone()
    }

    /// Rebuild the path variables from `config.json` and, when Mod Organizer
    /// is used, from `ModOrganizer.ini`. Returns the active profile.
    ///
    /// An unreadable `ModOrganizer.ini` is logged and treated as empty, which
    /// selects the default profile.
    pub async fn refresh_mod_organizer(&self) -> Result<Option<String>> {
        let launcher = self
            .config
            .load_launcher_config()
            .context("Failed to load launcher config")?;
        let mut table = PathVariableTable::from_anchors(&self.anchors, &launcher)
            .context("Failed to build path variables")?;

        if launcher.mod_organizer.is_used {
            let mo_settings = match table.get(PathVariable::MoIni) {
                Some(ini) => match ModOrganizerSettings::load(&to_native(ini)).await {
                    Ok(mo_settings) => mo_settings,
                    Err(e) => {
                        tracing::warn!("Failed to read Mod Organizer settings: {}", e);
                        ModOrganizerSettings::default()
                    }
                },
                None => ModOrganizerSettings::default(),
            };
            table
                .apply_mod_organizer(&launcher.mod_organizer, &mo_settings)
                .context("Failed to resolve Mod Organizer paths")?;
        }

        let profile = table.active_profile().map(str::to_string);
        *self.paths.write().await = table;
        self.session.set_active_profile(profile.clone());
        Ok(profile)
    }

    /// Load `settings.json` into the session and validate every option,
    /// group and file. Returns one warning per skipped option and per pending
    /// validation error.
    pub async fn load_schema(&self) -> Result<Vec<UserMessage>> {
        let (schema, rejected) = self
            .config
            .load_schema_checked()
            .context("Failed to load game settings")?;
        let drafts: IndexMap<String, OptionDraft> = schema
            .game_settings_options
            .iter()
            .map(|option| (option.id.clone(), draft_from_option(option)))
            .collect();

        let paths = self.paths().await;
        let errors = validate_schema(&schema, &drafts, &paths, &ValidationErrors::new());
        self.metrics.record_validation();

        let mut messages = vec![UserMessage::info(format!(
            "Loaded {} option(s) in {} file(s)",
            schema.game_settings_options.len(),
            schema.game_settings_files.len()
        ))];
        messages.extend(
            rejected
                .iter()
                .map(|e| UserMessage::warning(format!("{}; the option was skipped", e))),
        );
        messages.extend(errors.messages().into_iter().map(UserMessage::warning));

        self.session.load_schema(schema, drafts, errors);
        Ok(messages)
    }

    /// Read the current value of every option from the game's files.
    pub async fn extract_parameters(&self) -> Result<ExtractionReport> {
        let started = Instant::now();
        let schema = self.session.read(|s| s.schema.clone());
        let paths = self.paths().await;

        let files = load_used_files(&schema, &paths).await;
        let failed_files = files.values().filter(|f| f.is_err()).count();
        self.metrics
            .record_files_read(files.len() - failed_files, failed_files);

        let report = extract(&schema.game_settings_options, &files, paths.active_profile());
        self.metrics.record_extraction(
            schema.game_settings_options.len() - report.failures.len(),
            report.failures.len(),
            started.elapsed(),
        );

        tracing::info!(
            "Extracted {} parameter(s), {} option(s) failed",
            report.parameters.len(),
            report.failures.len()
        );
        self.session
            .set_parameters(report.parameters.clone(), report.failures.clone());
        Ok(report)
    }

    /// Apply one UI edit to the draft of `option_id` and re-validate.
    /// Returns the new error set.
    pub async fn apply_edit(&self, option_id: &str, edit: &DraftEdit) -> Result<ValidationErrors> {
        let paths = self.paths().await;
        let mut outcome = Err(EngineError::UnknownOption(option_id.to_string()));

        self.session.update(|state| {
            let Some(draft) = state.drafts.get_mut(option_id) else {
                return;
            };
            outcome = match apply_draft_edit(draft, edit) {
                Ok(applied) => {
                    let ctx = ValidationContext::new(&state.schema, Some(&paths));
                    let errors = validate(&applied.field, draft, &ctx, &state.errors);
                    state.errors = record_parse_result(&applied, option_id, &errors);
                    Ok(state.errors.clone())
                }
                Err(e) => Err(e.into()),
            };
        });

        self.metrics.record_validation();
        Ok(outcome?)
    }

    /// Add an empty option bound to `file`.
    pub async fn add_option(&self, option_id: &str, file: &str) -> Result<ValidationErrors> {
        let paths = self.paths().await;
        let mut outcome = Err(EngineError::DuplicateOption(option_id.to_string()));

        self.session.update(|state| {
            if state.drafts.contains_key(option_id) {
                return;
            }
            let draft = OptionDraft::new(option_id, file);
            let ctx = ValidationContext::new(&state.schema, Some(&paths));
            state.errors = validate_option(&draft, &ctx, &state.errors);
            state.drafts.insert(draft.id.clone(), draft);
            outcome = Ok(state.errors.clone());
        });

        Ok(outcome?)
    }

    /// Remove an option and every error it owns.
    pub fn remove_option(&self, option_id: &str) -> Result<ValidationErrors> {
        let mut outcome = Err(EngineError::UnknownOption(option_id.to_string()));

        self.session.update(|state| {
            if state.drafts.shift_remove(option_id).is_some() {
                state.errors = clear_owner(option_id, &state.errors);
                outcome = Ok(state.errors.clone());
            }
        });

        Ok(outcome?)
    }

    /// Replace the schema's groups and re-validate everything that refers
    /// to them.
    pub async fn update_groups(&self, groups: Vec<GameSettingsGroup>) -> Result<ValidationErrors> {
        let paths = self.paths().await;
        let mut errors = ValidationErrors::new();
        self.session.update(|state| {
            state.schema.game_settings_groups = groups;
            state.errors = validate_schema(&state.schema, &state.drafts, &paths, &state.errors);
            errors = state.errors.clone();
        });
        self.metrics.record_validation();
        Ok(errors)
    }

    /// Replace the schema's files and re-validate everything that refers
    /// to them.
    pub async fn update_files(&self, files: Vec<GameSettingsFile>) -> Result<ValidationErrors> {
        let paths = self.paths().await;
        let mut errors = ValidationErrors::new();
        self.session.update(|state| {
            state.schema.game_settings_files = files;
            state.errors = validate_schema(&state.schema, &state.drafts, &paths, &state.errors);
            errors = state.errors.clone();
        });
        self.metrics.record_validation();
        Ok(errors)
    }

    /// Project every draft to its persisted shape and write `settings.json`.
    ///
    /// # Errors
    /// [`EngineError::ValidationPending`] while any validation error exists.
    pub async fn save_schema(&self) -> Result<GameSettingsConfig> {
        let state = self.session.snapshot();
        if !state.can_save() {
            return Err(EngineError::ValidationPending {
                count: state.errors.len(),
            }
            .into());
        }

        let options = state
            .drafts
            .values()
            .map(|draft| {
                let file = state.schema.file_by_name(&draft.file).ok_or_else(|| {
                    EngineError::UnknownFile {
                        option_id: draft.id.clone(),
                        file: draft.file.clone(),
                    }
                })?;
                Ok(to_persisted_shape(draft, file))
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let mut schema = state.schema;
        schema.game_settings_options = options;
        self.config
            .save_schema(&schema)
            .context("Failed to save game settings")?;

        self.session.update(|s| s.schema = schema.clone());
        Ok(schema)
    }

    /// Write edited parameter values into the game's files.
    ///
    /// Every file involved is locked for the whole read-modify-write, and
    /// only files whose content changed are written. Edits that reach one
    /// file on disk through two schema files are refused.
    pub async fn save_parameters(&self, edits: &[ParameterEdit]) -> Result<ApplyReport> {
        let schema = self.session.read(|s| s.schema.clone());
        let paths = self.paths().await;

        let names: IndexSet<&str> = edits
            .iter()
            .filter_map(|e| schema.option_by_id(&e.option_id))
            .map(|o| o.file.as_str())
            .collect();
        let files: Vec<&GameSettingsFile> = names
            .iter()
            .filter_map(|name| schema.file_by_name(name))
            .collect();

        let resolved: Vec<(&str, Utf8PathBuf)> = files
            .iter()
            .filter_map(|f| {
                paths
                    .resolve_native(&f.path)
                    .ok()
                    .map(|p| (f.name.as_str(), p))
            })
            .collect();
        // Each would be loaded and written on its own, losing edits
        for (i, (name, path)) in resolved.iter().enumerate() {
            if let Some((first, _)) = resolved[..i]
                .iter()
                .find(|(_, other)| same_location(other.as_str(), path.as_str()))
            {
                return Err(EngineError::SharedFile {
                    first: first.to_string(),
                    second: name.to_string(),
                }
                .into());
            }
        }

        let mut targets: Vec<Utf8PathBuf> = resolved.into_iter().map(|(_, p)| p).collect();
        targets.sort();
        let mut guards = Vec::with_capacity(targets.len());
        for target in &targets {
            guards.push(self.locks.lock(target).await);
        }

        let mut loaded = load_files(files.iter().copied(), &schema, &paths).await;
        let report = apply_values(&schema.game_settings_options, &mut loaded, edits);

        let mut outputs = Vec::new();
        for name in &report.touched_files {
            if let Some(Ok(file)) = loaded.get(name) {
                let bytes = file
                    .to_bytes()
                    .with_context(|| format!("Failed to serialize {}", file.path))?;
                outputs.push((file.path.clone(), bytes));
            }
        }
        for (path, bytes) in &outputs {
            write_file(path, bytes)
                .await
                .with_context(|| format!("Failed to write {}", path))?;
            self.metrics.record_file_written();
            tracing::info!("Saved {}", path);
        }
        drop(guards);
        tracing::debug!("{} path lock(s) tracked", self.locks.tracked_paths().await);

        self.session.update(|state| {
            for (key, value) in &report.written {
                if let Some(parameter) = state.parameters.get_mut(key) {
                    parameter.value = value.clone();
                }
            }
        });
        Ok(report)
    }

    /// Back up every file of the schema that resolves to a path.
    pub async fn create_backup(&self) -> Result<BackupManifest> {
        let tracked = self.tracked_files().await;
        let manifest = self
            .backups
            .create_backup(&tracked)
            .await
            .context("Failed to create backup")?;

        self.metrics.record_backup();
        self.session
            .update(|s| s.backups.insert(0, manifest.name.clone()));
        Ok(manifest)
    }

    pub async fn list_backups(&self, cancel: &CancellationToken) -> Result<Vec<BackupManifest>> {
        let manifests = self
            .backups
            .list_backups(cancel)
            .await
            .context("Failed to list backups")?;
        self.session
            .set_backups(manifests.iter().map(|m| m.name.clone()).collect());
        Ok(manifests)
    }

    /// Restore `selected` files (all files when empty) from backup `name`.
    pub async fn restore_backup(&self, name: &str, selected: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>> {
        let manifests = self.list_backups(&CancellationToken::new()).await?;
        let manifest = manifests
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| BackupError::UnknownBackup(name.to_string()))?;

        let selected = if selected.is_empty() {
            manifest.originals()
        } else {
            selected.to_vec()
        };
        let restored = self
            .backups
            .restore(manifest, &selected)
            .await
            .with_context(|| format!("Failed to restore backup {}", name))?;

        self.metrics.record_restored(restored.len());
        Ok(restored)
    }

    pub async fn delete_backup(&self, name: &str) -> Result<()> {
        self.backups
            .delete_backup(name)
            .await
            .with_context(|| format!("Failed to delete backup {}", name))?;
        self.session.update(|s| s.backups.retain(|b| b != name));
        Ok(())
    }

    async fn tracked_files(&self) -> Vec<Utf8PathBuf> {
        let paths = self.paths().await;
        let mut tracked: Vec<Utf8PathBuf> = self.session.read(|s| {
            s.schema
                .game_settings_files
                .iter()
                .filter_map(|f| match paths.resolve_native(&f.path) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!("Not backing up '{}': {}", f.name, e);
                        None
                    }
                })
                .collect()
        });
        tracked.sort();
        tracked.dedup();
        tracked
    }
}

/// Validate every draft, group and file of `schema`.
fn validate_schema(
    schema: &GameSettingsConfig,
    drafts: &IndexMap<String, OptionDraft>,
    paths: &PathVariableTable,
    current: &ValidationErrors,
) -> ValidationErrors {
    let ctx = ValidationContext::new(schema, Some(paths));
    let mut errors = drafts
        .values()
        .fold(current.clone(), |errors, draft| validate_option(draft, &ctx, &errors));
    errors = validate_groups(&schema.game_settings_groups, &errors);
    validate_files(&schema.game_settings_files, Some(paths), &errors)
}
