// Session state management
//
// SessionManager wraps SessionState with thread-safe access using
// Arc<RwLock<T>> and emits change events for whoever presents the session.

use crate::models::{
    GameSettingsConfig, GameSettingsParameter, OptionDraft, OptionFailure, ParamKey,
    SessionState, ValidationErrors,
};
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when the session is modified
#[derive(Clone, Debug, PartialEq)]
pub enum SessionChange {
    /// A schema was loaded (or replaced after saving)
    SchemaLoaded { options: usize, files: usize },

    /// The draft of an option was created or edited
    DraftChanged { option_id: String },

    /// An option was removed from the session
    DraftRemoved { option_id: String },

    /// The set of validation errors changed
    ValidationChanged { error_count: usize, can_save: bool },

    /// Parameters were re-read from the game's files
    ParametersChanged { resolved: usize, failed: usize },

    /// The list of backups changed
    BackupsChanged { count: usize },

    /// The Mod Organizer profile changed
    ProfileChanged { profile: Option<String> },
}

/// Thread-safe session manager with event emission
///
/// - [`read()`](Self::read) for reading state under the read lock
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to session changes
pub struct SessionManager {
    state: Arc<RwLock<SessionState>>,
    change_tx: broadcast::Sender<SessionChange>,
}

impl SessionManager {
    /// Create a new SessionManager with an empty session and a broadcast
    /// buffer of 100 events
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            change_tx,
        }
    }

    /// Clone of the whole session.
    pub fn snapshot(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the session
    ///
    /// # Example
    /// ```ignore
    /// let can_save = session.read(|state| state.can_save());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the session and emit change events
    ///
    /// The old session is captured, `update_fn` applied, and one event sent
    /// per detected difference.
    ///
    /// # Returns
    /// The events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<SessionChange>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = detect_changes(&old_state, &state);
        for change in &changes {
            // Nobody listening is fine
            let _ = self.change_tx.send(change.clone());
        }
        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.change_tx.subscribe()
    }

    // Convenience methods for common updates

    /// Replace the schema together with its drafts and errors. Parameters
    /// read for the previous schema are dropped.
    pub fn load_schema(
        &self,
        schema: GameSettingsConfig,
        drafts: IndexMap<String, OptionDraft>,
        errors: ValidationErrors,
    ) -> Vec<SessionChange> {
        self.update(|state| {
            state.reset_parameters();
            state.schema = schema;
            state.is_schema_loaded = true;
            state.drafts = drafts;
            state.errors = errors;
        })
    }

    /// Store an edited draft and the errors recomputed for it.
    pub fn set_draft(&self, draft: OptionDraft, errors: ValidationErrors) -> Vec<SessionChange> {
        self.update(|state| {
            state.drafts.insert(draft.id.clone(), draft);
            state.errors = errors;
        })
    }

    pub fn remove_draft(&self, option_id: &str, errors: ValidationErrors) -> Vec<SessionChange> {
        self.update(|state| {
            state.drafts.shift_remove(option_id);
            state.errors = errors;
        })
    }

    pub fn set_parameters(
        &self,
        parameters: IndexMap<ParamKey, GameSettingsParameter>,
        failures: Vec<OptionFailure>,
    ) -> Vec<SessionChange> {
        self.update(|state| {
            state.parameters = parameters;
            state.failures = failures;
        })
    }

    pub fn set_backups(&self, backups: Vec<String>) -> Vec<SessionChange> {
        self.update(|state| state.backups = backups)
    }

    pub fn set_active_profile(&self, profile: Option<String>) -> Vec<SessionChange> {
        self.update(|state| state.active_profile = profile)
    }
}

/// Work out which events describe the step from `old` to `new`.
fn detect_changes(old: &SessionState, new: &SessionState) -> Vec<SessionChange> {
    let mut changes = Vec::new();

    if old.schema != new.schema || old.is_schema_loaded != new.is_schema_loaded {
        changes.push(SessionChange::SchemaLoaded {
            options: new.schema.game_settings_options.len(),
            files: new.schema.game_settings_files.len(),
        });
    }

    for (id, draft) in &new.drafts {
        if old.drafts.get(id) != Some(draft) {
            changes.push(SessionChange::DraftChanged {
                option_id: id.clone(),
            });
        }
    }
    for id in old.drafts.keys() {
        if !new.drafts.contains_key(id) {
            changes.push(SessionChange::DraftRemoved {
                option_id: id.clone(),
            });
        }
    }

    if old.errors != new.errors {
        changes.push(SessionChange::ValidationChanged {
            error_count: new.errors.len(),
            can_save: new.can_save(),
        });
    }

    if old.parameters != new.parameters || old.failures != new.failures {
        changes.push(SessionChange::ParametersChanged {
            resolved: new.parameters.len(),
            failed: new.failures.len(),
        });
    }

    if old.backups != new.backups {
        changes.push(SessionChange::BackupsChanged {
            count: new.backups.len(),
        });
    }

    if old.active_profile != new.active_profile {
        changes.push(SessionChange::ProfileChanged {
            profile: new.active_profile.clone(),
        });
    }

    changes
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            change_tx: self.change_tx.clone(),
        }
    }
}
