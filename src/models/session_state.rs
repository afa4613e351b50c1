use crate::models::{
    GameSettingsConfig, GameSettingsParameter, OptionDraft, OptionFailure, ParamKey,
    ValidationErrors,
};
use indexmap::IndexMap;

/// Everything an editing session holds between calls.
///
/// `SessionState` is wrapped in `Arc<RwLock<SessionState>>` by
/// [`crate::state::SessionManager`]; mutate it only through the manager so
/// change events are emitted.
///
/// # Related Types
///
/// - [`crate::state::SessionManager`]: Thread-safe wrapper with event emission
/// - [`crate::state::SessionChange`]: Event types for state mutations
/// - [`crate::engine::GameSettingsEngine`]: The only writer in the crate
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    /// Last loaded or saved `settings.json`.
    pub schema: GameSettingsConfig,
    pub is_schema_loaded: bool,

    /// Editable shape of every option, by option id, in schema order.
    pub drafts: IndexMap<String, OptionDraft>,
    pub errors: ValidationErrors,

    /// Values read from the game's files by the last extraction.
    pub parameters: IndexMap<ParamKey, GameSettingsParameter>,
    pub failures: Vec<OptionFailure>,

    /// Backup folder names, newest first.
    pub backups: Vec<String>,

    /// Mod Organizer profile the `%MO_PROFILE%` token currently points at.
    pub active_profile: Option<String>,
}

impl SessionState {
    /// A schema may only be saved while no validation error is pending.
    pub fn can_save(&self) -> bool {
        self.errors.is_empty()
    }

    /// Drop everything derived from the game's files.
    pub fn reset_parameters(&mut self) {
        self.parameters.clear();
        self.failures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cause, ErrorKey, FieldName, Owner};

    #[test]
    fn test_default_state() {
        let state = SessionState::default();
        assert!(!state.is_schema_loaded);
        assert!(state.drafts.is_empty());
        assert!(state.can_save());
        assert!(state.active_profile.is_none());
    }

    #[test]
    fn test_can_save_tracks_errors() {
        let mut state = SessionState::default();
        state.errors.insert(
            ErrorKey::new(Owner::option("opt-1"), FieldName::Label),
            Cause::Empty,
        );
        assert!(!state.can_save());
    }

    #[test]
    fn test_reset_parameters() {
        let mut state = SessionState::default();
        state.parameters.insert(
            ParamKey::new("opt-1", "item-1"),
            GameSettingsParameter {
                name: "bFull Screen".to_string(),
                default: "1".to_string(),
                value: "1".to_string(),
                owner_option_id: "opt-1".to_string(),
                owner_file_name: "prefs".to_string(),
            },
        );

        state.failures.push(OptionFailure {
            option_id: "opt-2".to_string(),
            option_label: "Shadows".to_string(),
            failures: Vec::new(),
        });

        state.reset_parameters();
        assert!(state.parameters.is_empty());
        assert!(state.failures.is_empty());
    }
}
