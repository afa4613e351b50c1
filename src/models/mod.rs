//! Data models for the game settings engine.
//!
//! - [`GameSettingsConfig`]: the schema (`settings.json`) with its files, groups and options
//! - [`OptionDraft`]: the full editable shape of an option while it is being edited
//! - [`ValidationErrors`]: field errors keyed by owner and field
//! - [`GameSettingsParameter`]: a value read from a game config file
//! - [`LauncherConfig`]: launcher settings (`config.json`)
//! - [`EngineSettings`]: ambient runtime settings
//! - [`SessionState`]: everything an editing session holds

pub mod config;
pub mod draft;
pub mod message;
pub mod parameter;
pub mod schema;
pub mod session_state;
pub mod validation;

pub use config::{
    ButtonAction, CustomButton, EngineSettings, LauncherButton, LauncherConfig, ModOrganizerConfig,
};
pub use draft::{
    ControllerDraft, DraftEdit, ItemDraft, OptionDraft, format_select_options,
    parse_select_options,
};
pub use message::{Severity, UserMessage};
pub use parameter::{GameSettingsParameter, ItemFailure, OptionFailure, ParamKey};
pub use schema::{
    ControlledItem, Controller, ControllerType, DEFAULT_FILES_ENCODING, DEFAULT_LINE_DELIMITERS,
    FieldName, FileView, GameSettingsConfig, GameSettingsFile, GameSettingsGroup,
    GameSettingsOption, ItemLocation, OptionItem, OptionKind, OptionType, RawItem, RawOption,
    SEPARATORS, SchemaError, parse_separator,
};
pub use session_state::SessionState;
pub use validation::{
    Cause, ErrorKey, FieldRef, Owner, ValidationEntry, ValidationErrors,
};
