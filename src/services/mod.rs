//! Services module - the engine's business logic.
//!
//! Everything here is free of session state: inputs are explicit parameters
//! and results are returned, never stored.
//!
//! # Components
//!
//! - [`paths`]: resolves `%TOKEN%` path templates, including Mod Organizer
//!   profile-relative ones, and keeps resolved paths inside their root.
//! - [`extraction`]: loads managed files concurrently, reads the current value
//!   of every option and writes edited values back.
//! - [`normalizer`]: converts between the editable draft of an option and its
//!   persisted shape.
//! - [`validation`]: recomputes field errors after an edit.
//! - [`backup`]: snapshots managed files into timestamped folders and
//!   restores them.
//! - [`locks`]: per-path write locks shared by everything that writes files.

pub mod backup;
pub mod extraction;
pub mod locks;
pub mod normalizer;
pub mod paths;
pub mod validation;

pub use backup::{BackupEntry, BackupError, BackupManifest, BackupService};
pub use extraction::{
    ApplyReport, ExtractionReport, FileLoadError, LoadedFiles, ParameterEdit, apply_values,
    extract, load_files, load_used_files,
};
pub use locks::WriteLocks;
pub use normalizer::{
    AppliedEdit, EditError, apply_draft_edit, draft_from_option, to_full_shape,
    to_persisted_shape,
};
pub use paths::{
    AnchorPaths, ModOrganizerSettings, PathError, PathVariable, PathVariableTable,
    within_allowed_root,
};
pub use validation::{ValidationContext, validate, validate_option};
