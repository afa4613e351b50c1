//! Format adapters for the game's own configuration files.
//!
//! Each [`FileView`] has one [`FormatAdapter`] that turns decoded text into a
//! [`Document`]. The adapter is picked once per file with [`adapter_for`] and
//! kept alongside the parsed document in a [`LoadedFile`], so callers never
//! switch on the view themselves.
//!
//! - [`sectional`]: `[Section]` / `key=value` INI files
//! - [`line`]: flat `key<delimiter>value` files
//! - [`tag`]: XML-like tag trees with attributes
//!
//! Lookups never panic and never guess: a missing section, key, tag or
//! attribute is reported as a [`LookupError`] naming the schema field that
//! points at it.

pub mod codec;
pub mod line;
pub mod sectional;
pub mod tag;

pub use codec::Codec;
pub use line::{LineAdapter, LineDocument};
pub use sectional::{IniDocument, SectionalAdapter};
pub use tag::{TagAdapter, TagDocument};

use crate::error::FormatError;
use crate::models::{FieldName, FileView, GameSettingsFile, ItemLocation, OptionItem};
use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// A value could not be found in a parsed file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Section [{section}] not found")]
    SectionMissing { section: String },

    #[error("Parameter '{key}' not found")]
    KeyMissing { key: String },

    #[error("Tag path segment '{segment}' not found")]
    PathMissing { segment: String },

    #[error("Tag <{tag}> not found")]
    TagMissing { tag: String },

    #[error("Attribute '{attribute}' not found on <{tag}>")]
    AttributeMissing { tag: String, attribute: String },

    #[error("Item is described for a {expected} file but the file is {actual}")]
    ViewMismatch { expected: FileView, actual: FileView },
}

impl LookupError {
    /// The schema field the operator has to look at.
    pub fn field(&self) -> FieldName {
        match self {
            Self::SectionMissing { .. } => FieldName::IniGroup,
            Self::KeyMissing { .. } | Self::TagMissing { .. } => FieldName::Name,
            Self::PathMissing { .. } => FieldName::ValuePath,
            Self::AttributeMissing { .. } => FieldName::ValueName,
            Self::ViewMismatch { .. } => FieldName::File,
        }
    }
}

/// Format-specific address of one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Sectional {
        section: String,
        key: String,
    },
    Line {
        name: String,
    },
    Tag {
        path: Vec<String>,
        tag: String,
        attribute: String,
    },
}

impl Locator {
    /// Build the locator of `item` inside a file of the given view.
    pub fn for_item(item: &OptionItem, view: FileView) -> Result<Self, LookupError> {
        let expected = item.location.view();
        if expected != view {
            return Err(LookupError::ViewMismatch {
                expected,
                actual: view,
            });
        }

        Ok(match &item.location {
            ItemLocation::Sectional { ini_group } => Self::Sectional {
                section: ini_group.clone(),
                key: item.name.clone(),
            },
            ItemLocation::Line => Self::Line {
                name: item.name.clone(),
            },
            ItemLocation::Tag {
                value_path,
                value_name,
            } => Self::Tag {
                path: split_value_path(value_path),
                tag: item.name.clone(),
                attribute: value_name.clone(),
            },
        })
    }

    pub fn view(&self) -> FileView {
        match self {
            Self::Sectional { .. } => FileView::Sectional,
            Self::Line { .. } => FileView::Line,
            Self::Tag { .. } => FileView::Tag,
        }
    }

    fn mismatch(&self, actual: FileView) -> LookupError {
        LookupError::ViewMismatch {
            expected: self.view(),
            actual,
        }
    }
}

/// Split a tag path such as `Settings/Graphics` into segments.
pub fn split_value_path(value_path: &str) -> Vec<String> {
    value_path
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// An in-memory parsed file.
pub trait Document: fmt::Debug + Send + Sync {
    fn view(&self) -> FileView;

    fn boxed_clone(&self) -> ParsedFile;

    fn get(&self, locator: &Locator) -> Result<String, LookupError>;

    /// Update the value at `locator` in place.
    fn set(&mut self, locator: &Locator, value: &str) -> Result<(), LookupError>;

    fn serialize(&self) -> String;
}

pub type ParsedFile = Box<dyn Document>;

/// Reads and writes one file format.
pub trait FormatAdapter: fmt::Debug + Send + Sync {
    fn view(&self) -> FileView;

    fn parse(&self, text: &str) -> Result<ParsedFile, FormatError>;

    fn get(&self, parsed: &dyn Document, locator: &Locator) -> Result<String, LookupError> {
        parsed.get(locator)
    }

    fn set(
        &self,
        parsed: &mut dyn Document,
        locator: &Locator,
        value: &str,
    ) -> Result<(), LookupError> {
        parsed.set(locator, value)
    }

    fn serialize(&self, parsed: &dyn Document) -> String {
        parsed.serialize()
    }

    /// Decode `bytes` with `encoding` and parse them.
    fn read(&self, bytes: &[u8], encoding: &str) -> Result<ParsedFile, FormatError> {
        let codec = Codec::for_label(encoding)?;
        self.parse(&codec.decode(bytes))
    }

    /// Serialize `parsed` and encode it with `encoding`.
    fn write(&self, parsed: &dyn Document, encoding: &str) -> Result<Vec<u8>, FormatError> {
        let codec = Codec::for_label(encoding)?;
        codec.encode(&self.serialize(parsed))
    }
}

/// Pick the adapter for a file view.
pub fn adapter_for(view: FileView, line_delimiters: &str) -> Box<dyn FormatAdapter> {
    match view {
        FileView::Sectional => Box::new(SectionalAdapter),
        FileView::Line => Box::new(LineAdapter::new(line_delimiters)),
        FileView::Tag => Box::new(TagAdapter),
    }
}

/// A managed file read from disk, with the adapter that parsed it.
#[derive(Debug)]
pub struct LoadedFile {
    pub file: GameSettingsFile,
    pub path: Utf8PathBuf,
    pub encoding: String,
    pub adapter: Box<dyn FormatAdapter>,
    pub parsed: ParsedFile,
}

impl LoadedFile {
    pub fn get(&self, locator: &Locator) -> Result<String, LookupError> {
        self.adapter.get(self.parsed.as_ref(), locator)
    }

    pub fn set(&mut self, locator: &Locator, value: &str) -> Result<(), LookupError> {
        self.adapter.set(self.parsed.as_mut(), locator, value)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        self.adapter.write(self.parsed.as_ref(), &self.encoding)
    }
}
