//! Sectional (`[Section]` + `key=value`) INI files.
//!
//! The document keeps every raw line, terminator included, so serializing an
//! unmodified document reproduces the input byte for byte. Updating a value
//! rewrites only the value span of its line; the key, the spacing around `=`
//! and any trailing whitespace are left as they were.

use super::{Document, FormatAdapter, Locator, LookupError, ParsedFile};
use crate::error::FormatError;
use crate::models::FileView;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\x{FEFF}?\s*\[([^\]]*)\]").expect("Invalid section header regex")
});

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\x{FEFF}?\s*([^=;#\[\s][^=]*?)\s*=\s*(.*?)\s*$").expect("Invalid INI entry regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct SectionalAdapter;

impl FormatAdapter for SectionalAdapter {
    fn view(&self) -> FileView {
        FileView::Sectional
    }

    fn parse(&self, text: &str) -> Result<ParsedFile, FormatError> {
        Ok(Box::new(IniDocument::parse(text)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Header,
    Entry { key: String, value: Range<usize> },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IniLine {
    /// Raw text including its line terminator.
    raw: String,
    kind: LineKind,
}

impl IniLine {
    fn parse(raw: &str) -> Self {
        let body = strip_terminator(raw);
        let kind = if SECTION_HEADER.is_match(body) {
            LineKind::Header
        } else if let Some(caps) = ENTRY.captures(body) {
            match (caps.get(1), caps.get(2)) {
                (Some(key), Some(value)) => LineKind::Entry {
                    key: key.as_str().to_string(),
                    value: value.range(),
                },
                _ => LineKind::Other,
            }
        } else {
            LineKind::Other
        };

        Self {
            raw: raw.to_string(),
            kind,
        }
    }

    fn entry(key: &str, value: &str, newline: &str) -> Self {
        let raw = format!("{}={}{}", key, value, newline);
        let start = key.len() + 1;
        Self {
            kind: LineKind::Entry {
                key: key.to_string(),
                value: start..start + value.len(),
            },
            raw,
        }
    }

    fn key(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Entry { key, .. } => Some(key),
            _ => None,
        }
    }

    fn value(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Entry { value, .. } => self.raw.get(value.clone()),
            _ => None,
        }
    }

    fn set_value(&mut self, new_value: &str) {
        if let LineKind::Entry { value, .. } = &mut self.kind {
            self.raw.replace_range(value.clone(), new_value);
            *value = value.start..value.start + new_value.len();
        }
    }

    fn ensure_terminated(&mut self, newline: &str) {
        if !self.raw.ends_with('\n') {
            self.raw.push_str(newline);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IniSection {
    /// `None` for the lines before the first header.
    name: Option<String>,
    lines: Vec<IniLine>,
}

/// Parsed sectional file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
    newline: &'static str,
}

impl IniDocument {
    pub fn parse(text: &str) -> Self {
        let newline = detect_newline(text);
        let mut sections = vec![IniSection {
            name: None,
            lines: Vec::new(),
        }];

        for raw in text.split_inclusive('\n') {
            let line = IniLine::parse(raw);
            if line.kind == LineKind::Header {
                let name = SECTION_HEADER
                    .captures(strip_terminator(raw))
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                sections.push(IniSection {
                    name: Some(name),
                    lines: vec![line],
                });
            } else if let Some(section) = sections.last_mut() {
                section.lines.push(line);
            }
        }

        Self { sections, newline }
    }

    /// Names of all sections in file order.
    pub fn section_names(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter_map(|s| s.name.as_deref())
            .collect()
    }

    /// Section and key lookup, case-insensitive on both.
    pub fn value(&self, section: &str, key: &str) -> Result<&str, LookupError> {
        let mut found_section = false;
        for candidate in self.matching_sections(section) {
            found_section = true;
            if let Some(value) = candidate
                .lines
                .iter()
                .find(|l| l.key().is_some_and(|k| k.eq_ignore_ascii_case(key)))
                .and_then(IniLine::value)
            {
                return Ok(value);
            }
        }

        if found_section {
            Err(LookupError::KeyMissing {
                key: key.to_string(),
            })
        } else {
            Err(LookupError::SectionMissing {
                section: section.to_string(),
            })
        }
    }

    /// Update a value; missing keys and sections are appended.
    pub fn set_value(&mut self, section: &str, key: &str, value: &str) {
        let value = value.replace(['\r', '\n'], "");
        let newline = self.newline;

        for candidate in self.sections.iter_mut().filter(|s| is_named(s, section)) {
            if let Some(line) = candidate
                .lines
                .iter_mut()
                .find(|l| l.key().is_some_and(|k| k.eq_ignore_ascii_case(key)))
            {
                line.set_value(&value);
                return;
            }
        }

        if let Some(target) = self.sections.iter_mut().find(|s| is_named(s, section)) {
            let insert_at = target
                .lines
                .iter()
                .rposition(|l| matches!(l.kind, LineKind::Entry { .. } | LineKind::Header))
                .map_or(0, |i| i + 1);
            if let Some(previous) = insert_at.checked_sub(1).and_then(|i| target.lines.get_mut(i)) {
                previous.ensure_terminated(newline);
            }
            target
                .lines
                .insert(insert_at, IniLine::entry(key, &value, newline));
            return;
        }

        if let Some(last) = self.sections.iter_mut().rev().find_map(|s| s.lines.last_mut()) {
            last.ensure_terminated(newline);
        }
        self.sections.push(IniSection {
            name: Some(section.to_string()),
            lines: vec![
                IniLine::parse(&format!("[{}]{}", section, newline)),
                IniLine::entry(key, &value, newline),
            ],
        });
    }

    pub fn to_text(&self) -> String {
        self.sections
            .iter()
            .flat_map(|s| s.lines.iter())
            .map(|l| l.raw.as_str())
            .collect()
    }

    fn matching_sections<'a, 'b>(&'a self, section: &'b str) -> impl Iterator<Item = &'a IniSection> + use<'a, 'b> {
        self.sections.iter().filter(move |s| is_named(s, section))
    }
}

impl Document for IniDocument {
    fn view(&self) -> FileView {
        FileView::Sectional
    }

    fn boxed_clone(&self) -> ParsedFile {
        Box::new(self.clone())
    }

    fn get(&self, locator: &Locator) -> Result<String, LookupError> {
        match locator {
            Locator::Sectional { section, key } => self.value(section, key).map(str::to_string),
            other => Err(other.mismatch(FileView::Sectional)),
        }
    }

    fn set(&mut self, locator: &Locator, value: &str) -> Result<(), LookupError> {
        match locator {
            Locator::Sectional { section, key } => {
                self.set_value(section, key, value);
                Ok(())
            }
            other => Err(other.mismatch(FileView::Sectional)),
        }
    }

    fn serialize(&self) -> String {
        self.to_text()
    }
}

fn is_named(section: &IniSection, name: &str) -> bool {
    section
        .name
        .as_deref()
        .is_some_and(|n| n.eq_ignore_ascii_case(name))
}

pub(crate) fn strip_terminator(raw: &str) -> &str {
    let body = raw.strip_suffix('\n').unwrap_or(raw);
    body.strip_suffix('\r').unwrap_or(body)
}

pub(crate) fn detect_newline(text: &str) -> &'static str {
    if text.contains("\r\n") { "\r\n" } else { "\n" }
}
