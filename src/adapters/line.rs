//! Flat `name<delimiter>value` files without sections.

use super::sectional::{detect_newline, strip_terminator};
use super::{Document, FormatAdapter, Locator, LookupError, ParsedFile};
use crate::error::FormatError;
use crate::models::{DEFAULT_LINE_DELIMITERS, FileView};
use regex::Regex;
use std::ops::Range;

const COMMENT_PREFIXES: [&str; 3] = ["//", "#", ";"];

#[derive(Debug, Clone)]
pub struct LineAdapter {
    delimiters: String,
}

impl LineAdapter {
    /// `delimiters` is the set of characters that may separate a name from
    /// its value; an empty set falls back to the default.
    pub fn new(delimiters: &str) -> Self {
        let delimiters = if delimiters.is_empty() {
            DEFAULT_LINE_DELIMITERS.to_string()
        } else {
            delimiters.to_string()
        };
        Self { delimiters }
    }
}

impl Default for LineAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_DELIMITERS)
    }
}

impl FormatAdapter for LineAdapter {
    fn view(&self) -> FileView {
        FileView::Line
    }

    fn parse(&self, text: &str) -> Result<ParsedFile, FormatError> {
        Ok(Box::new(LineDocument::parse(text, &self.delimiters)))
    }
}

/// Parsed line file. Lines keep their terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDocument {
    lines: Vec<String>,
    delimiters: String,
    newline: &'static str,
}

impl LineDocument {
    pub fn parse(text: &str, delimiters: &str) -> Self {
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
            delimiters: delimiters.to_string(),
            newline: detect_newline(text),
        }
    }

    pub fn value(&self, name: &str) -> Result<&str, LookupError> {
        self.find(name)
            .and_then(|(index, span)| self.lines.get(index).and_then(|l| l.get(span)))
            .ok_or_else(|| LookupError::KeyMissing {
                key: name.to_string(),
            })
    }

    /// Update the first line declaring `name`, or append a new line.
    pub fn set_value(&mut self, name: &str, value: &str) {
        let value = value.replace(['\r', '\n'], "");

        if let Some((index, span)) = self.find(name) {
            if let Some(line) = self.lines.get_mut(index) {
                line.replace_range(span, &value);
            }
            return;
        }

        if let Some(last) = self.lines.last_mut()
            && !last.ends_with('\n')
        {
            last.push_str(self.newline);
        }
        let delimiter = self.delimiters.chars().next().unwrap_or('=');
        self.lines
            .push(format!("{}{}{}{}", name, delimiter, value, self.newline));
    }

    pub fn to_text(&self) -> String {
        self.lines.concat()
    }

    fn find(&self, name: &str) -> Option<(usize, Range<usize>)> {
        let pattern = self.pattern_for(name)?;
        self.lines.iter().enumerate().find_map(|(index, raw)| {
            let body = strip_terminator(raw);
            let trimmed = body.trim_start_matches(['\u{feff}', ' ', '\t']);
            if COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
                return None;
            }
            pattern
                .captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| (index, m.range()))
        })
    }

    fn pattern_for(&self, name: &str) -> Option<Regex> {
        let class: String = self
            .delimiters
            .chars()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let pattern = format!(
            r"^\x{{FEFF}}?[ \t]*(?i:{})[ \t]*[{}][ \t]*(.*?)\s*$",
            regex::escape(name.trim()),
            class
        );
        match Regex::new(&pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                tracing::warn!("Cannot build lookup pattern for '{}': {}", name, e);
                None
            }
        }
    }
}

impl Document for LineDocument {
    fn view(&self) -> FileView {
        FileView::Line
    }

    fn boxed_clone(&self) -> ParsedFile {
        Box::new(self.clone())
    }

    fn get(&self, locator: &Locator) -> Result<String, LookupError> {
        match locator {
            Locator::Line { name } => self.value(name).map(str::to_string),
            other => Err(other.mismatch(FileView::Line)),
        }
    }

    fn set(&mut self, locator: &Locator, value: &str) -> Result<(), LookupError> {
        match locator {
            Locator::Line { name } => {
                self.set_value(name, value);
                Ok(())
            }
            other => Err(other.mismatch(FileView::Line)),
        }
    }

    fn serialize(&self) -> String {
        self.to_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_CFG: &str = "// user settings\r\nset r_fullscreen 1\r\nvolume = 0.8\r\n# fov=90\r\nfov=75\r\nfov=80\r\n";

    #[test]
    fn test_round_trip() {
        let doc = LineDocument::parse(USER_CFG, "= ");
        assert_eq!(doc.to_text(), USER_CFG);
    }

    #[test]
    fn test_lookup_first_match_wins_and_skips_comments() {
        let doc = LineDocument::parse(USER_CFG, "= ");

        assert_eq!(doc.value("fov").unwrap(), "75");
        assert_eq!(doc.value("VOLUME").unwrap(), "0.8");
        assert_eq!(doc.value("set r_fullscreen").unwrap(), "1");
        assert_eq!(
            doc.value("r_fullscreen"),
            Err(LookupError::KeyMissing {
                key: "r_fullscreen".to_string()
            })
        );
    }

    #[test]
    fn test_name_prefix_does_not_match() {
        let doc = LineDocument::parse("fovScale=2\n", "=");
        assert!(doc.value("fov").is_err());
    }

    #[test]
    fn test_delimiters_are_configurable() {
        let doc = LineDocument::parse("gamma:1.2\n", ":");
        assert_eq!(doc.value("gamma").unwrap(), "1.2");

        let doc = LineDocument::parse("gamma:1.2\n", "=");
        assert!(doc.value("gamma").is_err());
    }

    #[test]
    fn test_set_preserves_line_layout() {
        let mut doc = LineDocument::parse(USER_CFG, "= ");
        doc.set_value("volume", "0.5");
        assert_eq!(
            doc.to_text(),
            USER_CFG.replace("volume = 0.8", "volume = 0.5")
        );
    }

    #[test]
    fn test_set_appends_missing_name() {
        let mut doc = LineDocument::parse("a=1", "= ");
        doc.set_value("b", "2");
        assert_eq!(doc.to_text(), "a=1\nb=2\n");
    }

    #[test]
    fn test_adapter_falls_back_to_default_delimiters() {
        let adapter = LineAdapter::new("");
        let parsed = adapter.parse("x 5\n").unwrap();
        let locator = Locator::Line {
            name: "x".to_string(),
        };
        assert_eq!(parsed.get(&locator).unwrap(), "5");
    }
}
