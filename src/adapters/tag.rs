//! Tag (XML) files.
//!
//! `roxmltree` is read-only, so the parsed tree is copied into an owned
//! [`TagElement`] tree that can be edited and written back. Whitespace text
//! nodes are kept, which preserves the source indentation; only attribute
//! values are ever changed.

use super::sectional::detect_newline;
use super::{Document, FormatAdapter, Locator, LookupError, ParsedFile};
use crate::error::FormatError;
use crate::models::FileView;

#[derive(Debug, Clone, Copy, Default)]
pub struct TagAdapter;

impl FormatAdapter for TagAdapter {
    fn view(&self) -> FileView {
        FileView::Tag
    }

    fn parse(&self, text: &str) -> Result<ParsedFile, FormatError> {
        Ok(Box::new(TagDocument::parse(text)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagNode {
    Element(TagElement),
    Text(String),
    Comment(String),
    Instruction { target: String, value: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<TagNode>,
}

impl TagElement {
    pub fn child(&self, name: &str) -> Option<&TagElement> {
        self.children.iter().find_map(|node| match node {
            TagNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut TagElement> {
        self.children.iter_mut().find_map(|node| match node {
            TagNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value, true));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl TagNode {
    fn write(&self, out: &mut String) {
        match self {
            Self::Element(e) => e.write(out),
            Self::Text(text) => out.push_str(&escape(text, false)),
            Self::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            Self::Instruction { target, value } => {
                out.push_str("<?");
                out.push_str(target);
                if let Some(value) = value {
                    out.push(' ');
                    out.push_str(value);
                }
                out.push_str("?>");
            }
        }
    }
}

/// Parsed tag file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDocument {
    bom: bool,
    declaration: Option<String>,
    /// Top-level nodes: prolog comments, the root element, trailing comments.
    nodes: Vec<TagNode>,
    newline: &'static str,
    trailing_newline: bool,
}

impl TagDocument {
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let bom = text.starts_with('\u{feff}');
        let body = text.trim_start_matches('\u{feff}');

        let document = roxmltree::Document::parse(body)
            .map_err(|e| FormatError::MalformedTag(e.to_string()))?;

        let declaration = body.trim_start().strip_prefix("<?xml").and_then(|rest| {
            rest.find("?>")
                .map(|end| format!("<?xml{}?>", &rest[..end]))
        });

        let nodes = document
            .root()
            .children()
            .filter_map(convert_node)
            .filter(|node| !matches!(node, TagNode::Text(t) if t.trim().is_empty()))
            .collect();

        Ok(Self {
            bom,
            declaration,
            nodes,
            newline: detect_newline(text),
            trailing_newline: text.ends_with('\n'),
        })
    }

    pub fn root(&self) -> Option<&TagElement> {
        self.nodes.iter().find_map(|node| match node {
            TagNode::Element(e) => Some(e),
            _ => None,
        })
    }

    fn root_mut(&mut self) -> Option<&mut TagElement> {
        self.nodes.iter_mut().find_map(|node| match node {
            TagNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn value(&self, path: &[String], tag: &str, attribute: &str) -> Result<&str, LookupError> {
        let root = self.root().ok_or_else(|| LookupError::TagMissing {
            tag: tag.to_string(),
        })?;
        let element = walk(root, path, tag)?;
        element
            .attribute(attribute)
            .ok_or_else(|| LookupError::AttributeMissing {
                tag: tag.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Update an attribute, inserting it when the tag exists without it.
    pub fn set_value(
        &mut self,
        path: &[String],
        tag: &str,
        attribute: &str,
        value: &str,
    ) -> Result<(), LookupError> {
        let root = self.root_mut().ok_or_else(|| LookupError::TagMissing {
            tag: tag.to_string(),
        })?;
        let element = walk_mut(root, path, tag)?;
        element.set_attribute(attribute, value);
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if self.bom {
            out.push('\u{feff}');
        }

        let mut parts = Vec::new();
        if let Some(declaration) = &self.declaration {
            parts.push(declaration.clone());
        }
        for node in &self.nodes {
            let mut part = String::new();
            node.write(&mut part);
            parts.push(part);
        }
        out.push_str(&parts.join("\n"));
        if self.trailing_newline {
            out.push('\n');
        }

        if self.newline == "\r\n" {
            out.replace('\n', "\r\n")
        } else {
            out
        }
    }
}

impl Document for TagDocument {
    fn view(&self) -> FileView {
        FileView::Tag
    }

    fn boxed_clone(&self) -> ParsedFile {
        Box::new(self.clone())
    }

    fn get(&self, locator: &Locator) -> Result<String, LookupError> {
        match locator {
            Locator::Tag {
                path,
                tag,
                attribute,
            } => self.value(path, tag, attribute).map(str::to_string),
            other => Err(other.mismatch(FileView::Tag)),
        }
    }

    fn set(&mut self, locator: &Locator, value: &str) -> Result<(), LookupError> {
        match locator {
            Locator::Tag {
                path,
                tag,
                attribute,
            } => self.set_value(path, tag, attribute, value),
            other => Err(other.mismatch(FileView::Tag)),
        }
    }

    fn serialize(&self) -> String {
        self.to_text()
    }
}

/// Walk `path` starting at the root (whose name is the first segment), then
/// find `tag` below it. An empty path addresses the root itself.
fn walk<'a>(root: &'a TagElement, path: &[String], tag: &str) -> Result<&'a TagElement, LookupError> {
    let Some((first, rest)) = path.split_first() else {
        return if root.name == tag {
            Ok(root)
        } else {
            Err(LookupError::TagMissing {
                tag: tag.to_string(),
            })
        };
    };

    if &root.name != first {
        return Err(LookupError::PathMissing {
            segment: first.clone(),
        });
    }

    let mut current = root;
    for segment in rest {
        current = current
            .child(segment)
            .ok_or_else(|| LookupError::PathMissing {
                segment: segment.clone(),
            })?;
    }

    current.child(tag).ok_or_else(|| LookupError::TagMissing {
        tag: tag.to_string(),
    })
}

fn walk_mut<'a>(
    root: &'a mut TagElement,
    path: &[String],
    tag: &str,
) -> Result<&'a mut TagElement, LookupError> {
    let Some((first, rest)) = path.split_first() else {
        return if root.name == tag {
            Ok(root)
        } else {
            Err(LookupError::TagMissing {
                tag: tag.to_string(),
            })
        };
    };

    if &root.name != first {
        return Err(LookupError::PathMissing {
            segment: first.clone(),
        });
    }

    let mut current = root;
    for segment in rest {
        current = current
            .child_mut(segment)
            .ok_or_else(|| LookupError::PathMissing {
                segment: segment.clone(),
            })?;
    }

    current.child_mut(tag).ok_or_else(|| LookupError::TagMissing {
        tag: tag.to_string(),
    })
}

fn convert_node(node: roxmltree::Node<'_, '_>) -> Option<TagNode> {
    match node.node_type() {
        roxmltree::NodeType::Element => Some(TagNode::Element(convert_element(node))),
        roxmltree::NodeType::Text => node.text().map(|t| TagNode::Text(t.to_string())),
        roxmltree::NodeType::Comment => node.text().map(|t| TagNode::Comment(t.to_string())),
        roxmltree::NodeType::PI => node.pi().map(|pi| TagNode::Instruction {
            target: pi.target.to_string(),
            value: pi.value.map(str::to_string),
        }),
        roxmltree::NodeType::Root => None,
    }
}

fn convert_element(node: roxmltree::Node<'_, '_>) -> TagElement {
    let tag_name = node.tag_name();
    let name = qualified(node, tag_name.name(), tag_name.namespace());

    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    let mut attributes: Vec<(String, String)> = node
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| {
            let key = match ns.name() {
                Some(prefix) => format!("xmlns:{}", prefix),
                None => "xmlns".to_string(),
            };
            (key, ns.uri().to_string())
        })
        .collect();

    attributes.extend(node.attributes().map(|a| {
        (
            qualified(node, a.name(), a.namespace()),
            a.value().to_string(),
        )
    }));

    TagElement {
        name,
        attributes,
        children: node.children().filter_map(convert_node).collect(),
    }
}

fn qualified(node: roxmltree::Node<'_, '_>, local: &str, namespace: Option<&str>) -> String {
    match namespace.and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
        _ => local.to_string(),
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS_XML: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!-- generated -->\n<Settings>\n\t<Graphics>\n\t\t<Shadows quality=\"high\" enabled=\"1\"/>\n\t</Graphics>\n\t<Audio volume=\"80\"/>\n</Settings>\n";

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_round_trip_preserves_layout() {
        let doc = TagDocument::parse(SETTINGS_XML).unwrap();
        assert_eq!(doc.to_text(), SETTINGS_XML);
    }

    #[test]
    fn test_lookup() {
        let doc = TagDocument::parse(SETTINGS_XML).unwrap();

        assert_eq!(
            doc.value(&path(&["Settings", "Graphics"]), "Shadows", "quality")
                .unwrap(),
            "high"
        );
        assert_eq!(
            doc.value(&path(&["Settings"]), "Audio", "volume").unwrap(),
            "80"
        );
    }

    #[test]
    fn test_lookup_errors_point_at_fields() {
        let doc = TagDocument::parse(SETTINGS_XML).unwrap();

        let err = doc
            .value(&path(&["Settings", "Video"]), "Shadows", "quality")
            .unwrap_err();
        assert_eq!(
            err,
            LookupError::PathMissing {
                segment: "Video".to_string()
            }
        );

        let err = doc
            .value(&path(&["Settings", "Graphics"]), "Water", "quality")
            .unwrap_err();
        assert!(matches!(err, LookupError::TagMissing { .. }));

        let err = doc
            .value(&path(&["Settings", "Graphics"]), "Shadows", "size")
            .unwrap_err();
        assert!(matches!(err, LookupError::AttributeMissing { .. }));

        let err = doc.value(&path(&["Config"]), "Audio", "volume").unwrap_err();
        assert!(matches!(err, LookupError::PathMissing { .. }));
    }

    #[test]
    fn test_set_value() {
        let mut doc = TagDocument::parse(SETTINGS_XML).unwrap();
        let graphics = path(&["Settings", "Graphics"]);

        doc.set_value(&graphics, "Shadows", "quality", "low").unwrap();
        doc.set_value(&graphics, "Shadows", "size", "2048").unwrap();

        let text = doc.to_text();
        assert!(text.contains("<Shadows quality=\"low\" enabled=\"1\" size=\"2048\"/>"));
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!-- generated -->\n"));

        let err = doc
            .set_value(&graphics, "Water", "quality", "low")
            .unwrap_err();
        assert!(matches!(err, LookupError::TagMissing { .. }));
    }

    #[test]
    fn test_escaping_and_crlf() {
        let text = "<Root>\r\n  <Item name=\"a &amp; b\"/>\r\n</Root>";
        let mut doc = TagDocument::parse(text).unwrap();
        assert_eq!(
            doc.value(&[], "Root", "missing").unwrap_err().field(),
            crate::models::FieldName::ValueName
        );
        assert_eq!(doc.value(&path(&["Root"]), "Item", "name").unwrap(), "a & b");

        doc.set_value(&path(&["Root"]), "Item", "name", "<\"x\">").unwrap();
        assert_eq!(
            doc.to_text(),
            "<Root>\r\n  <Item name=\"&lt;&quot;x&quot;&gt;\"/>\r\n</Root>"
        );
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            TagDocument::parse("<Root><Unclosed></Root>"),
            Err(FormatError::MalformedTag(_))
        ));
    }
}
