//! Parsed markup documents.
//!
//! A markup file describes a view as a single element tree whose root names
//! the class it declares (`x:Class="Demo.MainPage"`). Attributes are kept in
//! document order so inspection output mirrors the source.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::MarkupError;

/// Namespaces that bind the markup language directives (`Class`, `Name`).
pub const LANGUAGE_NAMESPACES: [&str; 2] = [
    "http://schemas.microsoft.com/winfx/2009/xaml",
    "http://schemas.microsoft.com/winfx/2006/xaml",
];

/// Prefix assumed for language directives when the root does not bind one.
pub const DEFAULT_LANGUAGE_PREFIX: &str = "x";

/// One element of the markup tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkupElement {
    /// Qualified tag name as written (`Label`, `local:Badge`).
    pub tag_name: String,
    /// Attributes in document order.
    pub attributes: IndexMap<String, String>,
    /// Child elements in document order.
    pub children: Vec<MarkupElement>,
}

impl MarkupElement {
    fn from_start(path: &Utf8Path, start: &BytesStart<'_>) -> Result<Self, MarkupError> {
        let tag_name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| MarkupError::malformed(path, format!("tag name is not UTF-8: {e}")))?
            .to_owned();

        let mut attributes = IndexMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| MarkupError::malformed(path, e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| {
                    MarkupError::malformed(path, format!("attribute name is not UTF-8: {e}"))
                })?
                .to_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| MarkupError::malformed(path, e.to_string()))?
                .into_owned();
            attributes.insert(key, value);
        }

        Ok(Self {
            tag_name,
            attributes,
            children: Vec::new(),
        })
    }

    /// Returns the value of `name`, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Visits this element and all descendants in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a MarkupElement)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// An element carrying a language `Name` directive.
///
/// Named elements become fields on the generated class, so a change to this
/// set changes the class shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NamedElement {
    /// The field name.
    pub name: String,
    /// The element's tag name.
    pub tag_name: String,
}

/// A parsed markup file.
#[derive(Debug, Clone, Serialize)]
pub struct MarkupDocument {
    /// Path of the markup file.
    pub file_path: Utf8PathBuf,
    /// Fully qualified class name declared by the root element.
    pub declared_type: String,
    /// Prefix bound to the language namespace on the root element.
    pub language_prefix: String,
    /// Root element.
    pub root: MarkupElement,
    /// The text this document was parsed from.
    #[serde(skip)]
    pub source: String,
}

impl MarkupDocument {
    /// Parses `text` as the markup file at `file_path`.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Malformed`] if the text is not exactly one
    /// well-formed element tree and [`MarkupError::MissingTypeName`] if the
    /// root carries no (or an empty) `Class` directive.
    pub fn parse(file_path: impl AsRef<Utf8Path>, text: &str) -> Result<Self, MarkupError> {
        let path = file_path.as_ref();
        let root = read_tree(path, text)?;

        let language_prefix = language_prefix(&root);
        let declared_type = root
            .attribute(&format!("{language_prefix}:Class"))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MarkupError::missing_type_name(path))?
            .to_owned();

        Ok(Self {
            file_path: path.to_owned(),
            declared_type,
            language_prefix,
            root,
            source: text.to_owned(),
        })
    }

    /// Returns the simple class name (the last dotted segment).
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.declared_type
            .rsplit_once('.')
            .map_or(self.declared_type.as_str(), |(_, name)| name)
    }

    /// Returns the namespace part of the declared type, if it has one.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.declared_type.rsplit_once('.').map(|(ns, _)| ns)
    }

    /// Returns every element carrying a language `Name` directive, sorted by
    /// field name.
    #[must_use]
    pub fn named_elements(&self) -> Vec<NamedElement> {
        let key = format!("{}:Name", self.language_prefix);
        let mut named = Vec::new();
        self.root.walk(&mut |element| {
            if let Some(name) = element.attribute(&key) {
                named.push(NamedElement {
                    name: name.to_owned(),
                    tag_name: element.tag_name.clone(),
                });
            }
        });
        named.sort();
        named
    }
}

fn language_prefix(root: &MarkupElement) -> String {
    root.attributes
        .iter()
        .find_map(|(key, value)| {
            let prefix = key.strip_prefix("xmlns:")?;
            LANGUAGE_NAMESPACES
                .contains(&value.as_str())
                .then(|| prefix.to_owned())
        })
        .unwrap_or_else(|| DEFAULT_LANGUAGE_PREFIX.to_owned())
}

fn read_tree(path: &Utf8Path, text: &str) -> Result<MarkupElement, MarkupError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    // Markup trees are shallow; most documents never spill.
    let mut open: SmallVec<[MarkupElement; 16]> = SmallVec::new();
    let mut root: Option<MarkupElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            MarkupError::malformed(
                path,
                format!("{e} (near byte {})", reader.buffer_position()),
            )
        })?;

        match event {
            Event::Start(start) => {
                if open.is_empty() && root.is_some() {
                    return Err(MarkupError::malformed(path, "multiple root elements"));
                }
                open.push(MarkupElement::from_start(path, &start)?);
            }
            Event::Empty(start) => {
                if open.is_empty() && root.is_some() {
                    return Err(MarkupError::malformed(path, "multiple root elements"));
                }
                let element = MarkupElement::from_start(path, &start)?;
                attach(element, &mut open, &mut root);
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| MarkupError::malformed(path, "unexpected closing tag"))?;
                attach(element, &mut open, &mut root);
            }
            Event::Text(content) => {
                if open.is_empty() && !content.iter().all(u8::is_ascii_whitespace) {
                    return Err(MarkupError::malformed(path, "text outside the root element"));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, CDATA, doctype
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(MarkupError::malformed(
            path,
            format!("unclosed element <{}>", unclosed.tag_name),
        ));
    }

    root.ok_or_else(|| MarkupError::malformed(path, "no root element"))
}

fn attach(
    element: MarkupElement,
    open: &mut SmallVec<[MarkupElement; 16]>,
    root: &mut Option<MarkupElement>,
) {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}
