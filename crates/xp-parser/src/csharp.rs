//! Tree-sitter backed analysis of C# code-behind files.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, QueryCursor, Tree};

use crate::analysis::{ClassNode, CodeAnalysis};
use crate::error::ParseError;
use crate::queries::{
    CAPTURE_CLASS_DECLARATION, CAPTURE_USING_DIRECTIVE, csharp_language, get_class_query,
};

/// Class declarations extracted from one C# source file.
///
/// Tree-sitter recovers from syntax errors, so a file that is mid-edit still
/// yields whatever classes are recognisable. [`has_errors`](Self::has_errors)
/// reports whether recovery was needed.
#[derive(Debug, Clone)]
pub struct CSharpAnalysis {
    classes: Vec<ClassNode>,
    has_errors: bool,
}

impl CSharpAnalysis {
    /// Parses `source` and extracts its top-level classes.
    ///
    /// # Errors
    ///
    /// - Returns [`ParseError::LanguageInit`] if the grammar cannot be loaded
    /// - Returns [`ParseError::Parse`] if tree-sitter produces no tree
    /// - Returns [`ParseError::QueryCompile`] if the class query fails to compile
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&csharp_language())
            .map_err(|_| ParseError::LanguageInit)?;

        let tree = parser.parse(source, None).ok_or(ParseError::Parse)?;
        let classes = extract_classes(&tree, source)?;

        Ok(Self {
            classes,
            has_errors: tree.root_node().has_error(),
        })
    }

    /// Returns `true` if the source contained syntax errors.
    #[inline]
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        self.has_errors
    }
}

impl CodeAnalysis for CSharpAnalysis {
    fn classes(&self) -> &[ClassNode] {
        &self.classes
    }
}

fn extract_classes(tree: &Tree, source: &str) -> Result<Vec<ClassNode>, ParseError> {
    let query = get_class_query()?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut declarations = Vec::new();
    let mut usings = Vec::new();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, root, bytes);
    while let Some(match_) = matches.next() {
        for capture in match_.captures {
            match capture.index {
                CAPTURE_CLASS_DECLARATION if !is_nested(capture.node) => {
                    declarations.push(capture.node);
                }
                CAPTURE_USING_DIRECTIVE => {
                    if let Some(text) = node_text(capture.node, source) {
                        usings.push(text.trim().to_owned());
                    }
                }
                _ => {}
            }
        }
    }

    declarations.sort_by_key(Node::start_byte);
    declarations.dedup_by_key(|node| node.id());

    Ok(declarations
        .into_iter()
        .filter_map(|node| class_node(node, root, source, &usings))
        .collect())
}

fn class_node(node: Node<'_>, root: Node<'_>, source: &str, usings: &[String]) -> Option<ClassNode> {
    let name = node_text(node.child_by_field_name("name")?, source)?.to_owned();

    let mut base_types = Vec::new();
    let mut walker = node.walk();
    if let Some(base_list) = node
        .named_children(&mut walker)
        .find(|child| child.kind() == "base_list")
    {
        let mut list_walker = base_list.walk();
        for base in base_list.named_children(&mut list_walker) {
            if let Some(text) = node_text(base, source) {
                base_types.push(simple_type_name(text).to_owned());
            }
        }
    }

    Some(ClassNode {
        name,
        namespace: enclosing_namespace(node, root, source),
        base_types,
        source: node_text(node, source)?.to_owned(),
        usings: usings.to_vec(),
    })
}

/// Returns `true` for classes declared inside another type.
fn is_nested(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(
            parent.kind(),
            "class_declaration" | "struct_declaration" | "record_declaration" | "interface_declaration"
        ) {
            return true;
        }
        current = parent.parent();
    }
    false
}

fn enclosing_namespace(node: Node<'_>, root: Node<'_>, source: &str) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = node.parent();
    while let Some(parent) = current {
        if matches!(
            parent.kind(),
            "namespace_declaration" | "file_scoped_namespace_declaration"
        ) {
            if let Some(name) = parent
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source))
            {
                segments.push(name.to_owned());
            }
        }
        current = parent.parent();
    }

    if !segments.is_empty() {
        segments.reverse();
        return Some(segments.join("."));
    }

    // `namespace Foo;` is a sibling of the declarations it scopes.
    let mut file_scoped = None;
    let mut walker = root.walk();
    for child in root.named_children(&mut walker) {
        if child.start_byte() >= node.start_byte() {
            break;
        }
        if child.kind() == "file_scoped_namespace_declaration" {
            file_scoped = child
                .child_by_field_name("name")
                .and_then(|n| node_text(n, source));
        }
    }
    file_scoped.map(str::to_owned)
}

/// Reduces `global::Xamarin.Forms.ContentPage<T>` to `ContentPage`.
fn simple_type_name(text: &str) -> &str {
    let without_generics = text.split('<').next().unwrap_or(text).trim();
    let after_alias = without_generics
        .rsplit_once("::")
        .map_or(without_generics, |(_, rest)| rest);
    after_alias
        .rsplit_once('.')
        .map_or(after_alias, |(_, name)| name)
        .trim()
}

#[inline]
fn node_text<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    node.utf8_text(source.as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN_PAGE: &str = r"
using System;
using Xamarin.Forms;

namespace Demo.Views
{
    public partial class MainPage : ContentPage, INotifyPropertyChanged
    {
        public MainPage()
        {
            InitializeComponent();
        }

        class Nested : ContentView { }
    }

    internal class Helper
    {
    }
}
";

    #[test]
    fn test_parse_classes() {
        let analysis = CSharpAnalysis::parse(MAIN_PAGE).unwrap();
        let names: Vec<_> = analysis.classes().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["MainPage", "Helper"]);
        assert!(!analysis.has_errors());
    }

    #[test]
    fn test_class_details() {
        let analysis = CSharpAnalysis::parse(MAIN_PAGE).unwrap();
        let page = analysis.find_class("MainPage").unwrap();
        assert_eq!(page.namespace.as_deref(), Some("Demo.Views"));
        assert_eq!(page.full_name(), "Demo.Views.MainPage");
        assert_eq!(page.base_types, vec!["ContentPage", "INotifyPropertyChanged"]);
        assert_eq!(page.usings, vec!["using System;", "using Xamarin.Forms;"]);
        assert!(page.source.starts_with("public partial class MainPage"));
    }

    #[test]
    fn test_nested_classes_ignored() {
        let analysis = CSharpAnalysis::parse(MAIN_PAGE).unwrap();
        assert!(analysis.find_class("Nested").is_none());
    }

    #[test]
    fn test_find_view_class() {
        let analysis = CSharpAnalysis::parse(MAIN_PAGE).unwrap();
        let bases = vec!["ContentPage".to_owned(), "ContentView".to_owned()];
        let view = analysis.find_view_class(&bases).unwrap();
        assert_eq!(view.name, "MainPage");
    }

    #[test]
    fn test_file_scoped_namespace() {
        let source = "namespace Demo.Controls;\n\npublic class Badge : Xamarin.Forms.ContentView { }\n";
        let analysis = CSharpAnalysis::parse(source).unwrap();
        let badge = analysis.find_class("Badge").unwrap();
        assert_eq!(badge.namespace.as_deref(), Some("Demo.Controls"));
        assert_eq!(badge.base_types, vec!["ContentView"]);
    }

    #[test]
    fn test_nested_namespaces() {
        let source = "namespace Outer { namespace Inner { class Page : ContentPage {} } }";
        let analysis = CSharpAnalysis::parse(source).unwrap();
        assert_eq!(analysis.classes()[0].full_name(), "Outer.Inner.Page");
    }

    #[test]
    fn test_global_namespace() {
        let analysis = CSharpAnalysis::parse("class Page : ContentPage {}").unwrap();
        assert_eq!(analysis.classes()[0].namespace, None);
        assert_eq!(analysis.classes()[0].full_name(), "Page");
    }

    #[test]
    fn test_parse_recovers_from_errors() {
        let source = "namespace Demo { public class Page : ContentPage { void Broken( { } }";
        let analysis = CSharpAnalysis::parse(source).unwrap();
        assert!(analysis.has_errors());
    }

    #[test]
    fn test_simple_type_name() {
        assert_eq!(simple_type_name("ContentPage"), "ContentPage");
        assert_eq!(simple_type_name("Xamarin.Forms.ContentPage"), "ContentPage");
        assert_eq!(simple_type_name("global::Xamarin.Forms.ContentView"), "ContentView");
        assert_eq!(simple_type_name("BasePage<MainViewModel>"), "BasePage");
    }

    #[test]
    fn test_empty_source() {
        let analysis = CSharpAnalysis::parse("").unwrap();
        assert!(analysis.classes().is_empty());
    }
}
