//! Structured view of a code file's class declarations.
//!
//! The document builder never looks at syntax trees directly. It asks a
//! [`CodeAnalysis`] for a class by name, or for the single class that derives
//! from a known view base type.

use serde::Serialize;

/// A class declaration found in a code file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassNode {
    /// Simple class name.
    pub name: String,
    /// Enclosing namespace, dotted. `None` for the global namespace.
    pub namespace: Option<String>,
    /// Simple names of the listed base types, in declaration order.
    pub base_types: Vec<String>,
    /// Source text of the whole declaration.
    #[serde(skip)]
    pub source: String,
    /// `using` directives of the containing file, as written.
    pub usings: Vec<String>,
}

impl ClassNode {
    /// Returns the fully qualified name.
    ///
    /// # Examples
    ///
    /// ```
    /// use xp_parser::ClassNode;
    ///
    /// let class = ClassNode {
    ///     name: "MainPage".into(),
    ///     namespace: Some("Demo.Views".into()),
    ///     base_types: vec![],
    ///     source: String::new(),
    ///     usings: vec![],
    /// };
    /// assert_eq!(class.full_name(), "Demo.Views.MainPage");
    /// ```
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns `true` if any base type is one of `view_base_types`.
    #[must_use]
    pub fn derives_from_any(&self, view_base_types: &[String]) -> bool {
        self.base_types
            .iter()
            .any(|base| view_base_types.iter().any(|known| known == base))
    }
}

/// Why no single view class could be picked from a code file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewClassError {
    /// No class derives from a known view base type.
    #[error("no class derives from a known view base type")]
    NotFound,
    /// More than one class derives from a known view base type.
    #[error("several classes derive from a view base type: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
}

/// Query interface over an analysed code file.
///
/// Implementors only need to expose their class list; lookups are provided.
pub trait CodeAnalysis: Send + Sync {
    /// Every top-level class declared in the file, in source order.
    fn classes(&self) -> &[ClassNode];

    /// Finds the first class named `name` (simple name).
    fn find_class(&self, name: &str) -> Option<&ClassNode> {
        self.classes().iter().find(|class| class.name == name)
    }

    /// Finds the one class deriving from any of `view_base_types`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewClassError::NotFound`] if no class qualifies and
    /// [`ViewClassError::Ambiguous`] if several do.
    fn find_view_class(&self, view_base_types: &[String]) -> Result<&ClassNode, ViewClassError> {
        let mut candidates = self
            .classes()
            .iter()
            .filter(|class| class.derives_from_any(view_base_types));

        let first = candidates.next().ok_or(ViewClassError::NotFound)?;
        let rest: Vec<_> = candidates.map(ClassNode::full_name).collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let mut names = Vec::with_capacity(rest.len() + 1);
        names.push(first.full_name());
        names.extend(rest);
        Err(ViewClassError::Ambiguous(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<ClassNode>);

    impl CodeAnalysis for Fixed {
        fn classes(&self) -> &[ClassNode] {
            &self.0
        }
    }

    fn class(name: &str, bases: &[&str]) -> ClassNode {
        ClassNode {
            name: name.to_owned(),
            namespace: Some("Demo".to_owned()),
            base_types: bases.iter().map(|b| (*b).to_owned()).collect(),
            source: String::new(),
            usings: Vec::new(),
        }
    }

    fn view_bases() -> Vec<String> {
        vec!["ContentPage".to_owned(), "ContentView".to_owned()]
    }

    #[test]
    fn test_find_class_by_name() {
        let analysis = Fixed(vec![class("Helper", &[]), class("MainPage", &["ContentPage"])]);
        assert_eq!(analysis.find_class("MainPage").map(|c| c.name.as_str()), Some("MainPage"));
        assert!(analysis.find_class("Missing").is_none());
    }

    #[test]
    fn test_find_view_class_single() {
        let analysis = Fixed(vec![
            class("Helper", &["IDisposable"]),
            class("Badge", &["ContentView", "INotifyPropertyChanged"]),
        ]);
        let view = analysis.find_view_class(&view_bases()).unwrap();
        assert_eq!(view.full_name(), "Demo.Badge");
    }

    #[test]
    fn test_find_view_class_none() {
        let analysis = Fixed(vec![class("Helper", &["Object"])]);
        assert_eq!(
            analysis.find_view_class(&view_bases()),
            Err(ViewClassError::NotFound)
        );
    }

    #[test]
    fn test_find_view_class_ambiguous() {
        let analysis = Fixed(vec![
            class("A", &["ContentPage"]),
            class("B", &["ContentView"]),
        ]);
        let err = analysis.find_view_class(&view_bases()).unwrap_err();
        assert_eq!(
            err,
            ViewClassError::Ambiguous(vec!["Demo.A".to_owned(), "Demo.B".to_owned()])
        );
        assert!(err.to_string().contains("Demo.A, Demo.B"));
    }
}
