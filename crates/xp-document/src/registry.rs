//! Registry of live class declarations.
//!
//! This module provides [`ClassRegistry`], the single owned store of
//! [`ClassDeclaration`]s with two derived indices over it.
//!
//! # Index Pattern
//!
//! Declarations live in one `Vec` of slots. Both indices map a key to a slot
//! number, so a lookup through either index yields the same shared instance.
//! Every mutation that touches an index goes through `&mut self`, which keeps
//! the two indices consistent with each other within one call.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use camino::Utf8Path;
//! use xp_document::{ClassDeclaration, ClassRegistry};
//! use xp_parser::MarkupDocument;
//!
//! let doc = MarkupDocument::parse("MainPage.xaml", r#"<ContentPage x:Class="Demo.MainPage" />"#)?;
//! let mut registry = ClassRegistry::new();
//! let class = registry.register(ClassDeclaration::from_markup("MainPage.xaml.cs", &doc))?;
//!
//! let by_file = registry.find_by_file_name(Utf8Path::new("MainPage.xaml.cs")).unwrap();
//! let by_name = registry.find_by_full_name("Demo.MainPage").unwrap();
//! assert!(Arc::ptr_eq(&by_file, &by_name));
//! assert!(Arc::ptr_eq(&class, &by_name));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use tracing::debug;
use xp_core::FxHashMap;

use crate::declaration::{ClassDeclaration, SharedClass};
use crate::error::DocumentError;

/// Owned store of class declarations indexed by code-behind path and by
/// fully qualified name.
///
/// The registry is not internally synchronised; it is owned by one builder
/// and mutated through `&mut self`. The declarations it hands out are shared
/// and individually locked.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: Vec<SharedClass>,
    by_file: FxHashMap<Utf8PathBuf, usize>,
    by_full_name: FxHashMap<String, usize>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the declaration whose code-behind file is `file_name`.
    #[must_use]
    pub fn find_by_file_name(&self, file_name: &Utf8Path) -> Option<SharedClass> {
        self.by_file
            .get(file_name)
            .and_then(|&slot| self.classes.get(slot))
            .cloned()
    }

    /// Finds the declaration for the fully qualified class `full_name`.
    #[must_use]
    pub fn find_by_full_name(&self, full_name: &str) -> Option<SharedClass> {
        self.by_full_name
            .get(full_name)
            .and_then(|&slot| self.classes.get(slot))
            .cloned()
    }

    /// Adds a declaration under both its file name and its full name.
    ///
    /// Both keys are checked before either index is touched, so a failed
    /// registration leaves the registry unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::DuplicateRegistration`] if either key is
    /// already taken. Callers must fetch and mutate the existing declaration
    /// instead.
    pub fn register(&mut self, decl: ClassDeclaration) -> Result<SharedClass, DocumentError> {
        let full_name = decl.full_name();
        if self.by_file.contains_key(&decl.file_name) {
            return Err(DocumentError::duplicate(decl.file_name.as_str()));
        }
        if self.by_full_name.contains_key(&full_name) {
            return Err(DocumentError::duplicate(full_name));
        }

        debug!(file = %decl.file_name, class = %full_name, "Registering class declaration");

        let slot = self.classes.len();
        self.by_file.insert(decl.file_name.clone(), slot);
        self.by_full_name.insert(full_name, slot);

        let shared = Arc::new(RwLock::new(decl));
        self.classes.push(Arc::clone(&shared));
        Ok(shared)
    }

    /// Moves a declaration from `old_name` to `new_name` in the full-name
    /// index.
    ///
    /// A missing `old_name` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::DuplicateRegistration`] if a different
    /// declaration already owns `new_name`.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), DocumentError> {
        let Some(&slot) = self.by_full_name.get(old_name) else {
            return Ok(());
        };
        match self.by_full_name.get(new_name) {
            Some(&other) if other != slot => return Err(DocumentError::duplicate(new_name)),
            Some(_) => return Ok(()),
            None => {}
        }

        debug!(from = old_name, to = new_name, "Re-keying class declaration");
        self.by_full_name.remove(old_name);
        self.by_full_name.insert(new_name.to_owned(), slot);
        Ok(())
    }

    /// Returns every declaration in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedClass> {
        self.classes.iter()
    }

    /// Returns the number of declarations.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if no declaration is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Drops every declaration. Holders of a [`SharedClass`] keep their copy.
    pub fn clear(&mut self) {
        self.classes.clear();
        self.by_file.clear();
        self.by_full_name.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xp_parser::MarkupDocument;

    fn decl(file: &str, class: &str) -> ClassDeclaration {
        let text = format!(r#"<ContentPage x:Class="{class}" />"#);
        let doc = MarkupDocument::parse("Page.xaml", &text).unwrap();
        ClassDeclaration::from_markup(file, &doc)
    }

    #[test]
    fn test_register_and_find() {
        let mut registry = ClassRegistry::new();
        let class = registry.register(decl("A.xaml.cs", "Demo.A")).unwrap();

        let by_file = registry.find_by_file_name(Utf8Path::new("A.xaml.cs")).unwrap();
        let by_name = registry.find_by_full_name("Demo.A").unwrap();
        assert!(Arc::ptr_eq(&class, &by_file));
        assert!(Arc::ptr_eq(&by_file, &by_name));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_duplicate_file() {
        let mut registry = ClassRegistry::new();
        registry.register(decl("A.xaml.cs", "Demo.A")).unwrap();

        let err = registry.register(decl("A.xaml.cs", "Demo.Other")).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateRegistration { .. }));
        assert!(registry.find_by_full_name("Demo.Other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_duplicate_full_name() {
        let mut registry = ClassRegistry::new();
        registry.register(decl("A.xaml.cs", "Demo.A")).unwrap();

        let err = registry.register(decl("B.xaml.cs", "Demo.A")).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateRegistration { ref key } if key == "Demo.A"));
        assert!(registry.find_by_file_name(Utf8Path::new("B.xaml.cs")).is_none());
    }

    #[test]
    fn test_mutation_visible_through_both_indices() {
        let mut registry = ClassRegistry::new();
        let class = registry.register(decl("A.xaml.cs", "Demo.A")).unwrap();
        class.write().base_types.push("ContentPage".to_owned());

        let by_name = registry.find_by_full_name("Demo.A").unwrap();
        assert_eq!(by_name.read().base_types, vec!["ContentPage"]);
    }

    #[test]
    fn test_rename() {
        let mut registry = ClassRegistry::new();
        let class = registry.register(decl("A.xaml.cs", "Old.A")).unwrap();

        registry.rename("Old.A", "New.A").unwrap();
        assert!(registry.find_by_full_name("Old.A").is_none());
        let renamed = registry.find_by_full_name("New.A").unwrap();
        assert!(Arc::ptr_eq(&class, &renamed));
    }

    #[test]
    fn test_rename_onto_other_declaration_fails() {
        let mut registry = ClassRegistry::new();
        registry.register(decl("A.xaml.cs", "Demo.A")).unwrap();
        registry.register(decl("B.xaml.cs", "Demo.B")).unwrap();

        assert!(registry.rename("Demo.A", "Demo.B").is_err());
        assert!(registry.find_by_full_name("Demo.A").is_some());
    }

    #[test]
    fn test_rename_missing_is_noop() {
        let mut registry = ClassRegistry::new();
        assert!(registry.rename("Demo.A", "Demo.B").is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_keeps_outstanding_handles() {
        let mut registry = ClassRegistry::new();
        let class = registry.register(decl("A.xaml.cs", "Demo.A")).unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.find_by_full_name("Demo.A").is_none());
        assert_eq!(class.read().class_name, "A");
    }
}
