//! The in-memory model of one previewable view class.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use serde::Serialize;
use xp_core::EvalRequest;
use xp_parser::{ClassNode, MarkupDocument};

/// A declaration shared between the registry and anyone holding on to it.
///
/// Declarations are mutated in place on every edit, so holders always see
/// the current state of the class.
pub type SharedClass = Arc<RwLock<ClassDeclaration>>;

/// One view class across its markup and code-behind facets.
///
/// # Examples
///
/// ```
/// use xp_document::ClassDeclaration;
/// use xp_parser::MarkupDocument;
///
/// let doc = MarkupDocument::parse("MainPage.xaml", r#"<ContentPage x:Class="Demo.MainPage" />"#)?;
/// let decl = ClassDeclaration::from_markup("MainPage.xaml.cs", &doc);
/// assert_eq!(decl.full_name(), "Demo.MainPage");
/// assert!(decl.needs_initialization);
/// assert!(decl.markup.is_none());
/// # Ok::<(), xp_parser::MarkupError>(())
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ClassDeclaration {
    /// Path of the code-behind file. Primary key.
    pub file_name: Utf8PathBuf,
    /// Simple class name.
    pub class_name: String,
    /// Enclosing namespace. `None` for the global namespace.
    pub namespace: Option<String>,
    /// Current markup, if the class has a markup facet.
    pub markup: Option<MarkupDocument>,
    /// Current class node from the code-behind analysis.
    pub code: Option<ClassNode>,
    /// Simple names of the base types, filled on first code observation.
    pub base_types: Vec<String>,
    /// `true` until the code-behind has been observed once.
    pub needs_initialization: bool,
    /// `true` when the class shape changed and must be recompiled rather
    /// than only reloading its markup.
    pub needs_rebuild: bool,
}

impl ClassDeclaration {
    /// Creates a declaration named after the class a markup document declares.
    ///
    /// The markup itself is applied separately through
    /// [`update_markup`](Self::update_markup).
    #[must_use]
    pub fn from_markup(code_behind: impl Into<Utf8PathBuf>, doc: &MarkupDocument) -> Self {
        Self::new(
            code_behind.into(),
            doc.class_name().to_owned(),
            doc.namespace().map(str::to_owned),
        )
    }

    /// Creates a declaration for a class found in a code file.
    ///
    /// The class node itself is applied separately through
    /// [`update_code`](Self::update_code).
    #[must_use]
    pub fn from_code(code_file: impl Into<Utf8PathBuf>, class: &ClassNode) -> Self {
        Self::new(code_file.into(), class.name.clone(), class.namespace.clone())
    }

    fn new(file_name: Utf8PathBuf, class_name: String, namespace: Option<String>) -> Self {
        Self {
            file_name,
            class_name,
            namespace,
            markup: None,
            code: None,
            base_types: Vec::new(),
            needs_initialization: true,
            needs_rebuild: false,
        }
    }

    /// Returns the fully qualified class name.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.class_name),
            None => self.class_name.clone(),
        }
    }

    /// Returns the markup file path, if the class has a markup facet.
    #[must_use]
    pub fn markup_path(&self) -> Option<&Utf8Path> {
        self.markup.as_ref().map(|doc| doc.file_path.as_path())
    }

    /// Replaces the markup.
    ///
    /// Named elements become fields of the class, so a change to that set
    /// marks the class for rebuild. Returns `true` if it did.
    pub fn update_markup(&mut self, doc: MarkupDocument) -> bool {
        let fields_changed = self
            .markup
            .as_ref()
            .is_none_or(|old| old.named_elements() != doc.named_elements());
        if fields_changed {
            self.needs_rebuild = true;
        }
        self.markup = Some(doc);
        fields_changed
    }

    /// Extracts the one-time class metadata from the first code observation.
    pub fn fill_class_info(&mut self, class: &ClassNode) {
        self.namespace.clone_from(&class.namespace);
        self.base_types.clone_from(&class.base_types);
        self.needs_initialization = false;
    }

    /// Gives the class a new name, as when `x:Class` is edited.
    ///
    /// The generated class changes shape, so it is marked for rebuild.
    pub fn rename(&mut self, class_name: &str, namespace: Option<&str>) {
        class_name.clone_into(&mut self.class_name);
        self.namespace = namespace.map(str::to_owned);
        self.needs_rebuild = true;
    }

    /// Replaces the class node. Returns `true` if the code changed.
    pub fn update_code(&mut self, class: ClassNode) -> bool {
        let changed = self.code.as_ref() != Some(&class);
        if changed {
            self.needs_rebuild = true;
        }
        self.code = Some(class);
        changed
    }

    /// Builds the wire request that previews this class.
    ///
    /// The class source is only sent when the class must be rebuilt;
    /// otherwise the device reloads the markup into the compiled type.
    #[must_use]
    pub fn to_eval_request(&self) -> EvalRequest {
        let declarations = match (&self.code, self.needs_rebuild) {
            (Some(code), true) => self.compilation_unit(code),
            _ => String::new(),
        };

        EvalRequest {
            declarations,
            new_type_name: self.full_name(),
            original_type_name: None,
            needs_rebuild: self.needs_rebuild,
            xaml: self.markup.as_ref().map(|doc| doc.source.clone()),
            xaml_resource_name: self
                .markup_path()
                .and_then(Utf8Path::file_name)
                .map(str::to_owned),
        }
    }

    fn compilation_unit(&self, code: &ClassNode) -> String {
        let mut unit = String::new();
        for using in &code.usings {
            unit.push_str(using);
            unit.push('\n');
        }
        match &self.namespace {
            Some(ns) => {
                unit.push_str("namespace ");
                unit.push_str(ns);
                unit.push_str("\n{\n");
                unit.push_str(&code.source);
                unit.push_str("\n}\n");
            }
            None => {
                unit.push_str(&code.source);
                unit.push('\n');
            }
        }
        unit
    }
}
