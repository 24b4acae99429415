//! Incremental construction of class declarations from edited files.
//!
//! The editor calls [`DocumentModelBuilder::build_or_update`] with every
//! changed markup or code file. The builder finds the declaration the file
//! belongs to, creating it from the companion file when this is the first
//! time either facet is seen, and applies the edit to it in place.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, error, info, trace, warn};
use xp_core::DocumentConfig;
use xp_parser::{CSharpAnalysis, CodeAnalysis, MarkupDocument};

use crate::declaration::{ClassDeclaration, SharedClass};
use crate::error::DocumentError;
use crate::registry::ClassRegistry;
use crate::resolver::{CompanionFiles, FsCompanionFiles};

/// Which facet of a class an edited file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// A markup file (`MainPage.xaml`).
    Markup,
    /// A code-behind (`MainPage.xaml.cs`) or plain code file (`Badge.cs`).
    Code,
}

/// Turns file edits into up-to-date [`ClassDeclaration`]s.
///
/// The builder owns the [`ClassRegistry`]; all registry access goes through
/// it and happens on the caller's thread.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use xp_core::DocumentConfig;
/// use xp_document::{DocumentModelBuilder, MemoryCompanionFiles};
///
/// let mut files = MemoryCompanionFiles::new();
/// files.insert("Views/MainPage.xaml.cs", "");
///
/// let mut builder = DocumentModelBuilder::with_files(DocumentConfig::default(), files);
/// let markup = r#"<ContentPage x:Class="Demo.MainPage"><Label x:Name="title" /></ContentPage>"#;
/// let class = builder.build_or_update(Utf8Path::new("Views/MainPage.xaml"), markup, None).unwrap();
///
/// assert_eq!(class.read().full_name(), "Demo.MainPage");
/// assert_eq!(builder.registry().len(), 1);
/// ```
#[derive(Debug)]
pub struct DocumentModelBuilder<F = FsCompanionFiles> {
    config: DocumentConfig,
    registry: ClassRegistry,
    files: F,
}

impl DocumentModelBuilder<FsCompanionFiles> {
    /// Creates a builder that discovers companion files on disk.
    #[must_use]
    pub fn new(config: DocumentConfig) -> Self {
        Self::with_files(config, FsCompanionFiles)
    }
}

impl<F: CompanionFiles> DocumentModelBuilder<F> {
    /// Creates a builder that discovers companion files through `files`.
    #[must_use]
    pub fn with_files(config: DocumentConfig, files: F) -> Self {
        Self {
            config,
            registry: ClassRegistry::new(),
            files,
        }
    }

    /// Returns the registry of declarations built so far.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Returns the registry mutably, e.g. to clear it between sessions.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    /// Classifies `file`, or returns `None` for files this tool ignores.
    #[must_use]
    pub fn classify(&self, file: &Utf8Path) -> Option<EditKind> {
        let name = file.as_str();
        if name.ends_with(&self.config.markup_extension) {
            Some(EditKind::Markup)
        } else if name.ends_with(&self.config.code_extension) {
            Some(EditKind::Code)
        } else {
            None
        }
    }

    /// Applies an edit and returns the affected declaration.
    ///
    /// Resolution failures are logged and swallowed; see
    /// [`try_build_or_update`](Self::try_build_or_update) for the error.
    pub fn build_or_update(
        &mut self,
        file: &Utf8Path,
        text: &str,
        analysis: Option<&dyn CodeAnalysis>,
    ) -> Option<SharedClass> {
        match self.try_build_or_update(file, text, analysis) {
            Ok(class) => class,
            Err(e) if e.is_malformed_source() => {
                error!(path = %file, error = %e, "Malformed markup");
                None
            }
            Err(e) if !e.is_recoverable() => {
                error!(path = %file, error = %e, "Class identity conflict");
                None
            }
            Err(e) => {
                warn!(path = %file, error = %e, "Could not resolve class declaration");
                None
            }
        }
    }

    /// Applies an edit and returns the affected declaration.
    ///
    /// `analysis` is the caller's analysis of `text` for code edits. When it
    /// is `None`, the text is analysed here.
    ///
    /// Returns `Ok(None)` for files that are neither markup nor code.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::Markup`] if markup (edited or companion) is malformed
    /// - [`DocumentError::MissingCodeBehind`] for new markup without code-behind
    /// - [`DocumentError::NotAPreviewableView`] for new code without markup that
    ///   declares no single view class
    /// - [`DocumentError::ClassNotFound`] if the code lacks the expected class
    /// - [`DocumentError::Io`] if a companion file cannot be read
    pub fn try_build_or_update(
        &mut self,
        file: &Utf8Path,
        text: &str,
        analysis: Option<&dyn CodeAnalysis>,
    ) -> Result<Option<SharedClass>, DocumentError> {
        let Some(kind) = self.classify(file) else {
            trace!(path = %file, "Ignoring unsupported file");
            return Ok(None);
        };

        match kind {
            EditKind::Markup => self.apply_markup_edit(file, text).map(Some),
            EditKind::Code => {
                let parsed;
                let analysis = match analysis {
                    Some(analysis) => analysis,
                    None => {
                        parsed = CSharpAnalysis::parse(text)
                            .map_err(|e| DocumentError::parse(file, e))?;
                        &parsed as &dyn CodeAnalysis
                    }
                };
                self.apply_code_edit(file, analysis).map(Some)
            }
        }
    }

    fn apply_markup_edit(&mut self, file: &Utf8Path, text: &str) -> Result<SharedClass, DocumentError> {
        let doc = MarkupDocument::parse(file, text)?;
        let code_behind = self.code_behind_path(file);

        let existing = self
            .registry
            .find_by_file_name(&code_behind)
            .or_else(|| self.registry.find_by_full_name(&doc.declared_type));

        let class = match existing {
            Some(class) => {
                self.retarget(&class, &doc)?;
                class
            }
            None => {
                if !self.files.exists(&code_behind) {
                    return Err(DocumentError::missing_code_behind(file, code_behind));
                }
                info!(path = %file, class = %doc.declared_type, "New class from markup");
                self.registry
                    .register(ClassDeclaration::from_markup(code_behind, &doc))?
            }
        };

        let rebuild = class.write().update_markup(doc);
        debug!(path = %file, rebuild, "Applied markup edit");
        Ok(class)
    }

    /// Follows an `x:Class` change in already known markup.
    fn retarget(&mut self, class: &SharedClass, doc: &MarkupDocument) -> Result<(), DocumentError> {
        let mut decl = class.write();
        let old_name = decl.full_name();
        if old_name == doc.declared_type {
            return Ok(());
        }

        self.registry.rename(&old_name, &doc.declared_type)?;
        info!(from = %old_name, to = %doc.declared_type, "Class renamed in markup");
        decl.rename(doc.class_name(), doc.namespace());
        Ok(())
    }

    fn apply_code_edit(
        &mut self,
        file: &Utf8Path,
        analysis: &dyn CodeAnalysis,
    ) -> Result<SharedClass, DocumentError> {
        let class = match self.registry.find_by_file_name(file) {
            Some(class) => class,
            None => self.create_from_code(file, analysis)?,
        };

        let mut decl = class.write();
        let node = analysis
            .find_class(&decl.class_name)
            .ok_or_else(|| DocumentError::class_not_found(file, &decl.class_name))?
            .clone();

        // Re-key before touching the declaration so a conflict leaves it as it was.
        if decl.needs_initialization {
            let old_name = decl.full_name();
            let new_name = node.full_name();
            if old_name != new_name {
                self.registry.rename(&old_name, &new_name)?;
            }
            decl.fill_class_info(&node);
        }

        let rebuild = decl.update_code(node);
        drop(decl);

        debug!(path = %file, rebuild, "Applied code edit");
        Ok(class)
    }

    fn create_from_code(
        &mut self,
        file: &Utf8Path,
        analysis: &dyn CodeAnalysis,
    ) -> Result<SharedClass, DocumentError> {
        let markup_path = self
            .markup_path_for(file)
            .filter(|path| self.files.exists(path));

        let (node, markup) = match markup_path {
            Some(markup_path) => {
                let text = self
                    .files
                    .read_to_string(&markup_path)
                    .map_err(|e| DocumentError::io(&markup_path, e))?;
                let doc = MarkupDocument::parse(&markup_path, &text)?;
                let node = analysis
                    .find_class(doc.class_name())
                    .ok_or_else(|| DocumentError::class_not_found(file, doc.class_name()))?
                    .clone();
                (node, Some(doc))
            }
            None => {
                let node = analysis
                    .find_view_class(&self.config.view_base_types)
                    .map_err(|reason| DocumentError::not_previewable(file, reason))?
                    .clone();
                (node, None)
            }
        };

        info!(path = %file, class = %node.full_name(), "New class from code");
        let mut decl = ClassDeclaration::from_code(file, &node);
        if let Some(doc) = markup {
            decl.update_markup(doc);
        }
        self.registry.register(decl)
    }

    /// `Views/MainPage.xaml` -> `Views/MainPage.xaml.cs`
    fn code_behind_path(&self, markup: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{markup}{}", self.config.code_extension))
    }

    /// `Views/MainPage.xaml.cs` -> `Views/MainPage.xaml`; `None` for plain code files.
    fn markup_path_for(&self, code: &Utf8Path) -> Option<Utf8PathBuf> {
        code.as_str()
            .strip_suffix(&self.config.code_behind_extension())
            .map(|stem| Utf8PathBuf::from(format!("{stem}{}", self.config.markup_extension)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::resolver::MemoryCompanionFiles;

    const MARKUP_PATH: &str = "Views/MainPage.xaml";
    const CODE_PATH: &str = "Views/MainPage.xaml.cs";

    const MARKUP: &str = r#"<ContentPage xmlns="http://xamarin.com/schemas/2014/forms"
             xmlns:x="http://schemas.microsoft.com/winfx/2009/xaml"
             x:Class="Demo.Views.MainPage">
    <Label x:Name="title" Text="Hello" />
</ContentPage>"#;

    const CODE: &str = r"using Xamarin.Forms;

namespace Demo.Views
{
    public partial class MainPage : ContentPage
    {
        public MainPage() { InitializeComponent(); }
    }
}
";

    fn builder_with(files: &[(&str, &str)]) -> DocumentModelBuilder<MemoryCompanionFiles> {
        let mut memory = MemoryCompanionFiles::new();
        for (path, text) in files {
            memory.insert(*path, *text);
        }
        DocumentModelBuilder::with_files(DocumentConfig::default(), memory)
    }

    fn path(s: &str) -> &Utf8Path {
        Utf8Path::new(s)
    }

    fn assert_indices_agree(builder: &DocumentModelBuilder<MemoryCompanionFiles>) {
        let by_file = builder.registry().find_by_file_name(path(CODE_PATH)).unwrap();
        let by_name = builder
            .registry()
            .find_by_full_name("Demo.Views.MainPage")
            .unwrap();
        assert!(Arc::ptr_eq(&by_file, &by_name));
        assert_eq!(builder.registry().len(), 1);
    }

    #[test]
    fn test_classify() {
        let builder = builder_with(&[]);
        assert_eq!(builder.classify(path("A.xaml")), Some(EditKind::Markup));
        assert_eq!(builder.classify(path("A.xaml.cs")), Some(EditKind::Code));
        assert_eq!(builder.classify(path("Badge.cs")), Some(EditKind::Code));
        assert_eq!(builder.classify(path("README.md")), None);
    }

    #[test]
    fn test_unsupported_file_is_ignored() {
        let mut builder = builder_with(&[]);
        let result = builder.try_build_or_update(path("notes.txt"), "hello", None);
        assert!(matches!(result, Ok(None)));
        assert!(builder.registry().is_empty());
    }

    #[test]
    fn test_markup_then_code_share_instance() {
        let mut builder = builder_with(&[(CODE_PATH, CODE), (MARKUP_PATH, MARKUP)]);

        let from_markup = builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();
        let from_code = builder.build_or_update(path(CODE_PATH), CODE, None).unwrap();

        assert!(Arc::ptr_eq(&from_markup, &from_code));
        assert_indices_agree(&builder);

        let decl = from_code.read();
        assert!(!decl.needs_initialization);
        assert!(decl.markup.is_some());
        assert_eq!(decl.base_types, vec!["ContentPage"]);
    }

    #[test]
    fn test_code_then_markup_share_instance() {
        let mut builder = builder_with(&[(CODE_PATH, CODE), (MARKUP_PATH, MARKUP)]);

        let from_code = builder.build_or_update(path(CODE_PATH), CODE, None).unwrap();
        assert!(from_code.read().markup.is_some());

        let from_markup = builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();
        assert!(Arc::ptr_eq(&from_markup, &from_code));
        assert_indices_agree(&builder);
    }

    #[test]
    fn test_repeated_markup_edit_is_idempotent() {
        let mut builder = builder_with(&[(CODE_PATH, CODE)]);
        let first = builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();
        let second = builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.registry().len(), 1);
    }

    #[test]
    fn test_direct_register_of_existing_identity_fails() {
        let mut builder = builder_with(&[(CODE_PATH, CODE)]);
        builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();

        let doc = MarkupDocument::parse(MARKUP_PATH, MARKUP).unwrap();
        let err = builder
            .registry_mut()
            .register(ClassDeclaration::from_markup(CODE_PATH, &doc))
            .unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateRegistration { .. }));
    }

    #[test]
    fn test_markup_edit_updates_existing_declaration() {
        let mut builder = builder_with(&[(CODE_PATH, CODE)]);
        let class = builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();

        let edited = MARKUP.replace("Hello", "Goodbye");
        builder.build_or_update(path(MARKUP_PATH), &edited, None).unwrap();

        let decl = class.read();
        assert!(decl.markup.as_ref().unwrap().source.contains("Goodbye"));
    }

    #[test]
    fn test_markup_without_code_behind() {
        let mut builder = builder_with(&[]);
        let err = builder
            .try_build_or_update(path(MARKUP_PATH), MARKUP, None)
            .unwrap_err();
        assert!(matches!(err, DocumentError::MissingCodeBehind { .. }));
        assert!(builder.registry().is_empty());
        assert!(builder.build_or_update(path(MARKUP_PATH), MARKUP, None).is_none());
    }

    #[test]
    fn test_markup_without_type_name_produces_nothing() {
        let mut builder = builder_with(&[(CODE_PATH, CODE)]);
        let err = builder
            .try_build_or_update(path(MARKUP_PATH), "<ContentPage />", None)
            .unwrap_err();
        assert!(err.is_malformed_source());
        assert!(builder.registry().is_empty());
    }

    #[test]
    fn test_plain_code_file_with_view_class() {
        let mut builder = builder_with(&[]);
        let code = "namespace Demo.Controls { public class Badge : ContentView { } }";
        let class = builder.build_or_update(path("Controls/Badge.cs"), code, None).unwrap();

        let decl = class.read();
        assert_eq!(decl.full_name(), "Demo.Controls.Badge");
        assert!(decl.markup.is_none());
        assert!(decl.code.is_some());
    }

    #[test]
    fn test_code_without_markup_or_view_class() {
        let mut builder = builder_with(&[]);
        let code = "namespace Demo { public static class Helpers { } }";
        let err = builder
            .try_build_or_update(path("Helpers.cs"), code, None)
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotAPreviewableView { .. }));
        assert!(builder.registry().is_empty());
    }

    #[test]
    fn test_code_with_ambiguous_view_classes() {
        let mut builder = builder_with(&[]);
        let code = "class A : ContentView {} class B : ContentPage {}";
        let err = builder.try_build_or_update(path("Two.cs"), code, None).unwrap_err();
        assert!(matches!(err, DocumentError::NotAPreviewableView { .. }));
        assert!(builder.registry().is_empty());
    }

    #[test]
    fn test_code_missing_markup_class() {
        let mut builder = builder_with(&[(MARKUP_PATH, MARKUP)]);
        let code = "namespace Demo.Views { public partial class Renamed : ContentPage { } }";
        let err = builder.try_build_or_update(path(CODE_PATH), code, None).unwrap_err();
        assert!(matches!(err, DocumentError::ClassNotFound { ref class_name, .. } if class_name == "MainPage"));
        assert!(builder.registry().is_empty());
    }

    #[test]
    fn test_code_edit_marks_rebuild() {
        let mut builder = builder_with(&[(CODE_PATH, CODE), (MARKUP_PATH, MARKUP)]);
        let class = builder.build_or_update(path(CODE_PATH), CODE, None).unwrap();
        class.write().needs_rebuild = false;

        builder.build_or_update(path(CODE_PATH), CODE, None).unwrap();
        assert!(!class.read().needs_rebuild);

        let edited = CODE.replace("InitializeComponent();", "InitializeComponent(); Title = \"x\";");
        builder.build_or_update(path(CODE_PATH), &edited, None).unwrap();
        assert!(class.read().needs_rebuild);
    }

    #[test]
    fn test_namespace_change_rekeys_full_name_index() {
        let markup = MARKUP.replace("Demo.Views.MainPage", "Legacy.MainPage");
        let mut builder = builder_with(&[(CODE_PATH, CODE)]);
        let class = builder.build_or_update(path(MARKUP_PATH), &markup, None).unwrap();
        assert!(builder.registry().find_by_full_name("Legacy.MainPage").is_some());

        builder.build_or_update(path(CODE_PATH), CODE, None).unwrap();
        assert!(builder.registry().find_by_full_name("Legacy.MainPage").is_none());
        let by_name = builder
            .registry()
            .find_by_full_name("Demo.Views.MainPage")
            .unwrap();
        assert!(Arc::ptr_eq(&class, &by_name));
    }

    #[test]
    fn test_failed_rekey_leaves_declaration_untouched() {
        let other = "namespace Demo.Views { public class MainPage : ContentPage { } }";
        let markup = MARKUP.replace("Demo.Views.MainPage", "Legacy.MainPage");
        let mut builder = builder_with(&[(CODE_PATH, CODE)]);
        builder.build_or_update(path("Other/MainPage.cs"), other, None).unwrap();
        let class = builder.build_or_update(path(MARKUP_PATH), &markup, None).unwrap();

        let err = builder.try_build_or_update(path(CODE_PATH), CODE, None).unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateRegistration { ref key } if key == "Demo.Views.MainPage"));

        {
            let decl = class.read();
            assert_eq!(decl.full_name(), "Legacy.MainPage");
            assert!(decl.needs_initialization);
            assert!(decl.base_types.is_empty());
            assert!(decl.code.is_none());
        }
        let by_name = builder.registry().find_by_full_name("Legacy.MainPage").unwrap();
        assert!(Arc::ptr_eq(&class, &by_name));

        // Retrying hits the same conflict instead of silently succeeding.
        assert!(builder.build_or_update(path(CODE_PATH), CODE, None).is_none());
        assert!(class.read().needs_initialization);
        assert_eq!(builder.registry().len(), 2);
    }

    #[test]
    fn test_markup_class_rename_rekeys_declaration() {
        let mut builder = builder_with(&[(CODE_PATH, CODE)]);
        let class = builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();
        class.write().needs_rebuild = false;

        let renamed = MARKUP.replace("Demo.Views.MainPage", "Demo.Views.Renamed");
        let same = builder.build_or_update(path(MARKUP_PATH), &renamed, None).unwrap();
        assert!(Arc::ptr_eq(&class, &same));

        assert!(builder.registry().find_by_full_name("Demo.Views.MainPage").is_none());
        let by_name = builder.registry().find_by_full_name("Demo.Views.Renamed").unwrap();
        assert!(Arc::ptr_eq(&class, &by_name));
        assert_eq!(builder.registry().len(), 1);

        let decl = class.read();
        assert_eq!(decl.class_name, "Renamed");
        assert!(decl.needs_rebuild);
        assert_eq!(decl.to_eval_request().new_type_name, "Demo.Views.Renamed");
    }

    #[test]
    fn test_markup_class_rename_onto_taken_name() {
        let settings_markup = MARKUP.replace("Demo.Views.MainPage", "Demo.Views.Settings");
        let mut builder = builder_with(&[(CODE_PATH, CODE), ("Views/Settings.xaml.cs", "")]);
        let main = builder.build_or_update(path(MARKUP_PATH), MARKUP, None).unwrap();
        let settings = builder
            .build_or_update(path("Views/Settings.xaml"), &settings_markup, None)
            .unwrap();

        let err = builder
            .try_build_or_update(path("Views/Settings.xaml"), MARKUP, None)
            .unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateRegistration { .. }));

        let decl = settings.read();
        assert_eq!(decl.full_name(), "Demo.Views.Settings");
        assert!(decl.markup.as_ref().unwrap().source.contains("Demo.Views.Settings"));
        let by_name = builder.registry().find_by_full_name("Demo.Views.MainPage").unwrap();
        assert!(Arc::ptr_eq(&main, &by_name));
        let by_name = builder.registry().find_by_full_name("Demo.Views.Settings").unwrap();
        assert!(Arc::ptr_eq(&settings, &by_name));
    }

    struct UnreadableFiles;

    impl CompanionFiles for UnreadableFiles {
        fn exists(&self, _path: &Utf8Path) -> bool {
            true
        }

        fn read_to_string(&self, _path: &Utf8Path) -> std::io::Result<String> {
            Err(std::io::Error::other("device not ready"))
        }
    }

    #[test]
    fn test_unreadable_companion_markup() {
        let mut builder = DocumentModelBuilder::with_files(DocumentConfig::default(), UnreadableFiles);

        let err = builder.try_build_or_update(path(CODE_PATH), CODE, None).unwrap_err();
        assert!(matches!(err, DocumentError::Io { path: ref failed, .. } if failed == MARKUP_PATH));
        assert!(err.is_recoverable());

        assert!(builder.build_or_update(path(CODE_PATH), CODE, None).is_none());
        assert!(builder.registry().is_empty());
    }

    #[test]
    fn test_caller_supplied_analysis() {
        let analysis = CSharpAnalysis::parse(CODE).unwrap();
        let mut builder = builder_with(&[(MARKUP_PATH, MARKUP)]);
        let class = builder
            .build_or_update(path(CODE_PATH), "ignored", Some(&analysis))
            .unwrap();
        assert_eq!(class.read().class_name, "MainPage");
    }

    #[test]
    fn test_malformed_companion_markup() {
        let mut builder = builder_with(&[(MARKUP_PATH, "<ContentPage")]);
        let err = builder.try_build_or_update(path(CODE_PATH), CODE, None).unwrap_err();
        assert!(err.is_malformed_source());
    }

    #[test]
    fn test_fs_companion_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let markup_path = root.join("MainPage.xaml");
        let code_path = root.join("MainPage.xaml.cs");
        std::fs::write(&markup_path, MARKUP).unwrap();
        std::fs::write(&code_path, CODE).unwrap();

        let mut builder = DocumentModelBuilder::new(DocumentConfig::default());
        let class = builder.build_or_update(&code_path, CODE, None).unwrap();
        assert_eq!(class.read().markup_path(), Some(markup_path.as_path()));
    }
}
