//! Access to the files that sit next to an edited file.
//!
//! The builder only needs to know whether a companion file exists and what
//! it contains. [`FsCompanionFiles`] answers from disk;
//! [`MemoryCompanionFiles`] answers from buffers held by the caller, which is
//! how editors with unsaved files and tests use the builder.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use xp_core::FxHashMap;

/// File existence and read capability used for companion-file discovery.
pub trait CompanionFiles {
    /// Returns `true` if `path` names an existing file.
    fn exists(&self, path: &Utf8Path) -> bool;

    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String>;
}

/// Companion files on the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCompanionFiles;

impl CompanionFiles for FsCompanionFiles {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        std::fs::read_to_string(path.as_std_path())
    }
}

/// Companion files held in memory.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use xp_document::{CompanionFiles, MemoryCompanionFiles};
///
/// let mut files = MemoryCompanionFiles::new();
/// files.insert("Views/MainPage.xaml.cs", "partial class MainPage {}");
///
/// assert!(files.exists(Utf8Path::new("Views/MainPage.xaml.cs")));
/// assert!(!files.exists(Utf8Path::new("Views/Other.xaml.cs")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCompanionFiles {
    files: FxHashMap<Utf8PathBuf, String>,
}

impl MemoryCompanionFiles {
    /// Creates an empty set of files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the file at `path`.
    pub fn insert(&mut self, path: impl Into<Utf8PathBuf>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }
}

impl CompanionFiles for MemoryCompanionFiles {
    fn exists(&self, path: &Utf8Path) -> bool {
        self.files.contains_key(path)
    }

    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_companion_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let file = root.join("MainPage.xaml");
        std::fs::write(&file, "<ContentPage />").unwrap();

        let files = FsCompanionFiles;
        assert!(files.exists(&file));
        assert!(!files.exists(&root.join("Missing.xaml")));
        assert!(!files.exists(root));
        assert_eq!(files.read_to_string(&file).unwrap(), "<ContentPage />");
    }

    #[test]
    fn test_memory_read_missing() {
        let files = MemoryCompanionFiles::new();
        let err = files.read_to_string(Utf8Path::new("Nope.xaml")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
