//! Error types for the xp-document crate.
//!
//! This module provides the [`DocumentError`] type for failures while
//! resolving or updating a class declaration from an edited file.

use camino::Utf8PathBuf;
use xp_parser::{MarkupError, ParseError, ViewClassError};

/// Errors that can occur while building or updating a class declaration.
///
/// # Error Recovery Strategy
///
/// Every variant except [`DocumentError::DuplicateRegistration`] describes an
/// edit outside the supported scope or a transient file problem. The builder
/// logs them and produces no declaration; the next edit retries.
/// [`DocumentError::DuplicateRegistration`] means a caller tried to create a
/// second declaration for an identity that already has one.
///
/// # Examples
///
/// ```
/// use xp_document::DocumentError;
///
/// let err = DocumentError::missing_code_behind("Views/MainPage.xaml", "Views/MainPage.xaml.cs");
/// assert!(err.is_recoverable());
/// assert_eq!(err.path().map(|p| p.as_str()), Some("Views/MainPage.xaml"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The markup text could not be parsed.
    #[error(transparent)]
    Markup(#[from] MarkupError),

    /// The code text could not be analysed.
    #[error("failed to analyse {path}: {source}")]
    Parse {
        /// The code file.
        path: Utf8PathBuf,
        /// The underlying parse error.
        #[source]
        source: ParseError,
    },

    /// A markup file has no code-behind file next to it.
    #[error("markup file {markup} has no code-behind file (expected {expected})")]
    MissingCodeBehind {
        /// The markup file.
        markup: Utf8PathBuf,
        /// Where the code-behind file was looked for.
        expected: Utf8PathBuf,
    },

    /// A code file without markup declares no single view class.
    #[error("{path} does not declare a previewable view: {reason}")]
    NotAPreviewableView {
        /// The code file.
        path: Utf8PathBuf,
        /// Why no class qualified.
        #[source]
        reason: ViewClassError,
    },

    /// The class named by the markup is not declared in the code file.
    #[error("class {class_name} not found in {path}")]
    ClassNotFound {
        /// The code file.
        path: Utf8PathBuf,
        /// The class that was looked for.
        class_name: String,
    },

    /// A companion file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A declaration already occupies the file-name or full-name index.
    #[error("a class declaration is already registered for {key}")]
    DuplicateRegistration {
        /// The occupied key.
        key: String,
    },
}

impl DocumentError {
    /// Creates a new [`DocumentError::Parse`] error.
    #[inline]
    pub fn parse(path: impl Into<Utf8PathBuf>, source: ParseError) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`DocumentError::MissingCodeBehind`] error.
    #[inline]
    pub fn missing_code_behind(
        markup: impl Into<Utf8PathBuf>,
        expected: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self::MissingCodeBehind {
            markup: markup.into(),
            expected: expected.into(),
        }
    }

    /// Creates a new [`DocumentError::NotAPreviewableView`] error.
    #[inline]
    pub fn not_previewable(path: impl Into<Utf8PathBuf>, reason: ViewClassError) -> Self {
        Self::NotAPreviewableView {
            path: path.into(),
            reason,
        }
    }

    /// Creates a new [`DocumentError::ClassNotFound`] error.
    #[inline]
    pub fn class_not_found(path: impl Into<Utf8PathBuf>, class_name: impl Into<String>) -> Self {
        Self::ClassNotFound {
            path: path.into(),
            class_name: class_name.into(),
        }
    }

    /// Creates a new [`DocumentError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`DocumentError::DuplicateRegistration`] error.
    #[inline]
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::DuplicateRegistration { key: key.into() }
    }

    /// Returns `true` if the next edit may succeed where this one failed.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::DuplicateRegistration { .. })
    }

    /// Returns `true` if the source itself must be fixed by the user.
    #[inline]
    #[must_use]
    pub const fn is_malformed_source(&self) -> bool {
        matches!(self, Self::Markup(_))
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Markup(e) => Some(e.path()),
            Self::Parse { path, .. }
            | Self::NotAPreviewableView { path, .. }
            | Self::ClassNotFound { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::MissingCodeBehind { markup, .. } => Some(markup),
            Self::DuplicateRegistration { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_display() {
        let err = DocumentError::io(
            "Views/MainPage.xaml",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "failed to read Views/MainPage.xaml: denied");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_duplicate_is_not_recoverable() {
        let err = DocumentError::duplicate("Demo.MainPage");
        assert!(!err.is_recoverable());
        assert!(err.path().is_none());
    }

    #[test]
    fn test_markup_error_is_malformed_source() {
        let err: DocumentError = MarkupError::missing_type_name("Page.xaml").into();
        assert!(err.is_malformed_source());
        assert_eq!(err.path().map(|p| p.as_str()), Some("Page.xaml"));
    }

    #[test]
    fn test_not_previewable_display() {
        let err = DocumentError::not_previewable("Helpers.cs", ViewClassError::NotFound);
        assert_eq!(
            err.to_string(),
            "Helpers.cs does not declare a previewable view: no class derives from a known view base type"
        );
    }
}
