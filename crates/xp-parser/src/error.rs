//! Error types for the xp-parser crate.
//!
//! [`ParseError`] covers tree-sitter failures while analysing code files.
//! [`MarkupError`] covers markup files that are not a usable view description.

use camino::Utf8PathBuf;

/// Errors that can occur while analysing a code file with tree-sitter.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Failed to set the C# language on the parser.
    #[error("failed to set C# language")]
    LanguageInit,

    /// Failed to compile a tree-sitter query.
    #[error("failed to compile query at offset {offset}: {kind:?}")]
    QueryCompile {
        /// The byte offset in the query string where the error occurred.
        offset: usize,
        /// The kind of query error.
        kind: tree_sitter::QueryError,
    },

    /// The parser produced no tree (cancelled or out of memory).
    #[error("failed to parse source code")]
    Parse,
}

/// A markup file that cannot be turned into a [`MarkupDocument`](crate::MarkupDocument).
///
/// Both variants are malformed-markup failures: the source must be fixed by
/// the user before it can be previewed.
///
/// # Examples
///
/// ```
/// use xp_parser::MarkupError;
///
/// let err = MarkupError::missing_type_name("Views/MainPage.xaml");
/// assert!(err.to_string().contains("Views/MainPage.xaml"));
/// assert_eq!(err.path().as_str(), "Views/MainPage.xaml");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    /// The text is not a single well-formed element tree.
    #[error("malformed markup in {path}: {reason}")]
    Malformed {
        /// The markup file.
        path: Utf8PathBuf,
        /// What the reader rejected.
        reason: String,
    },

    /// The root element does not name the class it declares.
    #[error("root element of {path} declares no class name")]
    MissingTypeName {
        /// The markup file.
        path: Utf8PathBuf,
    },
}

impl MarkupError {
    /// Creates a new [`MarkupError::Malformed`] error.
    #[inline]
    pub fn malformed(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`MarkupError::MissingTypeName`] error.
    #[inline]
    pub fn missing_type_name(path: impl Into<Utf8PathBuf>) -> Self {
        Self::MissingTypeName { path: path.into() }
    }

    /// Returns the markup file the error refers to.
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Malformed { path, .. } | Self::MissingTypeName { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display() {
        assert_eq!(ParseError::Parse.to_string(), "failed to parse source code");
        assert_eq!(ParseError::LanguageInit.to_string(), "failed to set C# language");
    }

    #[test]
    fn test_malformed_display() {
        let err = MarkupError::malformed("Main.xaml", "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "malformed markup in Main.xaml: unexpected end of file"
        );
    }
}
