//! Pre-compiled tree-sitter queries for C# code-behind analysis.
//!
//! This module provides the [`CLASS_QUERY`] constant containing S-expression
//! patterns for class declarations and using directives, and
//! [`get_class_query`] for lazily compiling and caching the query.

use std::sync::OnceLock;

use tree_sitter::{Language, Query};

use crate::error::ParseError;

/// Tree-sitter query for extracting class declarations from C#.
///
/// # Capture Names
///
/// - `class.name` - The class identifier
/// - `class.declaration` - The full `class_declaration` node
/// - `using.directive` - A `using` directive anywhere in the file
pub const CLASS_QUERY: &str = r"
; Class declarations with their name
(class_declaration
  name: (identifier) @class.name) @class.declaration

; using System; using static Foo; using Alias = Foo.Bar;
(using_directive) @using.directive
";

/// Capture index for `class.name`.
pub const CAPTURE_CLASS_NAME: u32 = 0;

/// Capture index for `class.declaration`.
pub const CAPTURE_CLASS_DECLARATION: u32 = 1;

/// Capture index for `using.directive`.
pub const CAPTURE_USING_DIRECTIVE: u32 = 2;

/// Global cache for the compiled class query.
static COMPILED_CLASS_QUERY: OnceLock<Query> = OnceLock::new();

/// Returns the C# language handle.
#[inline]
pub fn csharp_language() -> Language {
    tree_sitter_c_sharp::LANGUAGE.into()
}

/// Returns the compiled class query.
///
/// The query is compiled once and cached for all subsequent calls.
/// This function is thread-safe.
///
/// # Errors
///
/// Returns [`ParseError::QueryCompile`] if the query fails to compile.
pub fn get_class_query() -> Result<&'static Query, ParseError> {
    if let Some(query) = COMPILED_CLASS_QUERY.get() {
        return Ok(query);
    }

    let query = compile_query(&csharp_language())?;

    Ok(COMPILED_CLASS_QUERY.get_or_init(|| query))
}

fn compile_query(language: &Language) -> Result<Query, ParseError> {
    Query::new(language, CLASS_QUERY).map_err(|e| ParseError::QueryCompile {
        offset: e.offset,
        kind: e,
    })
}
