//! Markup document model and code-behind analysis for xaml-preview.
//!
//! This crate turns the two source facets of a view class into structured
//! data the document builder can work with:
//!
//! - [`MarkupDocument::parse`] reads a markup file into its declared class
//!   name and element tree
//! - [`CSharpAnalysis::parse`] reads a code file with tree-sitter and exposes
//!   its class declarations through the [`CodeAnalysis`] trait
//!
//! # Markup
//!
//! ```
//! use xp_parser::MarkupDocument;
//!
//! let text = r#"<ContentPage xmlns="http://xamarin.com/schemas/2014/forms"
//!     xmlns:x="http://schemas.microsoft.com/winfx/2009/xaml"
//!     x:Class="Demo.MainPage">
//!     <Label x:Name="title" Text="Hello" />
//! </ContentPage>"#;
//!
//! let doc = MarkupDocument::parse("Views/MainPage.xaml", text)?;
//! assert_eq!(doc.declared_type, "Demo.MainPage");
//! assert_eq!(doc.class_name(), "MainPage");
//! assert_eq!(doc.root.children[0].tag_name, "Label");
//! # Ok::<(), xp_parser::MarkupError>(())
//! ```
//!
//! # Code-behind
//!
//! ```
//! use xp_parser::{CSharpAnalysis, CodeAnalysis};
//!
//! let source = r#"
//! namespace Demo
//! {
//!     public partial class MainPage : ContentPage
//!     {
//!         public MainPage() { InitializeComponent(); }
//!     }
//! }
//! "#;
//!
//! let analysis = CSharpAnalysis::parse(source)?;
//! let class = analysis.find_class("MainPage").expect("class is declared");
//! assert_eq!(class.full_name(), "Demo.MainPage");
//! assert_eq!(class.base_types, vec!["ContentPage"]);
//! # Ok::<(), xp_parser::ParseError>(())
//! ```
//!
//! # Thread Safety
//!
//! Both entry points are pure functions of their input. The compiled
//! tree-sitter query is shared globally; parsers are created per call.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod analysis;
mod csharp;
pub mod error;
pub mod markup;
pub mod queries;

pub use analysis::{ClassNode, CodeAnalysis, ViewClassError};
pub use csharp::CSharpAnalysis;
pub use error::{MarkupError, ParseError};
pub use markup::{MarkupDocument, MarkupElement, NamedElement};
