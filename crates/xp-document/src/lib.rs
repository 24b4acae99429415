//! Class declaration registry and incremental document model builder.
//!
//! The editor side of a live preview session feeds every changed markup and
//! code file through a [`DocumentModelBuilder`]. The builder keeps one
//! [`ClassDeclaration`] per view class in its [`ClassRegistry`], reachable by
//! code-behind path and by fully qualified name, and updates it in place so
//! anyone holding a [`SharedClass`] sees the latest state.
//!
//! A declaration turns into the wire [`EvalRequest`](xp_core::EvalRequest)
//! through [`ClassDeclaration::to_eval_request`].
//!
//! # Error Handling
//!
//! [`DocumentModelBuilder::build_or_update`] logs resolution failures and
//! returns `None`, so the editor simply retries on the next edit.
//! [`DocumentModelBuilder::try_build_or_update`] exposes the
//! [`DocumentError`] for callers that report it themselves.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod builder;
pub mod declaration;
pub mod error;
pub mod registry;
pub mod resolver;

pub use builder::{DocumentModelBuilder, EditKind};
pub use declaration::{ClassDeclaration, SharedClass};
pub use error::DocumentError;
pub use registry::ClassRegistry;
pub use resolver::{CompanionFiles, FsCompanionFiles, MemoryCompanionFiles};
