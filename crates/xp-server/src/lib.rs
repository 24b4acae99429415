//! Device-side half of a xaml-preview session.
//!
//! The running application hosts a [`PreviewServer`]. The editor posts an
//! [`EvalRequest`](xp_core::EvalRequest) to it; the server runs the request
//! through an [`Evaluator`] and, when a view comes back, hands it to the
//! [`Previewer`] on the application's UI context before answering.
//!
//! # Architecture
//!
//! ```text
//! editor ──POST /xaml──▶ routes ──▶ Evaluator (Vm<ExecutionEngine>)
//!                          │
//!                          └──UiHandle──▶ UI thread ──▶ Previewer
//!
//! DiscoveryBroadcaster ──UDP──▶ DiscoveryListener (editor)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use xp_core::{Config, EvalRequest, ResultHandle};
//! use xp_server::{
//!     Diagnostics, ExecutionEngine, ExecutionError, PreviewServer, StartOptions, UiContext, Vm,
//! };
//!
//! struct Host;
//!
//! #[async_trait]
//! impl ExecutionEngine for Host {
//!     async fn execute(
//!         &self,
//!         request: &EvalRequest,
//!         _diagnostics: &mut Diagnostics,
//!     ) -> Result<Option<ResultHandle>, ExecutionError> {
//!         Ok(Some(ResultHandle::new(request.new_type_name.clone(), ())))
//!     }
//! }
//!
//! # async fn run() {
//! let config = Config::default();
//! let ui = UiContext::spawn().unwrap();
//! let mut server = PreviewServer::new(config.server, config.discovery, Arc::new(Vm::new(Host)));
//! assert!(server.start(ui.handle(), StartOptions::default()).await);
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod discovery;
pub mod error;
pub mod evaluator;
pub mod previewer;
mod routes;
pub mod server;
pub mod ui;

pub use discovery::{DiscoveryBroadcaster, DiscoveryListener};
pub use error::{DiscoveryError, ExecutionError, RenderError, ServerError, UiError};
pub use evaluator::{Diagnostics, Evaluator, ExecutionEngine, Vm};
pub use previewer::{
    DefaultPreviewer, ErrorViewModel, PreviewState, PreviewStateHandle, PreviewedView, Previewer,
};
pub use server::{PreviewServer, ServerState, StartOptions};
pub use ui::{UiContext, UiHandle};
