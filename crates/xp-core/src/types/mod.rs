//! Domain types shared by the editor side and the device side.
//!
//! # Module Organization
//!
//! - [`protocol`] - Evaluation request/response exchanged over HTTP
//! - [`result`] - In-process evaluation outcome handed to the UI
//! - [`discovery`] - Local-network service advertisement
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use xp_core::{EvalRequest, EvalResponse, EvalResult, DiscoveryAdvert};
//! ```

pub mod discovery;
pub mod protocol;
pub mod result;

pub use discovery::DiscoveryAdvert;
pub use protocol::{EVAL_ROUTE, EvalRequest, EvalResponse};
pub use result::{EvalFailure, EvalOutcome, EvalResult, ResultHandle, ViewModelBindings};
