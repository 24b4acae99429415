//! Core types, errors, and configuration for the xaml-preview workspace.
//!
//! This crate provides the foundational pieces shared by the editor side and
//! the device side of a live preview session:
//!
//! - Configuration structures ([`Config`] and its sections)
//! - [`ConfigError`] for configuration loading and validation
//! - Wire types exchanged over the network ([`EvalRequest`], [`EvalResponse`],
//!   [`DiscoveryAdvert`])
//! - The in-process evaluation outcome ([`EvalResult`], [`ResultHandle`])
//! - The `FxHashMap` alias used for internal indexes

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{Config, DiscoveryConfig, DocumentConfig, ServerConfig};
pub use error::ConfigError;
pub use hash::{FxHashMap, fx_hash_map};
pub use types::{
    DiscoveryAdvert, EVAL_ROUTE, EvalFailure, EvalOutcome, EvalRequest, EvalResponse, EvalResult,
    ResultHandle, ViewModelBindings,
};
