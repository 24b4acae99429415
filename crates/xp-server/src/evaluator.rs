//! Executing evaluation requests inside the live process.
//!
//! [`Evaluator`] is what the service calls. [`Vm`] implements it on top of an
//! [`ExecutionEngine`], the host-provided capability that actually runs the
//! updated construction logic, and adds the guarantees the service relies
//! on: timing, ordered diagnostics, cancellation, and no panics escaping.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use xp_core::{EvalRequest, EvalResult, ResultHandle};

use crate::error::{ExecutionError, panic_message};

/// Failure detail for an execution that completed without a value.
pub const NO_VALUE_DETAIL: &str = "evaluation produced no value";

/// Failure detail for an execution stopped by its cancellation token.
pub const CANCELLED_DETAIL: &str = "evaluation cancelled";

/// Runs an [`EvalRequest`] and describes the outcome.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Evaluates `request`.
    ///
    /// Implementations report every failure inside the returned
    /// [`EvalResult`] rather than panicking.
    async fn evaluate(&self, request: &EvalRequest, cancel: CancellationToken) -> EvalResult;
}

/// Diagnostic output collected while executing one request, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Returns the messages collected so far.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Consumes the collection, returning its messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// The host's capability to run construction logic against its live objects.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Runs `request`, writing any diagnostic output to `diagnostics`.
    ///
    /// Returns the constructed object, or `None` if the code ran but
    /// produced nothing.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] if the code fails to compile or raises.
    async fn execute(
        &self,
        request: &EvalRequest,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<ResultHandle>, ExecutionError>;
}

/// [`Evaluator`] over an [`ExecutionEngine`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use xp_core::{EvalRequest, ResultHandle};
/// use xp_server::{Diagnostics, Evaluator, ExecutionEngine, ExecutionError, Vm};
///
/// struct Echo;
///
/// #[async_trait]
/// impl ExecutionEngine for Echo {
///     async fn execute(
///         &self,
///         request: &EvalRequest,
///         diagnostics: &mut Diagnostics,
///     ) -> Result<Option<ResultHandle>, ExecutionError> {
///         diagnostics.push("constructed");
///         Ok(Some(ResultHandle::new(request.new_type_name.clone(), ())))
///     }
/// }
///
/// # tokio_test(async {
/// let vm = Vm::new(Echo);
/// let request = EvalRequest { new_type_name: "Demo.Page".into(), ..Default::default() };
/// let result = vm.evaluate(&request, CancellationToken::new()).await;
/// assert!(result.has_result());
/// assert_eq!(result.messages, vec!["constructed"]);
/// # });
/// # fn tokio_test(f: impl std::future::Future<Output = ()>) {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct Vm<E> {
    engine: E,
}

impl<E: ExecutionEngine> Vm<E> {
    /// Wraps `engine`.
    #[must_use]
    pub const fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Returns the wrapped engine.
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }
}

#[async_trait]
impl<E: ExecutionEngine> Evaluator for Vm<E> {
    async fn evaluate(&self, request: &EvalRequest, cancel: CancellationToken) -> EvalResult {
        let started = Instant::now();
        let mut diagnostics = Diagnostics::new();

        let outcome = {
            let execution =
                AssertUnwindSafe(self.engine.execute(request, &mut diagnostics)).catch_unwind();
            tokio::select! {
                () = cancel.cancelled() => Err(CANCELLED_DETAIL.to_owned()),
                caught = execution => match caught {
                    Ok(Ok(Some(value))) => Ok(value),
                    Ok(Ok(None)) => Err(NO_VALUE_DETAIL.to_owned()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(payload) => Err(format!("evaluation panicked: {}", panic_message(&*payload))),
                },
            }
        };

        let duration = started.elapsed();
        let messages = diagnostics.into_messages();
        debug!(
            class = %request.new_type_name,
            ok = outcome.is_ok(),
            elapsed = ?duration,
            "Evaluated request"
        );

        match outcome {
            Ok(value) => EvalResult::success(value, messages, duration),
            Err(detail) => EvalResult::failure(detail, messages, duration),
        }
    }
}
