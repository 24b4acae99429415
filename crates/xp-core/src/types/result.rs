//! Evaluation outcome as seen inside the live process.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::hash::FxHashMap;

/// Opaque handle to an object living in the previewed process.
///
/// Carries the object's type name so collaborators can log and look up
/// bindings without downcasting.
#[derive(Clone)]
pub struct ResultHandle {
    type_name: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl ResultHandle {
    /// Wraps `value`, recording `type_name` as its view type.
    ///
    /// # Examples
    ///
    /// ```
    /// use xp_core::ResultHandle;
    ///
    /// let handle = ResultHandle::new("Demo.MainPage", String::from("page"));
    /// assert_eq!(handle.type_name(), "Demo.MainPage");
    /// assert_eq!(handle.downcast_ref::<String>().map(String::as_str), Some("page"));
    /// assert!(handle.downcast_ref::<u32>().is_none());
    /// ```
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value: Arc::new(value),
        }
    }

    /// Returns the type name recorded for the object.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the object if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns `true` if both handles point at the same object.
    #[must_use]
    pub fn same_object(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Pre-built companion objects keyed by the fully qualified view type they
/// are bound to.
pub type ViewModelBindings = FxHashMap<String, ResultHandle>;

/// Why an evaluation produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalFailure {
    /// Human-readable description of the failure.
    pub detail: String,
}

/// Either the value an evaluation produced or the reason it did not.
#[derive(Debug, Clone)]
pub enum EvalOutcome {
    /// Execution completed with a value.
    Value(ResultHandle),
    /// Execution raised an error or produced nothing.
    Failed(EvalFailure),
}

/// The structured result of one evaluation.
///
/// The error detail is present exactly when there is no result; the
/// [`EvalOutcome`] enum makes the two mutually exclusive.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use xp_core::{EvalResult, ResultHandle};
///
/// let ok = EvalResult::success(ResultHandle::new("Demo.Page", ()), vec![], Duration::ZERO);
/// assert!(ok.has_result());
/// assert!(ok.error_detail().is_none());
///
/// let failed = EvalResult::failure("boom", vec![], Duration::ZERO);
/// assert!(!failed.has_result());
/// assert_eq!(failed.error_detail(), Some("boom"));
/// ```
#[derive(Debug, Clone)]
pub struct EvalResult {
    /// Value or failure.
    pub outcome: EvalOutcome,
    /// Diagnostic output captured during execution, in order.
    pub messages: Vec<String>,
    /// Elapsed execution time.
    pub duration: Duration,
}

impl EvalResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(value: ResultHandle, messages: Vec<String>, duration: Duration) -> Self {
        Self {
            outcome: EvalOutcome::Value(value),
            messages,
            duration,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(detail: impl Into<String>, messages: Vec<String>, duration: Duration) -> Self {
        Self {
            outcome: EvalOutcome::Failed(EvalFailure {
                detail: detail.into(),
            }),
            messages,
            duration,
        }
    }

    /// Returns `true` if execution completed with a value.
    #[inline]
    #[must_use]
    pub const fn has_result(&self) -> bool {
        matches!(self.outcome, EvalOutcome::Value(_))
    }

    /// Returns the produced value, if any.
    #[must_use]
    pub fn result(&self) -> Option<&ResultHandle> {
        match &self.outcome {
            EvalOutcome::Value(value) => Some(value),
            EvalOutcome::Failed(_) => None,
        }
    }

    /// Returns the failure description, if execution failed.
    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        match &self.outcome {
            EvalOutcome::Value(_) => None,
            EvalOutcome::Failed(failure) => Some(&failure.detail),
        }
    }
}
