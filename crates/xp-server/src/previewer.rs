//! The rendering collaborator that shows evaluation results.
//!
//! A [`Previewer`] is only ever called on the UI context. The service never
//! touches it from a request task; see [`UiHandle`](crate::UiHandle).

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};
use xp_core::{EvalResult, ResultHandle, ViewModelBindings};

use crate::error::RenderError;

/// Title of the error view shown when rendering a result fails.
pub const RENDER_ERROR_TITLE: &str = "Preview failed";

/// Title of the error view shown when evaluation produced no result.
pub const EVALUATION_ERROR_TITLE: &str = "Evaluation failed";

/// A titled error shown in place of the preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorViewModel {
    /// Short headline.
    pub title: String,
    /// Full description.
    pub detail: String,
}

impl ErrorViewModel {
    /// Creates an error view.
    pub fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
        }
    }

    /// Creates an error view for a failed evaluation, including its
    /// diagnostic messages.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use xp_core::EvalResult;
    /// use xp_server::ErrorViewModel;
    ///
    /// let result = EvalResult::failure("CS0103", vec!["line 4".into()], Duration::ZERO);
    /// let view = ErrorViewModel::from_result("Evaluation failed", &result);
    /// assert_eq!(view.detail, "CS0103\nline 4");
    /// ```
    #[must_use]
    pub fn from_result(title: impl Into<String>, result: &EvalResult) -> Self {
        let mut detail = result
            .error_detail()
            .unwrap_or("evaluation produced no result")
            .to_owned();
        for message in &result.messages {
            detail.push('\n');
            detail.push_str(message);
        }
        Self::new(title, detail)
    }
}

/// Shows evaluation results on the application's UI surface.
#[async_trait]
pub trait Previewer: Send {
    /// Shows the value carried by `result`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if the value cannot be shown.
    async fn preview(&mut self, result: &EvalResult) -> Result<(), RenderError>;

    /// Shows an error view.
    async fn notify_error(&mut self, error: ErrorViewModel);
}

/// A view currently shown by the [`DefaultPreviewer`].
#[derive(Debug, Clone)]
pub struct PreviewedView {
    /// The constructed view.
    pub view: ResultHandle,
    /// The companion object bound to it, if one was registered for its type.
    pub binding: Option<ResultHandle>,
}

/// What the [`DefaultPreviewer`] is showing.
#[derive(Debug, Clone, Default)]
pub struct PreviewState {
    /// The last successfully previewed view.
    pub current: Option<PreviewedView>,
    /// The last error view shown.
    pub last_error: Option<ErrorViewModel>,
    /// Number of results applied.
    pub previews: u64,
    /// Number of error views shown.
    pub errors: u64,
}

/// Shared read access to a [`DefaultPreviewer`]'s state.
#[derive(Debug, Clone, Default)]
pub struct PreviewStateHandle(Arc<Mutex<PreviewState>>);

impl PreviewStateHandle {
    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PreviewState {
        self.0.lock().clone()
    }
}

/// Previewer that binds each view to its registered companion object and
/// records what it shows.
///
/// Hosts that render through a UI toolkit supply their own [`Previewer`];
/// this one keeps the state observable so the host can mirror it.
#[derive(Debug, Default)]
pub struct DefaultPreviewer {
    bindings: ViewModelBindings,
    state: PreviewStateHandle,
}

impl DefaultPreviewer {
    /// Creates a previewer with the given view-model bindings.
    #[must_use]
    pub fn new(bindings: ViewModelBindings) -> Self {
        Self {
            bindings,
            state: PreviewStateHandle::default(),
        }
    }

    /// Returns a handle for observing what is being shown.
    #[must_use]
    pub fn state(&self) -> PreviewStateHandle {
        self.state.clone()
    }
}

#[async_trait]
impl Previewer for DefaultPreviewer {
    async fn preview(&mut self, result: &EvalResult) -> Result<(), RenderError> {
        let view = result
            .result()
            .ok_or_else(|| RenderError::new("evaluation produced no view to show"))?
            .clone();
        let binding = self.bindings.get(view.type_name()).cloned();

        debug!(
            view = view.type_name(),
            bound = binding.is_some(),
            "Showing preview"
        );

        let mut state = self.state.0.lock();
        state.current = Some(PreviewedView { view, binding });
        state.last_error = None;
        state.previews += 1;
        Ok(())
    }

    async fn notify_error(&mut self, error: ErrorViewModel) {
        warn!(title = %error.title, detail = %error.detail, "Showing error view");
        let mut state = self.state.0.lock();
        state.last_error = Some(error);
        state.errors += 1;
    }
}
