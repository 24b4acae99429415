//! Evaluation request and response exchanged with the preview service.
//!
//! Both messages are JSON with `PascalCase` field names, which is what
//! existing editor integrations send.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::result::EvalResult;

/// HTTP route accepting [`EvalRequest`] bodies.
pub const EVAL_ROUTE: &str = "/xaml";

/// A request to evaluate updated view-construction logic in the live process.
///
/// # Examples
///
/// ```
/// use xp_core::EvalRequest;
///
/// let json = r#"{"NewTypeName": "Demo.MainPage", "Xaml": "<ContentPage/>"}"#;
/// let request: EvalRequest = serde_json::from_str(json).unwrap();
/// assert_eq!(request.new_type_name, "Demo.MainPage");
/// assert!(request.declarations.is_empty());
/// assert!(!request.needs_rebuild);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EvalRequest {
    /// Source fragment to execute (the updated class declaration).
    pub declarations: String,

    /// Fully qualified name of the class to construct.
    pub new_type_name: String,

    /// Fully qualified name of the class as compiled into the running app,
    /// when it differs from `new_type_name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_type_name: Option<String>,

    /// Whether the class itself changed and must be recompiled, as opposed
    /// to only reloading its markup.
    pub needs_rebuild: bool,

    /// Markup text to load into the constructed view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaml: Option<String>,

    /// Resource name under which the markup is embedded in the app.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaml_resource_name: Option<String>,
}

/// The terminal answer of the preview service to an [`EvalRequest`].
///
/// # Examples
///
/// ```
/// use xp_core::EvalResponse;
///
/// let response = EvalResponse::default();
/// assert!(!response.preview_applied);
/// let json = serde_json::to_string(&response).unwrap();
/// assert!(json.contains("\"PreviewApplied\":false"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EvalResponse {
    /// Diagnostic messages produced during evaluation, in order.
    pub messages: Vec<String>,

    /// Evaluation time in milliseconds.
    pub duration_ms: u64,

    /// Whether the result was applied on the device's UI. `false` is the
    /// "no usable result" marker.
    pub preview_applied: bool,

    /// Evaluation or render failure description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvalResponse {
    /// Builds a response carrying the messages and timing of `result`.
    ///
    /// `preview_applied` starts out `false`; the service flips it once the
    /// UI context reports the result as applied.
    #[must_use]
    pub fn from_result(result: &EvalResult) -> Self {
        Self {
            messages: result.messages.clone(),
            duration_ms: duration_millis(result.duration),
            preview_applied: false,
            error: result.error_detail().map(str::to_owned),
        }
    }

    /// Returns the evaluation time as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
