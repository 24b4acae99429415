//! Error types for the xp-server crate.
//!
//! - [`ServerError`] - starting the evaluation service
//! - [`UiError`] - handing work to the UI context
//! - [`RenderError`] - a previewer failing to show a result
//! - [`ExecutionError`] - the live execution capability failing
//! - [`DiscoveryError`] - sending or receiving discovery adverts

use std::any::Any;

/// Errors that can occur while starting the evaluation service.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Every candidate port was unavailable.
    #[error("no free port between {first} and {last}")]
    PortRangeExhausted {
        /// First port tried.
        first: u16,
        /// Last port tried.
        last: u16,
    },

    /// The UI context shut down before the service was started.
    #[error("UI context is not running")]
    UiUnavailable,

    /// The bound listener could not report its address.
    #[error("failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

impl ServerError {
    /// Creates a new [`ServerError::PortRangeExhausted`] error.
    #[inline]
    #[must_use]
    pub const fn port_range_exhausted(first: u16, last: u16) -> Self {
        Self::PortRangeExhausted { first, last }
    }
}

/// A previewer could not show an evaluation result.
///
/// # Examples
///
/// ```
/// use xp_server::RenderError;
///
/// let err = RenderError::new("page has no content");
/// assert_eq!(err.to_string(), "page has no content");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    /// Creates a render error with a description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors reported back from the UI context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UiError {
    /// The UI context has shut down.
    #[error("UI context has shut down")]
    Closed,

    /// No previewer has been installed yet.
    #[error("no previewer installed")]
    NoPreviewer,

    /// The previewer failed to render the result.
    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),

    /// The previewer panicked while rendering.
    #[error("previewer panicked: {0}")]
    Panicked(String),
}

/// The live execution capability failed to run a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
}

impl ExecutionError {
    /// Creates an execution error with a description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can occur on the discovery channel.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Failed to open or configure the UDP socket.
    #[error("failed to open discovery socket: {0}")]
    Socket(#[source] std::io::Error),

    /// Failed to receive a datagram.
    #[error("failed to receive discovery advert: {0}")]
    Recv(#[source] std::io::Error),
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_range_display() {
        let err = ServerError::port_range_exhausted(8488, 8497);
        assert_eq!(err.to_string(), "no free port between 8488 and 8497");
    }

    #[test]
    fn test_ui_error_from_render() {
        let err: UiError = RenderError::new("boom").into();
        assert_eq!(err.to_string(), "rendering failed: boom");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
