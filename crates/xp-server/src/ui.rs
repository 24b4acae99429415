//! The UI execution context and the hand-off into it.
//!
//! ```text
//! ┌──────────────────────────┐   UiCommand (mpsc)   ┌──────────────────────────┐
//! │  request tasks (tokio)   │ ───────────────────▶ │  UI thread               │
//! │  UiHandle::preview()     │                      │  current-thread runtime  │
//! │  awaits oneshot          │ ◀─────────────────── │  owns the Previewer      │
//! └──────────────────────────┘   Result (oneshot)   └──────────────────────────┘
//! ```
//!
//! The previewer lives on the UI thread and is only reachable through
//! commands, so nothing on a request task can call into it directly.
//! Commands run one at a time in arrival order.

use std::fmt;
use std::io;
use std::panic::AssertUnwindSafe;
use std::thread::{JoinHandle, ThreadId};

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use xp_core::EvalResult;

use crate::error::{UiError, panic_message};
use crate::previewer::{ErrorViewModel, Previewer, RENDER_ERROR_TITLE};

enum UiCommand {
    InstallPreviewer(Box<dyn Previewer>),
    Preview {
        result: EvalResult,
        done: oneshot::Sender<Result<(), UiError>>,
    },
    NotifyError(ErrorViewModel),
}

impl fmt::Debug for UiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallPreviewer(_) => f.write_str("InstallPreviewer"),
            Self::Preview { result, .. } => f.debug_struct("Preview").field("result", result).finish(),
            Self::NotifyError(error) => f.debug_tuple("NotifyError").field(error).finish(),
        }
    }
}

/// A dedicated thread acting as the application's UI execution context.
///
/// Dropping the context stops the thread once the command in progress
/// finishes; [`shutdown`](Self::shutdown) also waits for it.
pub struct UiContext {
    handle: UiHandle,
    shutdown: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for UiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiContext")
            .field("thread_id", &self.handle.thread_id)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl UiContext {
    /// Starts the UI thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread or its runtime cannot be created.
    pub fn spawn() -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let thread = std::thread::Builder::new()
            .name("xp-ui".to_owned())
            .spawn(move || runtime.block_on(run_ui_loop(rx, token)))?;

        let handle = UiHandle {
            tx,
            thread_id: thread.thread().id(),
        };

        Ok(Self {
            handle,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Returns a handle for scheduling work on this context.
    #[must_use]
    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    /// Returns the id of the UI thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread_id
    }

    /// Returns `true` while the UI thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the UI thread and waits for it to exit.
    ///
    /// Commands still queued are dropped; their callers see [`UiError::Closed`].
    pub fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("UI thread panicked");
            }
        }
    }
}

impl Drop for UiContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// The captured UI execution context.
///
/// Cheap to clone; every clone schedules onto the same thread.
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiCommand>,
    thread_id: ThreadId,
}

impl fmt::Debug for UiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiHandle")
            .field("thread_id", &self.thread_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl UiHandle {
    /// Returns the id of the UI thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Returns `true` if the UI context has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Replaces the previewer used for subsequent commands.
    ///
    /// # Errors
    ///
    /// Returns [`UiError::Closed`] if the UI context has shut down.
    pub fn install_previewer(&self, previewer: Box<dyn Previewer>) -> Result<(), UiError> {
        self.send(UiCommand::InstallPreviewer(previewer))
    }

    /// Shows `result` on the UI context and waits until it has been applied.
    ///
    /// A render failure has already been reported through the previewer's
    /// error view by the time this returns.
    ///
    /// # Errors
    ///
    /// - [`UiError::Closed`] if the UI context shut down before answering
    /// - [`UiError::NoPreviewer`] if no previewer is installed
    /// - [`UiError::Render`] or [`UiError::Panicked`] if rendering failed
    pub async fn preview(&self, result: EvalResult) -> Result<(), UiError> {
        let (done, answer) = oneshot::channel();
        self.send(UiCommand::Preview { result, done })?;
        answer.await.map_err(|_| UiError::Closed)?
    }

    /// Shows an error view on the UI context without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`UiError::Closed`] if the UI context has shut down.
    pub fn notify_error(&self, error: ErrorViewModel) -> Result<(), UiError> {
        self.send(UiCommand::NotifyError(error))
    }

    fn send(&self, command: UiCommand) -> Result<(), UiError> {
        self.tx.send(command).map_err(|_| UiError::Closed)
    }
}

async fn run_ui_loop(mut rx: mpsc::UnboundedReceiver<UiCommand>, shutdown: CancellationToken) {
    info!("UI context started");
    let mut previewer: Option<Box<dyn Previewer>> = None;

    loop {
        let command = tokio::select! {
            () = shutdown.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            UiCommand::InstallPreviewer(next) => {
                debug!("Previewer installed");
                previewer = Some(next);
            }
            UiCommand::Preview { result, done } => {
                let outcome = match previewer.as_deref_mut() {
                    Some(previewer) => render(previewer, &result).await,
                    None => Err(UiError::NoPreviewer),
                };
                if done.send(outcome).is_err() {
                    debug!("Preview requester stopped waiting");
                }
            }
            UiCommand::NotifyError(error) => match previewer.as_deref_mut() {
                Some(previewer) => report(previewer, error).await,
                None => warn!(title = %error.title, "No previewer installed to show error"),
            },
        }
    }

    info!("UI context stopped");
}

async fn render(previewer: &mut dyn Previewer, result: &EvalResult) -> Result<(), UiError> {
    let attempt = AssertUnwindSafe(previewer.preview(result))
        .catch_unwind()
        .await;

    let error = match attempt {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => UiError::Render(e),
        Err(payload) => UiError::Panicked(panic_message(&*payload)),
    };

    error!(error = %error, "Failed to render preview");
    report(previewer, ErrorViewModel::new(RENDER_ERROR_TITLE, error.to_string())).await;
    Err(error)
}

async fn report(previewer: &mut dyn Previewer, error: ErrorViewModel) {
    if AssertUnwindSafe(previewer.notify_error(error))
        .catch_unwind()
        .await
        .is_err()
    {
        error!("Previewer panicked while showing an error view");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use xp_core::ResultHandle;

    use super::*;
    use crate::error::RenderError;

    #[derive(Default)]
    struct Log {
        previews: Vec<ThreadId>,
        errors: Vec<(ThreadId, ErrorViewModel)>,
    }

    struct Recording {
        log: Arc<Mutex<Log>>,
        fail_with: Option<&'static str>,
        panic: bool,
    }

    #[async_trait]
    impl Previewer for Recording {
        async fn preview(&mut self, _result: &EvalResult) -> Result<(), RenderError> {
            assert!(!self.panic, "render exploded");
            self.log.lock().previews.push(std::thread::current().id());
            self.fail_with.map_or(Ok(()), |message| Err(RenderError::new(message)))
        }

        async fn notify_error(&mut self, error: ErrorViewModel) {
            self.log
                .lock()
                .errors
                .push((std::thread::current().id(), error));
        }
    }

    fn recording(fail_with: Option<&'static str>, panic: bool) -> (Box<dyn Previewer>, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let previewer = Recording {
            log: Arc::clone(&log),
            fail_with,
            panic,
        };
        (Box::new(previewer), log)
    }

    fn success() -> EvalResult {
        EvalResult::success(ResultHandle::new("Demo.Page", ()), vec![], Duration::ZERO)
    }

    #[tokio::test]
    async fn test_preview_runs_on_ui_thread() {
        let ui = UiContext::spawn().unwrap();
        let handle = ui.handle();
        let (previewer, log) = recording(None, false);
        handle.install_previewer(previewer).unwrap();

        handle.preview(success()).await.unwrap();

        let log = log.lock();
        assert_eq!(log.previews, vec![ui.thread_id()]);
        assert_ne!(ui.thread_id(), std::thread::current().id());
    }

    #[tokio::test]
    async fn test_render_failure_is_reported() {
        let ui = UiContext::spawn().unwrap();
        let handle = ui.handle();
        let (previewer, log) = recording(Some("no content"), false);
        handle.install_previewer(previewer).unwrap();

        let err = handle.preview(success()).await.unwrap_err();
        assert_eq!(err, UiError::Render(RenderError::new("no content")));

        let log = log.lock();
        assert_eq!(log.errors.len(), 1);
        assert_eq!(log.errors[0].0, ui.thread_id());
        assert_eq!(log.errors[0].1.title, RENDER_ERROR_TITLE);
    }

    #[tokio::test]
    async fn test_render_panic_is_caught() {
        let ui = UiContext::spawn().unwrap();
        let handle = ui.handle();
        let (previewer, log) = recording(None, true);
        handle.install_previewer(previewer).unwrap();

        let err = handle.preview(success()).await.unwrap_err();
        assert!(matches!(err, UiError::Panicked(ref m) if m.contains("render exploded")));
        assert_eq!(log.lock().errors.len(), 1);

        // The context survives the panic.
        assert!(ui.is_running());
        assert!(handle.preview(success()).await.is_err());
    }

    #[tokio::test]
    async fn test_preview_without_previewer() {
        let ui = UiContext::spawn().unwrap();
        let err = ui.handle().preview(success()).await.unwrap_err();
        assert_eq!(err, UiError::NoPreviewer);
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail() {
        let ui = UiContext::spawn().unwrap();
        let handle = ui.handle();
        ui.shutdown();

        assert!(handle.is_closed());
        assert_eq!(handle.preview(success()).await.unwrap_err(), UiError::Closed);
        assert_eq!(
            handle.notify_error(ErrorViewModel::new("t", "d")),
            Err(UiError::Closed)
        );
    }
}
