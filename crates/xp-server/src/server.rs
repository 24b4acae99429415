//! The evaluation service lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use xp_core::{DiscoveryAdvert, DiscoveryConfig, ServerConfig, ViewModelBindings};

use crate::discovery::DiscoveryBroadcaster;
use crate::error::ServerError;
use crate::evaluator::Evaluator;
use crate::previewer::{DefaultPreviewer, Previewer};
use crate::routes::{AppState, router};
use crate::ui::UiHandle;

/// Lifecycle state of a [`PreviewServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerState {
    /// Not accepting requests.
    #[default]
    Stopped,
    /// Binding the listener.
    Starting,
    /// Accepting evaluation requests.
    Listening,
}

/// Options for [`PreviewServer::start`].
#[derive(Default)]
pub struct StartOptions {
    /// View-model objects bound to views by type name. Used by the
    /// [`DefaultPreviewer`] when no previewer is supplied.
    pub bindings: ViewModelBindings,
    /// Previewer to install instead of a [`DefaultPreviewer`].
    pub previewer: Option<Box<dyn Previewer>>,
}

impl std::fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartOptions")
            .field("bindings", &self.bindings.len())
            .field("custom_previewer", &self.previewer.is_some())
            .finish()
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    broadcaster: Option<DiscoveryBroadcaster>,
}

/// HTTP service accepting evaluation requests from the editor.
///
/// The server is constructed explicitly and owned by the host; nothing about
/// it is global. Dropping a running server shuts the listener down.
pub struct PreviewServer {
    config: ServerConfig,
    discovery: DiscoveryConfig,
    evaluator: Arc<dyn Evaluator>,
    state: ServerState,
    running: Option<Running>,
}

impl std::fmt::Debug for PreviewServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewServer")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

impl PreviewServer {
    /// Creates a stopped server that evaluates requests with `evaluator`.
    pub fn new(
        config: ServerConfig,
        discovery: DiscoveryConfig,
        evaluator: Arc<dyn Evaluator>,
    ) -> Self {
        Self {
            config,
            discovery,
            evaluator,
            state: ServerState::Stopped,
            running: None,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the port the service is listening on.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    /// Returns the address the service is listening on.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Starts listening, with results applied on `ui`.
    ///
    /// Returns `true` once the service is listening, including when it
    /// already was. Returns `false` if no candidate port could be bound or
    /// the UI context has shut down; the failure is logged and the server
    /// stays [`ServerState::Stopped`].
    pub async fn start(&mut self, ui: UiHandle, options: StartOptions) -> bool {
        if self.state == ServerState::Listening {
            return true;
        }

        self.state = ServerState::Starting;
        match self.try_start(ui, options).await {
            Ok(running) => {
                self.running = Some(running);
                self.state = ServerState::Listening;
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to start evaluation service");
                self.state = ServerState::Stopped;
                false
            }
        }
    }

    async fn try_start(&self, ui: UiHandle, options: StartOptions) -> Result<Running, ServerError> {
        let listener = self.bind().await?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        // Only a server that is going to listen takes over the UI context.
        let previewer = options
            .previewer
            .unwrap_or_else(|| Box::new(DefaultPreviewer::new(options.bindings)));
        ui.install_previewer(previewer)
            .map_err(|_| ServerError::UiUnavailable)?;

        let shutdown = CancellationToken::new();
        let app = router(AppState {
            evaluator: Arc::clone(&self.evaluator),
            ui,
            ui_timeout: self.config.ui_timeout(),
        });

        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "Evaluation service failed");
            }
        });

        info!(%local_addr, "Evaluation service listening");

        let broadcaster = if self.discovery.enabled {
            let advert = DiscoveryAdvert::new(self.discovery.service_id.clone(), local_addr.port());
            match DiscoveryBroadcaster::start(&self.discovery, advert).await {
                Ok(broadcaster) => Some(broadcaster),
                Err(e) => {
                    warn!(error = %e, "Discovery disabled for this session");
                    None
                }
            }
        } else {
            None
        };

        Ok(Running {
            local_addr,
            shutdown,
            task,
            broadcaster,
        })
    }

    async fn bind(&self) -> Result<TcpListener, ServerError> {
        for port in self.config.candidate_ports() {
            let addr = SocketAddr::new(self.config.bind_address, port);
            match TcpListener::bind(addr).await {
                Ok(listener) => return Ok(listener),
                Err(e) => warn!(port, error = %e, "Port unavailable, trying next"),
            }
        }
        Err(self.port_range_exhausted())
    }

    fn port_range_exhausted(&self) -> ServerError {
        let first = self.config.default_port;
        let last = self.config.candidate_ports().last().unwrap_or(first);
        ServerError::port_range_exhausted(first, last)
    }

    /// Stops the listener and the discovery broadcaster.
    ///
    /// Requests in flight are allowed to finish.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            self.state = ServerState::Stopped;
            return;
        };

        running.shutdown.cancel();
        if let Some(broadcaster) = running.broadcaster {
            broadcaster.stop().await;
        }
        if let Err(e) = running.task.await {
            warn!(error = %e, "Evaluation service task failed");
        }

        self.state = ServerState::Stopped;
        info!(local_addr = %running.local_addr, "Evaluation service stopped");
    }
}

impl Drop for PreviewServer {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.shutdown.cancel();
        }
    }
}
