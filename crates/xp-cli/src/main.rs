//! CLI entry point for the xaml-preview tool.
//!
//! This binary is the editor side of a live preview session: it turns edited
//! markup and code-behind files into evaluation requests and sends them to
//! the preview service running inside the app.
//!
//! # Usage
//!
//! ```bash
//! xp [OPTIONS] <COMMAND>
//!
//! # Find a running preview service on the local network
//! xp discover
//!
//! # Show the declaration built from a view's files
//! xp inspect Views/MainPage.xaml Views/MainPage.xaml.cs
//!
//! # Send the updated view to the app
//! xp push Views/MainPage.xaml --server http://192.168.1.20:8488
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, bail, eyre};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use xp_core::{Config, EVAL_ROUTE, EvalResponse};
use xp_document::{DocumentModelBuilder, SharedClass};
use xp_server::DiscoveryListener;

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Live preview of XAML views in a running app.
///
/// Builds evaluation requests from edited view files and sends them to the
/// preview service hosted by the app.
#[derive(Parser)]
#[command(name = "xp", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "XP_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Port to listen on for discovery adverts (overrides the configuration).
    #[arg(long, global = true, env = "XP_DISCOVERY_PORT")]
    discovery_port: Option<u16>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Wait for a preview service advert and print its endpoint.
    Discover {
        /// Seconds to wait before giving up.
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },

    /// Build class declarations from files and print them as JSON.
    Inspect {
        /// Markup and code files, in edit order.
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,
    },

    /// Send the declarations built from files to the preview service.
    Push {
        /// Markup and code files, in edit order.
        #[arg(required = true)]
        files: Vec<Utf8PathBuf>,

        /// Base URL of the preview service. Found through discovery if unset.
        #[arg(short, long, env = "XP_SERVER_URL")]
        server: Option<String>,

        /// Seconds to wait for discovery and for each response.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Noisy HTTP crates are filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},hyper=warn,hyper_util=warn,reqwest=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Loads the configuration named on the command line, or the defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
fn load_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .wrap_err_with(|| format!("Failed to load configuration from {path}"))?,
        None => Config::default(),
    };
    if let Some(port) = cli.discovery_port {
        config.discovery.port = port;
    }
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Waits for one advert and returns the service base URL it names.
async fn discover(config: &Config, timeout: Duration) -> color_eyre::Result<String> {
    let listener = DiscoveryListener::bind(config.discovery.port, config.discovery.service_id.clone())
        .await
        .wrap_err("Failed to listen for discovery adverts")?;

    info!(port = config.discovery.port, "Waiting for a preview service");

    let endpoint = tokio::time::timeout(timeout, listener.recv_endpoint())
        .await
        .map_err(|_| eyre!("No preview service found within {} s", timeout.as_secs()))??;

    debug!(%endpoint, "Discovered preview service");
    Ok(format!("http://{endpoint}"))
}

/// Prints the base URL of the first preview service found.
async fn run_discover(config: &Config, timeout_secs: u64) -> color_eyre::Result<()> {
    let url = discover(config, Duration::from_secs(timeout_secs)).await?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{url}")?;
    Ok(())
}

/// Feeds `files` through a builder and returns the affected declarations,
/// each once, in the order they were first touched.
fn build_declarations(config: &Config, files: &[Utf8PathBuf]) -> color_eyre::Result<Vec<SharedClass>> {
    let mut builder = DocumentModelBuilder::new(config.document.clone());
    let mut touched: Vec<SharedClass> = Vec::new();

    for file in files {
        let text = read_file(file)?;
        let Some(class) = builder.build_or_update(file, &text, None) else {
            warn!(path = %file, "No class declaration for file");
            continue;
        };
        if !touched.iter().any(|seen| Arc::ptr_eq(seen, &class)) {
            touched.push(class);
        }
    }

    if touched.is_empty() {
        bail!("None of the given files resolved to a class declaration");
    }
    Ok(touched)
}

fn read_file(path: &Utf8Path) -> color_eyre::Result<String> {
    std::fs::read_to_string(path.as_std_path()).wrap_err_with(|| format!("Failed to read {path}"))
}

/// Prints the declarations built from `files` as a JSON array.
fn run_inspect(config: &Config, files: &[Utf8PathBuf]) -> color_eyre::Result<()> {
    let classes = build_declarations(config, files)?;
    let values = classes
        .iter()
        .map(|class| serde_json::to_value(&*class.read()))
        .collect::<Result<Vec<_>, _>>()?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", serde_json::to_string_pretty(&values)?)?;
    Ok(())
}

/// Sends the declarations built from `files` to the preview service.
async fn run_push(
    config: &Config,
    files: &[Utf8PathBuf],
    server: Option<String>,
    timeout_secs: u64,
) -> color_eyre::Result<()> {
    let timeout = Duration::from_secs(timeout_secs);
    let classes = build_declarations(config, files)?;

    let base = match server {
        Some(url) => url,
        None => discover(config, timeout).await?,
    };
    let url = format!("{}{EVAL_ROUTE}", base.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .wrap_err("Failed to create HTTP client")?;

    let mut failures = 0_usize;
    for class in &classes {
        let request = class.read().to_eval_request();
        info!(class = %request.new_type_name, %url, "Pushing declaration");

        let response = client
            .post(&url)
            .json(&request)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to reach {url}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .wrap_err_with(|| format!("Failed to read the answer from {url}"))?;
        let outcome = PushOutcome::decode(&request.new_type_name, body);

        print_outcome(
            &mut std::io::stdout().lock(),
            &request.new_type_name,
            status,
            &outcome,
        )?;
        if !status.is_success() || !outcome.is_understood() {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} pushes failed", classes.len());
    }
    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// What the service answered for one pushed class.
#[derive(Debug)]
enum PushOutcome {
    Response(EvalResponse),
    /// A body that is not an evaluation response, e.g. a proxy's error page.
    Unreadable(String),
}

impl PushOutcome {
    fn decode(class: &str, body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(response) => Self::Response(response),
            Err(e) => {
                warn!(class, error = %e, "Service answer is not an evaluation response");
                Self::Unreadable(body)
            }
        }
    }

    const fn is_understood(&self) -> bool {
        matches!(self, Self::Response(_))
    }
}

/// Writes the service's answer for one pushed class.
fn print_outcome(
    out: &mut impl Write,
    class: &str,
    status: reqwest::StatusCode,
    outcome: &PushOutcome,
) -> std::io::Result<()> {
    let response = match outcome {
        PushOutcome::Response(response) => response,
        PushOutcome::Unreadable(body) => {
            writeln!(out, "{class}: unknown ({status})")?;
            for line in body.lines() {
                writeln!(out, "  {line}")?;
            }
            return Ok(());
        }
    };

    let applied = if response.preview_applied {
        "applied"
    } else {
        "not applied"
    };
    writeln!(out, "{class}: {applied} ({status}, {} ms)", response.duration_ms)?;
    if let Some(error) = &response.error {
        writeln!(out, "  error: {error}")?;
    }
    for message in &response.messages {
        writeln!(out, "  {message}")?;
    }
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Load configuration
    let config = load_config(&cli)?;

    // 5. Route to appropriate command
    match cli.command {
        Commands::Discover { timeout_secs } => run_discover(&config, timeout_secs).await,
        Commands::Inspect { files } => run_inspect(&config, &files),
        Commands::Push {
            files,
            server,
            timeout_secs,
        } => run_push(&config, &files, server, timeout_secs).await,
    }
}
