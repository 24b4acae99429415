//! Configuration structures for the xaml-preview tool.
//!
//! This module provides configuration types for all components:
//!
//! - [`ServerConfig`] - Evaluation service binding and hand-off settings
//! - [`DiscoveryConfig`] - Local-network advertisement settings
//! - [`DocumentConfig`] - Editor-side file recognition settings
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] with the values a stock
//! preview session uses, and every section is `#[serde(default)]` so partial
//! JSON files only need to name what they change.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Well-known first port tried by the evaluation service.
pub const DEFAULT_PORT: u16 = 8488;

/// Number of consecutive candidate ports tried when binding.
pub const DEFAULT_PORT_RANGE: u16 = 10;

/// Port the discovery advertisement is broadcast to.
pub const DEFAULT_DISCOVERY_PORT: u16 = 8489;

/// Service identifier carried in every discovery advertisement.
pub const DEFAULT_SERVICE_ID: &str = "xp-preview";

/// Configuration for the evaluation service.
///
/// # Examples
///
/// ```
/// use xp_core::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.default_port, 8488);
/// assert_eq!(config.port_range, 10);
/// assert_eq!(config.candidate_ports().count(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_address: IpAddr,

    /// First port tried when binding.
    pub default_port: u16,

    /// How many consecutive ports (starting at `default_port`) are tried.
    pub port_range: u16,

    /// Upper bound on how long a request waits for the UI context to apply
    /// an evaluation result.
    pub ui_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            default_port: DEFAULT_PORT,
            port_range: DEFAULT_PORT_RANGE,
            ui_timeout_ms: 30_000,
        }
    }
}

impl ServerConfig {
    /// Returns the candidate ports in the order they are tried.
    ///
    /// Ports past `u16::MAX` are silently dropped from the range.
    pub fn candidate_ports(&self) -> impl Iterator<Item = u16> + use<> {
        let first = self.default_port;
        (0..self.port_range).map_while(move |offset| first.checked_add(offset))
    }

    /// Returns the UI hand-off timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn ui_timeout(&self) -> Duration {
        Duration::from_millis(self.ui_timeout_ms)
    }
}

/// Configuration for the discovery broadcaster.
///
/// # Examples
///
/// ```
/// use xp_core::DiscoveryConfig;
///
/// let config = DiscoveryConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.port, 8489);
/// assert_eq!(config.service_id, "xp-preview");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Whether the service advertises itself at all.
    pub enabled: bool,

    /// Destination address of the advertisement (broadcast by default).
    pub broadcast_address: IpAddr,

    /// Destination port of the advertisement.
    pub port: u16,

    /// Interval between two advertisements in milliseconds.
    pub interval_ms: u64,

    /// Identifier clients match against to recognise the service.
    pub service_id: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broadcast_address: IpAddr::V4(Ipv4Addr::BROADCAST),
            port: DEFAULT_DISCOVERY_PORT,
            interval_ms: 1_000,
            service_id: DEFAULT_SERVICE_ID.to_owned(),
        }
    }
}

impl DiscoveryConfig {
    /// Returns the advertisement interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Configuration for recognising view sources on the editor side.
///
/// # Examples
///
/// ```
/// use xp_core::DocumentConfig;
///
/// let config = DocumentConfig::default();
/// assert_eq!(config.markup_extension, ".xaml");
/// assert_eq!(config.code_extension, ".cs");
/// assert!(config.view_base_types.iter().any(|t| t == "ContentPage"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Extension of markup files, including the leading dot.
    pub markup_extension: String,

    /// Extension of code files, including the leading dot. A code-behind file
    /// is named `<markup file><code_extension>`.
    pub code_extension: String,

    /// Simple names of base types that make a class a previewable view.
    pub view_base_types: Vec<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            markup_extension: ".xaml".to_owned(),
            code_extension: ".cs".to_owned(),
            view_base_types: [
                "ContentPage",
                "ContentView",
                "Page",
                "View",
                "TabbedPage",
                "CarouselPage",
                "NavigationPage",
                "FlyoutPage",
                "MasterDetailPage",
                "Shell",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        }
    }
}

impl DocumentConfig {
    /// Returns the code-behind extension for markup files (e.g. `.xaml.cs`).
    #[must_use]
    pub fn code_behind_extension(&self) -> String {
        format!("{}{}", self.markup_extension, self.code_extension)
    }
}

/// Root configuration for the xaml-preview tool.
///
/// # Examples
///
/// ```
/// use xp_core::Config;
///
/// let config = Config::default();
/// assert!(config.validate().is_ok());
///
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("default_port"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Evaluation service configuration.
    pub server: ServerConfig,

    /// Discovery broadcaster configuration.
    pub discovery: DiscoveryConfig,

    /// Editor-side document configuration.
    pub document: DocumentConfig,
}

impl Config {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, an I/O or
    /// parse error if it cannot be read, or [`ConfigError::InvalidOption`] if
    /// validation fails.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_owned()));
        }
        let contents = std::fs::read_to_string(path.as_std_path())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] naming the first offending option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port_range == 0 {
            return Err(ConfigError::invalid_option(
                "server.port_range",
                "must be at least 1",
            ));
        }
        if self.server.ui_timeout_ms == 0 {
            return Err(ConfigError::invalid_option(
                "server.ui_timeout_ms",
                "must be positive",
            ));
        }
        if self.discovery.interval_ms == 0 {
            return Err(ConfigError::invalid_option(
                "discovery.interval_ms",
                "must be positive",
            ));
        }
        if self.discovery.service_id.is_empty() {
            return Err(ConfigError::invalid_option(
                "discovery.service_id",
                "must not be empty",
            ));
        }
        for (option, value) in [
            ("document.markup_extension", &self.document.markup_extension),
            ("document.code_extension", &self.document.code_extension),
        ] {
            if !value.starts_with('.') || value.len() < 2 {
                return Err(ConfigError::invalid_option(
                    option,
                    "must be a dot-prefixed extension",
                ));
            }
        }
        Ok(())
    }
}
