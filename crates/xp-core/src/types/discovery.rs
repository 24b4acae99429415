//! Discovery advertisement broadcast by the preview service.

use serde::{Deserialize, Serialize};

/// Version of the advertisement payload.
pub const DISCOVERY_PROTOCOL_VERSION: u32 = 1;

/// A short, self-describing advertisement of a listening preview service.
///
/// Encoded as a single JSON datagram. The sender's address is taken from the
/// datagram itself, so only the port is carried.
///
/// # Examples
///
/// ```
/// use xp_core::DiscoveryAdvert;
///
/// let advert = DiscoveryAdvert::new("xp-preview", 8488);
/// let decoded = DiscoveryAdvert::decode(&advert.encode()).unwrap();
/// assert_eq!(decoded, advert);
/// assert!(decoded.matches("xp-preview"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryAdvert {
    /// Service identifier clients filter on.
    pub service: String,
    /// Port the evaluation service is listening on.
    pub port: u16,
    /// Payload version.
    pub version: u32,
}

impl DiscoveryAdvert {
    /// Creates an advertisement for `service` listening on `port`.
    #[must_use]
    pub fn new(service: impl Into<String>, port: u16) -> Self {
        Self {
            service: service.into(),
            port,
            version: DISCOVERY_PROTOCOL_VERSION,
        }
    }

    /// Serializes the advertisement into a datagram payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        // A struct of strings and integers always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parses a datagram payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload is not an advertisement.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Returns `true` if this advertisement is for `service_id`.
    #[must_use]
    pub fn matches(&self, service_id: &str) -> bool {
        self.service == service_id
    }
}
