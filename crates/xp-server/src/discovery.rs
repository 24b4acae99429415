//! Local-network advertisement of the evaluation service.
//!
//! The broadcaster sends the same [`DiscoveryAdvert`] datagram at a fixed
//! interval. Delivery is best effort: there is no acknowledgment and lost
//! adverts are simply replaced by the next one.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use xp_core::{DiscoveryAdvert, DiscoveryConfig};

use crate::error::DiscoveryError;

/// Largest advert payload accepted by the listener.
const MAX_ADVERT_LEN: usize = 512;

/// Periodically broadcasts a [`DiscoveryAdvert`].
///
/// Dropping the broadcaster stops it; [`stop`](Self::stop) also waits for
/// the task to exit.
#[derive(Debug)]
pub struct DiscoveryBroadcaster {
    target: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DiscoveryBroadcaster {
    /// Starts broadcasting `advert` as configured by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Socket`] if the UDP socket cannot be opened
    /// or switched to broadcast mode.
    pub async fn start(
        config: &DiscoveryConfig,
        advert: DiscoveryAdvert,
    ) -> Result<Self, DiscoveryError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(DiscoveryError::Socket)?;
        socket.set_broadcast(true).map_err(DiscoveryError::Socket)?;

        let target = SocketAddr::new(config.broadcast_address, config.port);
        let cancel = CancellationToken::new();

        info!(
            %target,
            service = %advert.service,
            port = advert.port,
            "Discovery broadcaster started"
        );

        let task = tokio::spawn(run_broadcast_loop(
            socket,
            target,
            advert.encode(),
            config.interval(),
            cancel.clone(),
        ));

        Ok(Self {
            target,
            cancel,
            task: Some(task),
        })
    }

    /// Returns the address adverts are sent to.
    #[must_use]
    pub const fn target(&self) -> SocketAddr {
        self.target
    }

    /// Returns `true` while adverts are being sent.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops broadcasting and waits for the task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Discovery broadcaster task failed");
            }
        }
    }
}

impl Drop for DiscoveryBroadcaster {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_broadcast_loop(
    socket: UdpSocket,
    target: SocketAddr,
    payload: Vec<u8>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut send_failing = false;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match socket.send_to(&payload, target).await {
                    Ok(_) => {
                        if send_failing {
                            info!(%target, "Discovery adverts are being sent again");
                            send_failing = false;
                        }
                        trace!(%target, "Sent discovery advert");
                    }
                    // Only the first failure of a streak is worth a warning.
                    Err(e) if !send_failing => {
                        warn!(%target, error = %e, "Failed to send discovery advert");
                        send_failing = true;
                    }
                    Err(e) => debug!(%target, error = %e, "Failed to send discovery advert"),
                }
            }
        }
    }

    info!(%target, "Discovery broadcaster stopped");
}

/// Receives adverts for one service identifier.
#[derive(Debug)]
pub struct DiscoveryListener {
    socket: UdpSocket,
    service_id: String,
}

impl DiscoveryListener {
    /// Listens for adverts of `service_id` on `port` on all interfaces.
    ///
    /// Port `0` picks a free port; see [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Socket`] if the port cannot be bound.
    pub async fn bind(port: u16, service_id: impl Into<String>) -> Result<Self, DiscoveryError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(DiscoveryError::Socket)?;
        Ok(Self {
            socket,
            service_id: service_id.into(),
        })
    }

    /// Returns the address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Socket`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, DiscoveryError> {
        self.socket.local_addr().map_err(DiscoveryError::Socket)
    }

    /// Waits for the next advert of this listener's service.
    ///
    /// Datagrams that are not adverts, or that advertise another service,
    /// are skipped. Returns the advert and the address it came from.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Recv`] if reading from the socket fails.
    pub async fn recv(&self) -> Result<(DiscoveryAdvert, SocketAddr), DiscoveryError> {
        let mut buf = [0_u8; MAX_ADVERT_LEN];
        loop {
            let (len, from) = self
                .socket
                .recv_from(&mut buf)
                .await
                .map_err(DiscoveryError::Recv)?;

            match DiscoveryAdvert::decode(&buf[..len]) {
                Ok(advert) if advert.matches(&self.service_id) => return Ok((advert, from)),
                Ok(advert) => trace!(%from, service = %advert.service, "Ignoring advert for other service"),
                Err(e) => debug!(%from, error = %e, "Ignoring malformed discovery datagram"),
            }
        }
    }

    /// Waits for the next advert and returns the service endpoint it names.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Recv`] if reading from the socket fails.
    pub async fn recv_endpoint(&self) -> Result<SocketAddr, DiscoveryError> {
        let (advert, from) = self.recv().await?;
        Ok(endpoint(&advert, from))
    }
}

/// The evaluation service endpoint named by `advert` received from `from`.
#[must_use]
pub fn endpoint(advert: &DiscoveryAdvert, from: SocketAddr) -> SocketAddr {
    SocketAddr::new(from.ip(), advert.port)
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use super::*;

    fn loopback_config(port: u16) -> DiscoveryConfig {
        DiscoveryConfig {
            broadcast_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            interval_ms: 10,
            ..DiscoveryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_advert_round_trip() {
        let listener = DiscoveryListener::bind(0, "xp-preview").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = loopback_config(port);
        let broadcaster = DiscoveryBroadcaster::start(&config, DiscoveryAdvert::new("xp-preview", 8490))
            .await
            .unwrap();
        assert!(broadcaster.is_running());

        let received = tokio::time::timeout(Duration::from_secs(5), listener.recv_endpoint())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.port(), 8490);
        assert!(received.ip().is_loopback());

        broadcaster.stop().await;
    }

    #[tokio::test]
    async fn test_listener_skips_other_services() {
        let listener = DiscoveryListener::bind(0, "xp-preview").await.unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), listener.local_addr().unwrap().port());

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        sender.send_to(b"not json", target).await.unwrap();
        sender
            .send_to(&DiscoveryAdvert::new("other", 1).encode(), target)
            .await
            .unwrap();
        sender
            .send_to(&DiscoveryAdvert::new("xp-preview", 2).encode(), target)
            .await
            .unwrap();

        let (advert, _) = tokio::time::timeout(Duration::from_secs(5), listener.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(advert.port, 2);
    }

    #[tokio::test]
    async fn test_drop_stops_broadcast() {
        let config = loopback_config(9);
        let broadcaster = DiscoveryBroadcaster::start(&config, DiscoveryAdvert::new("xp-preview", 1))
            .await
            .unwrap();
        let cancel = broadcaster.cancel.clone();
        drop(broadcaster);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_endpoint_uses_sender_address() {
        let from: SocketAddr = "192.168.1.20:50000".parse().unwrap();
        let advert = DiscoveryAdvert::new("xp-preview", 8488);
        assert_eq!(endpoint(&advert, from), "192.168.1.20:8488".parse().unwrap());
    }
}
