use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::DashboardCfg;
use crate::types::NetworkState;

/// Periodic TCP reachability probe. Publishes only transitions.
#[derive(Debug, Clone)]
pub struct ConnectivityWatcher {
    addr: String,
    interval: Duration,
    timeout: Duration,
}

impl ConnectivityWatcher {
    pub fn new(addr: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        Self { addr: addr.into(), interval, timeout }
    }

    pub fn from_cfg(cfg: &DashboardCfg) -> Self {
        Self::new(
            cfg.connectivity_probe_addr.clone(),
            Duration::from_secs(cfg.connectivity_interval_secs),
            Duration::from_millis(cfg.connectivity_timeout_ms),
        )
    }

    /// Single probe: a completed TCP handshake within the timeout is `Online`.
    pub async fn probe(&self) -> NetworkState {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => NetworkState::Online,
            Ok(Err(e)) => {
                tracing::debug!(addr = %self.addr, error = %e, "reachability probe failed");
                NetworkState::Offline
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, timeout_ms = self.timeout.as_millis() as u64, "reachability probe timed out");
                NetworkState::Offline
            }
        }
    }

    /// Spawn the probe loop. The receiver starts at `Unknown`; the first probe
    /// runs immediately.
    pub fn spawn(self, cancel: CancellationToken) -> watch::Receiver<NetworkState> {
        let (tx, rx) = watch::channel(NetworkState::Unknown);
        tokio::spawn(async move {
            loop {
                let state = tokio::select! {
                    _ = cancel.cancelled() => break,
                    state = self.probe() => state,
                };
                tx.send_if_modified(|current| {
                    if *current == state {
                        return false;
                    }
                    tracing::info!(from = ?current, to = ?state, "connectivity changed");
                    *current = state;
                    true
                });

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            tracing::debug!("connectivity watcher stopped");
        });
        rx
    }
}
