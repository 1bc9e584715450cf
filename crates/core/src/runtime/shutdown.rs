use tokio_util::sync::CancellationToken;

/// Owns the dashboard's root cancellation scope and cancels it on SIGTERM or
/// SIGHUP (terminal closed).
#[derive(Debug)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// The cancellation token that all tasks should monitor.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a background task that listens for OS signals and triggers cancellation.
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};
                let (mut sigterm, mut sighup) =
                    match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
                        (Ok(term), Ok(hup)) => (term, hup),
                        (Err(e), _) | (_, Err(e)) => {
                            tracing::warn!(error = %e, "failed to register signal handlers");
                            return;
                        }
                    };
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, initiating shutdown"),
                    _ = sighup.recv() => tracing::info!("received SIGHUP, initiating shutdown"),
                }
            }
            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl+C, initiating shutdown"),
                }
            }
            token.cancel();
        });
    }
}

impl Default for ShutdownGuard {
    fn default() -> Self {
        Self::new()
    }
}
