use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::process::{Child, Command};

#[derive(Debug, thiserror::Error)]
pub enum WakeLockError {
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },
}

/// Screen-stay-awake lock held while the dashboard is active.
pub trait WakeLock: Send {
    fn acquire(&mut self) -> Result<(), WakeLockError>;

    fn release(&mut self);

    /// Whether the lock is currently held. May observe that the platform
    /// dropped it behind our back.
    fn is_held(&mut self) -> bool;
}

/// Holds a `systemd-inhibit` child blocking idle actions for as long as it
/// runs. Dropping the child kills it, which releases the inhibitor.
#[derive(Debug)]
pub struct InhibitorLock {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl InhibitorLock {
    pub fn systemd() -> Self {
        Self::with_command(
            "systemd-inhibit",
            [
                "--what=idle",
                "--who=voltsight",
                "--why=battery dashboard is open",
                "--mode=block",
                "sleep",
                "infinity",
            ],
        )
    }

    pub fn with_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            child: None,
        }
    }
}

impl WakeLock for InhibitorLock {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        if self.is_held() {
            return Ok(());
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WakeLockError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(program = %self.program, pid = child.id(), "wake lock acquired");
        self.child = Some(child);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "wake lock child already gone");
            }
            tracing::info!("wake lock released");
        }
    }

    fn is_held(&mut self) -> bool {
        let alive = match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => return false,
        };
        if !alive {
            tracing::debug!("wake lock child exited");
            self.child = None;
        }
        alive
    }
}

impl Drop for InhibitorLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// In-memory lock that only counts calls. Used when the wake lock is
/// disabled, and by tests.
#[derive(Debug, Clone, Default)]
pub struct NoopWakeLock {
    held: bool,
    acquires: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl NoopWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Simulate the platform revoking the lock (e.g. the session went idle).
    pub fn revoke(&mut self) {
        self.held = false;
    }
}

impl WakeLock for NoopWakeLock {
    fn acquire(&mut self) -> Result<(), WakeLockError> {
        if !self.held {
            self.acquires.fetch_add(1, Ordering::SeqCst);
            self.held = true;
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.held {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.held = false;
        }
    }

    fn is_held(&mut self) -> bool {
        self.held
    }
}
