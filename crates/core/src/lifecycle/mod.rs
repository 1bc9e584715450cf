pub mod install;
pub mod wake_lock;

pub use install::{InstallError, InstallOutcome, InstallPrompt};
pub use wake_lock::{InhibitorLock, NoopWakeLock, WakeLock, WakeLockError};
