use std::fs;
use std::path::{Path, PathBuf};

use crate::types::InstallOffer;

pub const DESKTOP_FILE: &str = "voltsight.desktop";

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("no install offer is being shown")]
    NotPrompting,
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// Deferred "install desktop launcher" offer.
///
/// Intercepted at startup when no launcher exists, held back, and only shown
/// when the user asks for it. The outcome is observed once and the offer is
/// then consumed.
#[derive(Debug)]
pub struct InstallPrompt {
    target: Option<PathBuf>,
    exec: String,
    state: InstallOffer,
}

impl InstallPrompt {
    /// Launcher under the XDG data dir, for the running executable.
    pub fn detect() -> Self {
        let target = dirs::data_dir().map(|d| d.join("applications").join(DESKTOP_FILE));
        let exec = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "voltsight".to_owned());
        match target {
            Some(target) => Self::with_target(target, exec),
            None => Self::disabled(),
        }
    }

    pub fn with_target(target: PathBuf, exec: impl Into<String>) -> Self {
        let state = if target.exists() { InstallOffer::None } else { InstallOffer::Deferred };
        if state == InstallOffer::Deferred {
            tracing::debug!(target = %target.display(), "install offer deferred");
        }
        Self { target: Some(target), exec: exec.into(), state }
    }

    pub fn disabled() -> Self {
        Self { target: None, exec: String::new(), state: InstallOffer::None }
    }

    pub fn state(&self) -> InstallOffer {
        self.state
    }

    /// Re-issue the deferred offer. Returns false when there is nothing to show.
    pub fn prompt(&mut self) -> bool {
        if self.state != InstallOffer::Deferred {
            return false;
        }
        self.state = InstallOffer::Prompting;
        true
    }

    /// Record the user's answer. Accepting writes the launcher entry.
    pub fn resolve(&mut self, accept: bool) -> Result<InstallOutcome, InstallError> {
        if self.state != InstallOffer::Prompting {
            return Err(InstallError::NotPrompting);
        }
        self.state = InstallOffer::None;
        if !accept {
            tracing::info!(outcome = "dismissed", "install offer resolved");
            return Ok(InstallOutcome::Dismissed);
        }
        let Some(target) = self.target.as_deref() else {
            return Ok(InstallOutcome::Dismissed);
        };
        write_entry(target, &self.exec)?;
        tracing::info!(outcome = "accepted", target = %target.display(), "install offer resolved");
        Ok(InstallOutcome::Accepted)
    }
}

fn desktop_entry(exec: &str) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Voltsight\n\
         Comment=Battery dashboard with AI insights\n\
         Exec={exec}\n\
         Terminal=true\n\
         Categories=System;Monitor;\n"
    )
}

fn write_entry(target: &Path, exec: &str) -> Result<(), InstallError> {
    let wrap = |source| InstallError::Write { path: target.display().to_string(), source };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    fs::write(target, desktop_entry(exec)).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_launcher_defers_offer() {
        let td = TempDir::new().unwrap();
        let prompt = InstallPrompt::with_target(td.path().join("apps").join(DESKTOP_FILE), "/bin/voltsight");
        assert_eq!(prompt.state(), InstallOffer::Deferred);
    }

    #[test]
    fn existing_launcher_means_no_offer() {
        let td = TempDir::new().unwrap();
        let target = td.path().join(DESKTOP_FILE);
        fs::write(&target, "x").unwrap();
        let mut prompt = InstallPrompt::with_target(target, "/bin/voltsight");
        assert_eq!(prompt.state(), InstallOffer::None);
        assert!(!prompt.prompt());
    }

    #[test]
    fn accept_writes_entry_and_consumes_offer() {
        let td = TempDir::new().unwrap();
        let target = td.path().join("apps").join(DESKTOP_FILE);
        let mut prompt = InstallPrompt::with_target(target.clone(), "/opt/voltsight");
        assert!(prompt.prompt());
        assert_eq!(prompt.state(), InstallOffer::Prompting);
        assert_eq!(prompt.resolve(true).unwrap(), InstallOutcome::Accepted);
        assert_eq!(prompt.state(), InstallOffer::None);
        let body = fs::read_to_string(&target).unwrap();
        assert!(body.contains("Exec=/opt/voltsight"));
        assert!(!prompt.prompt());
    }

    #[test]
    fn dismiss_writes_nothing() {
        let td = TempDir::new().unwrap();
        let target = td.path().join(DESKTOP_FILE);
        let mut prompt = InstallPrompt::with_target(target.clone(), "/opt/voltsight");
        prompt.prompt();
        assert_eq!(prompt.resolve(false).unwrap(), InstallOutcome::Dismissed);
        assert!(!target.exists());
    }

    #[test]
    fn resolve_without_prompt_is_an_error() {
        let td = TempDir::new().unwrap();
        let mut prompt = InstallPrompt::with_target(td.path().join(DESKTOP_FILE), "x");
        assert!(matches!(prompt.resolve(true), Err(InstallError::NotPrompting)));
        assert_eq!(prompt.state(), InstallOffer::Deferred);
    }
}
