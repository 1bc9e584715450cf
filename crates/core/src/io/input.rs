use tokio::sync::mpsc;

/// Commands the presentation layer sends into the dashboard loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardCommand {
    /// Manual deep analysis. Ignored while loading or offline.
    DeepAnalyze,
    /// Terminal regained focus; re-acquire the wake lock if it was dropped.
    FocusGained,
    /// Re-issue the deferred install offer.
    ShowInstallOffer,
    /// Answer to the install offer (`true` = accepted).
    ResolveInstallOffer(bool),
}

/// Command channel sender. The TUI or headless REPL pushes commands here.
pub type CommandSender = mpsc::Sender<DashboardCommand>;
/// Command channel receiver. The dashboard loop consumes from here.
pub type CommandReceiver = mpsc::Receiver<DashboardCommand>;

pub fn channel(buffer: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(buffer)
}

/// Submit a command to the dashboard.
pub async fn submit(
    tx: &CommandSender,
    command: DashboardCommand,
) -> Result<(), mpsc::error::SendError<DashboardCommand>> {
    tracing::debug!(?command, "dashboard command submitted");
    tx.send(command).await
}

/// Map a headless REPL line to a command. `None` for anything unrecognised.
pub fn parse_line(line: &str) -> Option<DashboardCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "a" | "analyze" | "analyse" => Some(DashboardCommand::DeepAnalyze),
        "i" | "install" => Some(DashboardCommand::ShowInstallOffer),
        "y" | "yes" => Some(DashboardCommand::ResolveInstallOffer(true)),
        "n" | "no" => Some(DashboardCommand::ResolveInstallOffer(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_delivers_command() {
        let (tx, mut rx) = channel(4);
        submit(&tx, DashboardCommand::DeepAnalyze).await.unwrap();
        assert_eq!(rx.recv().await, Some(DashboardCommand::DeepAnalyze));
    }

    #[tokio::test]
    async fn channel_respects_buffer() {
        let (tx, _rx) = channel(1);
        tx.send(DashboardCommand::FocusGained).await.unwrap();
        assert!(tx.try_send(DashboardCommand::FocusGained).is_err());
    }

    #[test]
    fn parse_line_maps_repl_words() {
        assert_eq!(parse_line(" Analyze "), Some(DashboardCommand::DeepAnalyze));
        assert_eq!(parse_line("install"), Some(DashboardCommand::ShowInstallOffer));
        assert_eq!(parse_line("y"), Some(DashboardCommand::ResolveInstallOffer(true)));
        assert_eq!(parse_line("no"), Some(DashboardCommand::ResolveInstallOffer(false)));
        assert_eq!(parse_line("hello"), None);
    }
}
