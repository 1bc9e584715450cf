use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio_util::sync::CancellationToken;

use voltsight_core::io::input::{self, CommandSender, DashboardCommand};
use voltsight_core::io::output::SnapshotReceiver;
use voltsight_core::types::{DashboardSnapshot, InstallOffer, NetworkState};

use crate::event::AppEvent;
use crate::widgets;

/// TUI application state. The dashboard owns the data; the app only keeps
/// the latest snapshot plus view-local bits.
pub struct App {
    pub snapshot: DashboardSnapshot,
    pub anim_frame: usize,
    /// Transient hint shown in the footer (e.g. why `a` did nothing).
    pub notice: Option<&'static str>,
    pub should_exit: bool,
}

impl App {
    pub fn new(snapshot: DashboardSnapshot) -> Self {
        Self { snapshot, anim_frame: 0, notice: None, should_exit: false }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Send(DashboardCommand),
    Notice(&'static str),
    Ignore,
}

/// Map a key press to an action given the current dashboard state.
pub fn map_key(snap: &DashboardSnapshot, key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    if snap.install_offer == InstallOffer::Prompting {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                KeyAction::Send(DashboardCommand::ResolveInstallOffer(true))
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                KeyAction::Send(DashboardCommand::ResolveInstallOffer(false))
            }
            _ => KeyAction::Ignore,
        };
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('a') => {
            if snap.can_analyze() {
                KeyAction::Send(DashboardCommand::DeepAnalyze)
            } else if !snap.insight_enabled {
                KeyAction::Notice("insights disabled: no LLM configured")
            } else if snap.network == NetworkState::Offline {
                KeyAction::Notice("offline: analysis unavailable")
            } else {
                KeyAction::Notice("analysis already running")
            }
        }
        KeyCode::Char('i') => match snap.install_offer {
            InstallOffer::Deferred => KeyAction::Send(DashboardCommand::ShowInstallOffer),
            _ => KeyAction::Notice("no install offer pending"),
        },
        _ => KeyAction::Ignore,
    }
}

fn restore_terminal() -> anyhow::Result<()> {
    terminal::disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), DisableFocusChange, LeaveAlternateScreen)?;
    Ok(())
}

/// Run the TUI event loop. Returns when the user quits or the token is cancelled.
pub async fn run_app(
    command_tx: CommandSender,
    mut snapshot_rx: SnapshotReceiver,
    token: CancellationToken,
) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut event_rx = crate::event::spawn(stop.clone());

    let mut app = App::new(snapshot_rx.borrow_and_update().clone());
    let mut anim_interval = tokio::time::interval(std::time::Duration::from_millis(80));
    anim_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    terminal.draw(|f| widgets::draw(f, &app))?;

    loop {
        if app.should_exit {
            break;
        }
        tokio::select! {
            _ = token.cancelled() => {
                break;
            }
            evt = event_rx.recv() => {
                let Some(evt) = evt else { break };
                handle_event(&mut app, evt, &command_tx).await;
            }
            Ok(()) = snapshot_rx.changed() => {
                app.snapshot = snapshot_rx.borrow_and_update().clone();
            }
            _ = anim_interval.tick(), if app.snapshot.loading => {
                app.anim_frame = app.anim_frame.wrapping_add(1);
            }
        }
        terminal.draw(|f| widgets::draw(f, &app))?;
    }

    stop.store(true, Ordering::Relaxed);
    restore_terminal()
}

/// A closed command channel means the dashboard is gone, so the app exits.
async fn handle_event(app: &mut App, evt: AppEvent, command_tx: &CommandSender) {
    let command = match evt {
        AppEvent::Key(key) => {
            app.notice = None;
            match map_key(&app.snapshot, key) {
                KeyAction::Quit => {
                    app.should_exit = true;
                    return;
                }
                KeyAction::Send(command) => command,
                KeyAction::Notice(text) => {
                    app.notice = Some(text);
                    return;
                }
                KeyAction::Ignore => return,
            }
        }
        AppEvent::FocusGained => DashboardCommand::FocusGained,
        AppEvent::Resize => return,
    };
    if input::submit(command_tx, command).await.is_err() {
        app.should_exit = true;
    }
}
