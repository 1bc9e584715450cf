use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tokio::sync::mpsc;

/// Events consumed by the TUI main loop.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    /// Terminal window regained focus (needs `EnableFocusChange`).
    FocusGained,
    Resize,
}

/// Spawn crossterm event reader in a dedicated thread.
/// Returns a receiver of `AppEvent`. The thread exits when `stop` is set to true.
pub fn spawn(stop: Arc<AtomicBool>) -> mpsc::UnboundedReceiver<AppEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            // 50ms poll so the stop flag is noticed promptly
            if !event::poll(Duration::from_millis(50)).unwrap_or(false) {
                continue;
            }
            let evt = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Ok(Event::FocusGained) => AppEvent::FocusGained,
                Ok(Event::Resize(..)) => AppEvent::Resize,
                _ => continue,
            };
            if tx.send(evt).is_err() {
                break;
            }
        }
    });
    rx
}
