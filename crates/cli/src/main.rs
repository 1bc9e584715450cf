mod event;
mod tui;
mod widgets;

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use voltsight_core::config::DashboardCfg;
use voltsight_core::runtime::{Dashboard, DashboardDeps};

const DEFAULT_LOG_FILE: &str = "/tmp/voltsight.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Panic hook: restore terminal even on panic in raw mode
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::DisableFocusChange,
            crossterm::terminal::LeaveAlternateScreen
        );
        default_hook(info);
    }));

    // Tracing: write to file when RUST_LOG is set (raw mode breaks stderr)
    if std::env::var("RUST_LOG").is_ok() {
        let path = std::env::var("VOLTSIGHT_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_owned());
        let file = std::fs::File::create(&path)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(file))
            .init();
        tracing::info!(path = %path, "logging to file");
    }

    let cfg = Arc::new(DashboardCfg::from_env());
    let deps = DashboardDeps::production(&cfg);
    let (mut dashboard, command_tx, snapshot_rx) = Dashboard::new(cfg, deps);
    let token = dashboard.token();

    // Both futures share this task. Whichever finishes first cancels the
    // other, and we wait for the other's cleanup (terminal restore, wake
    // lock release) before returning.
    let dashboard_fut = dashboard.run();
    let tui_fut = tui::run_app(command_tx, snapshot_rx, token.clone());
    tokio::pin!(dashboard_fut);
    tokio::pin!(tui_fut);

    let mut dashboard_done = false;
    let mut tui_result: Option<anyhow::Result<()>> = None;

    loop {
        tokio::select! {
            _ = &mut dashboard_fut, if !dashboard_done => {
                dashboard_done = true;
                token.cancel();
                if tui_result.is_none() {
                    tui_result = Some((&mut tui_fut).await);
                }
            }
            result = &mut tui_fut, if tui_result.is_none() => {
                tui_result = Some(result);
                token.cancel();
            }
        }

        if dashboard_done && tui_result.is_some() {
            break;
        }
    }

    tui_result.unwrap_or(Ok(()))
}
