use std::sync::Arc;

use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use voltsight_core::config::DashboardCfg;
use voltsight_core::io::input::{self, CommandSender};
use voltsight_core::io::output::{self, SnapshotReceiver};
use voltsight_core::runtime::{Dashboard, DashboardDeps};
use voltsight_core::types::{BatteryInsight, InstallOffer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = Arc::new(DashboardCfg::from_env());
    let deps = DashboardDeps::production(&cfg);
    let (mut dashboard, command_tx, snapshot_rx) = Dashboard::new(Arc::clone(&cfg), deps);
    let token = dashboard.token();
    spawn_sigint_canceler(token.clone());

    let dashboard_fut = dashboard.run();
    let monitor_fut = run_monitor(command_tx, snapshot_rx, token.clone(), cfg);
    tokio::pin!(dashboard_fut);
    tokio::pin!(monitor_fut);

    tokio::select! {
        _ = &mut dashboard_fut => {
            token.cancel();
            (&mut monitor_fut).await
        }
        result = &mut monitor_fut => {
            token.cancel();
            (&mut dashboard_fut).await;
            result
        }
    }
}

async fn run_monitor(
    command_tx: CommandSender,
    mut snapshot_rx: SnapshotReceiver,
    token: CancellationToken,
    cfg: Arc<DashboardCfg>,
) -> anyhow::Result<()> {
    println!("voltsight headless. commands: analyze, install, y/n, config, /q");

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    spawn_input_thread(line_tx, ready_rx);
    request_next_prompt(&ready_tx);

    let mut last_line = String::new();
    let mut last_insight: Option<Arc<BatteryInsight>> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshot_rx.borrow_and_update().clone();
                let line = output::status_line(&snap);
                if line != last_line {
                    println!("{line}");
                    last_line = line;
                }
                let insight_changed = match (&snap.insight, &last_insight) {
                    (Some(new), Some(old)) => !Arc::ptr_eq(new, old),
                    (Some(_), None) => true,
                    _ => false,
                };
                if insight_changed {
                    if let Some(insight) = &snap.insight {
                        print_insight(insight);
                    }
                    last_insight = snap.insight.clone();
                }
                if snap.install_offer == InstallOffer::Prompting {
                    println!("Install a desktop launcher for voltsight? [y/n]");
                }
            }
            line = line_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                match line {
                    InputEvent::Line(line) => {
                        let text = line.trim();
                        if matches!(text, "/q" | "/exit" | "/quit") {
                            break;
                        }
                        if text == "config" {
                            for (key, value, desc) in cfg.to_entries() {
                                println!("  {key:<28} {value:<24} {desc}");
                            }
                        } else if let Some(command) = input::parse_line(text) {
                            if input::submit(&command_tx, command).await.is_err() {
                                break;
                            }
                        } else if !text.is_empty() {
                            println!("unknown command: {text}");
                        }
                        request_next_prompt(&ready_tx);
                    }
                    InputEvent::Interrupted => {
                        token.cancel();
                        break;
                    }
                    InputEvent::Eof => break,
                    InputEvent::Error(err) => {
                        eprintln!("input error: {err}");
                        break;
                    }
                }
            }
        }
    }
    drop(ready_tx);
    println!();
    Ok(())
}

fn print_insight(insight: &BatteryInsight) {
    println!("── insight: {}", insight.status);
    println!("   {}", insight.recommendation);
    println!("   estimated life remaining: {}", insight.estimated_life_remaining);
    for tip in &insight.optimization_tips {
        println!("   • {tip}");
    }
}

fn request_next_prompt(ready_tx: &std::sync::mpsc::Sender<()>) {
    let _ = ready_tx.send(());
}

fn spawn_input_thread(
    line_tx: mpsc::UnboundedSender<InputEvent>,
    ready_rx: std::sync::mpsc::Receiver<()>,
) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        while ready_rx.recv().is_ok() {
            match editor.readline("> ") {
                Ok(line) => {
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}

fn spawn_sigint_canceler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received SIGINT, shutting down");
            token.cancel();
        }
    });
}
