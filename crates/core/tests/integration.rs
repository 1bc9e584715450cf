//! End-to-end tests for the dashboard loop.
//!
//! The loop runs for real on a paused clock: scripted telemetry, a mock LLM,
//! an in-memory wake lock and a hand-driven network feed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use voltsight_core::config::DashboardCfg;
use voltsight_core::insight::InsightClient;
use voltsight_core::io::input::{CommandSender, DashboardCommand};
use voltsight_core::io::output::SnapshotReceiver;
use voltsight_core::lifecycle::{InstallPrompt, NoopWakeLock};
use voltsight_core::runtime::{Dashboard, DashboardDeps};
use voltsight_core::telemetry::{ScriptedSource, Simulator, TelemetryReading};
use voltsight_core::types::{DashboardSnapshot, NetworkState};
use voltsight_llm::provider::{LlmError, MockProvider};

const REPLY: &str = r#"```json
{"status":"Draining steadily","recommendation":"Lower screen brightness","estimatedLifeRemaining":"About 4 hours","optimizationTips":["Close idle tabs","Disable Bluetooth","Use power saver"]}
```"#;

struct Running {
    handle: JoinHandle<()>,
    token: CancellationToken,
    commands: CommandSender,
    snapshots: SnapshotReceiver,
    network: watch::Sender<NetworkState>,
    mock: MockProvider,
    lock: NoopWakeLock,
}

fn launch(source: ScriptedSource, mock: MockProvider, network: NetworkState) -> Running {
    let cfg = Arc::new(DashboardCfg::default());
    let lock = NoopWakeLock::new();
    let (network_tx, network_rx) = watch::channel(network);
    let deps = DashboardDeps {
        source: Box::new(source),
        client: Some(InsightClient::new(Arc::new(mock.clone()), &cfg)),
        wake_lock: Box::new(lock.clone()),
        install: InstallPrompt::disabled(),
        simulator: Simulator::seeded(42),
        network: Some(network_rx),
    };
    let (mut dashboard, commands, snapshots) = Dashboard::new(cfg, deps);
    let token = dashboard.token();
    let handle = tokio::spawn(async move { dashboard.run().await });
    Running { handle, token, commands, snapshots, network: network_tx, mock, lock }
}

impl Running {
    async fn wait_for(&mut self, what: &str, pred: impl Fn(&DashboardSnapshot, usize) -> bool) -> DashboardSnapshot {
        let calls = self.mock.calls();
        let wait = async {
            loop {
                {
                    let snap = self.snapshots.borrow_and_update();
                    if pred(&*snap, calls.load(std::sync::atomic::Ordering::SeqCst)) {
                        return snap.clone();
                    }
                }
                self.snapshots.changed().await.expect("dashboard stopped");
            }
        };
        tokio::time::timeout(Duration::from_secs(600), wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    async fn stop(self) -> NoopWakeLock {
        self.token.cancel();
        self.handle.await.unwrap();
        self.lock
    }
}

#[tokio::test(start_paused = true)]
async fn threshold_sequence_fetches_only_on_large_moves() {
    let mut run = launch(
        ScriptedSource::levels(&[100, 94, 91, 88]),
        MockProvider::new(REPLY),
        NetworkState::Online,
    );

    let snap = run
        .wait_for("third fetch", |s, calls| calls == 3 && !s.loading && s.stats.level == 88)
        .await;
    assert_eq!(snap.insight.as_ref().unwrap().optimization_tips.len(), 3);

    // The script keeps repeating 88: nothing changes, nothing more is fetched.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(run.mock.call_count(), 3);
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn offline_never_fetches() {
    let run = launch(
        ScriptedSource::levels(&[100, 60, 20, 0]),
        MockProvider::new(REPLY),
        NetworkState::Offline,
    );
    run.commands.send(DashboardCommand::DeepAnalyze).await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;

    let snap = run.snapshots.borrow().clone();
    assert_eq!(snap.network, NetworkState::Offline);
    assert_eq!(snap.stats.level, 0);
    assert!(snap.insight.is_none());
    assert!(!snap.can_analyze());
    assert_eq!(run.mock.call_count(), 0);
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_lets_next_update_fetch() {
    let mut run = launch(
        ScriptedSource::levels(&[90, 90, 90, 89]),
        MockProvider::new(REPLY),
        NetworkState::Offline,
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(run.mock.call_count(), 0);

    run.network.send_replace(NetworkState::Online);
    run.wait_for("fetch after reconnect", |s, calls| calls == 1 && s.insight.is_some())
        .await;
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_with_stable_level_still_gets_first_insight() {
    let mut run = launch(ScriptedSource::levels(&[90]), MockProvider::new(REPLY), NetworkState::Offline);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(run.mock.call_count(), 0);

    run.network.send_replace(NetworkState::Online);
    let snap = run
        .wait_for("insight after reconnect", |s, calls| calls == 1 && s.insight.is_some())
        .await;
    assert_eq!(snap.stats.level, 90);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(run.mock.call_count(), 1);
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn manual_analysis_while_loading_is_ignored() {
    let mock = MockProvider::new(REPLY).with_delay(Duration::from_secs(10));
    let mut run = launch(ScriptedSource::levels(&[70]), mock, NetworkState::Online);

    run.wait_for("initial fetch in flight", |s, _| s.loading).await;
    run.commands.send(DashboardCommand::DeepAnalyze).await.unwrap();
    run.commands.send(DashboardCommand::DeepAnalyze).await.unwrap();

    run.wait_for("initial insight", |s, _| !s.loading && s.insight.is_some())
        .await;
    assert_eq!(run.mock.call_count(), 1);

    run.commands.send(DashboardCommand::DeepAnalyze).await.unwrap();
    run.wait_for("deep analysis", |s, calls| calls == 2 && !s.loading)
        .await;
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_leaves_no_insight_and_clears_loading() {
    let mut run = launch(
        ScriptedSource::levels(&[55]),
        MockProvider::failing(LlmError::Unavailable("503".into())),
        NetworkState::Online,
    );
    let snap = run
        .wait_for("failed fetch", |s, calls| calls == 1 && !s.loading)
        .await;
    assert!(snap.insight.is_none());
    assert!(snap.can_analyze());
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn missing_battery_shows_defaults_and_still_fetches() {
    let mut run = launch(ScriptedSource::new(), MockProvider::new(REPLY), NetworkState::Unknown);
    let snap = run
        .wait_for("initial insight", |s, calls| calls == 1 && s.insight.is_some())
        .await;
    assert!(!snap.telemetry_available);
    assert_eq!(snap.stats.level, 100);
    assert_eq!(snap.network, NetworkState::Unknown);
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn history_keeps_latest_twenty_samples() {
    let mut run = launch(ScriptedSource::levels(&[50]), MockProvider::new(REPLY), NetworkState::Online);
    // 25 samples at the default 5 s interval.
    tokio::time::sleep(Duration::from_secs(126)).await;
    let snap = run.wait_for("history", |s, _| s.history.len() == 20).await;
    assert!(snap.history.iter().all(|h| h.level == 50));
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn out_of_range_levels_are_clamped() {
    let mut source = ScriptedSource::new();
    for level in [1.7, -0.3, f64::NAN, 0.5] {
        source.push(TelemetryReading { level, ..TelemetryReading::discharging(0) });
    }
    let mut run = launch(source, MockProvider::new(REPLY), NetworkState::Offline);
    let mut seen = Vec::new();
    for _ in 0..4 {
        let snap = run.snapshots.borrow_and_update().clone();
        seen.push(snap.stats.level);
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    run.wait_for("last reading", |s, _| s.stats.level == 50).await;
    assert!(seen.iter().all(|l| *l <= 100));
    run.stop().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_wake_lock() {
    let mut run = launch(ScriptedSource::levels(&[80]), MockProvider::new(REPLY), NetworkState::Online);
    run.wait_for("wake lock", |s, _| s.wake_lock_held).await;
    let lock = run.stop().await;
    assert_eq!(lock.acquire_count(), 1);
    assert_eq!(lock.release_count(), 1);
}
