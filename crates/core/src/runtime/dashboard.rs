use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::shutdown::ShutdownGuard;
use crate::config::DashboardCfg;
use crate::connectivity::ConnectivityWatcher;
use crate::history::HistoryBuffer;
use crate::insight::{InsightClient, InsightOrchestrator, InsightOutcome, OutcomeReceiver};
use crate::io::input::{self, CommandReceiver, CommandSender, DashboardCommand};
use crate::io::output::{self, SnapshotReceiver, SnapshotSender};
use crate::lifecycle::{InhibitorLock, InstallPrompt, NoopWakeLock, WakeLock};
use crate::telemetry::{PowerSupplySource, Simulator, TelemetryMirror, TelemetrySource};
use crate::types::{BatteryInsight, BatteryStats, DashboardSnapshot, NetworkState, StatsPatch};

const COMMAND_BUFFER: usize = 32;

/// Everything the dashboard needs from the outside world.
pub struct DashboardDeps {
    pub source: Box<dyn TelemetrySource>,
    /// `None` disables the insight feature.
    pub client: Option<InsightClient>,
    pub wake_lock: Box<dyn WakeLock>,
    pub install: InstallPrompt,
    pub simulator: Simulator,
    /// Externally driven network state. `None` spawns the TCP probe on `run`.
    pub network: Option<watch::Receiver<NetworkState>>,
}

impl DashboardDeps {
    /// Real battery, LLM from the environment, systemd idle inhibitor and the
    /// XDG launcher offer.
    pub fn production(cfg: &DashboardCfg) -> Self {
        let client = voltsight_llm::http::from_env().map(|provider| {
            let client = InsightClient::new(Arc::new(provider), cfg);
            match voltsight_llm::http::deep_from_env() {
                Some(deep) => client.with_deep_provider(Arc::new(deep)),
                None => client,
            }
        });
        let wake_lock: Box<dyn WakeLock> = if cfg.wake_lock_enabled {
            Box::new(InhibitorLock::systemd())
        } else {
            Box::new(NoopWakeLock::new())
        };
        Self {
            source: Box::new(PowerSupplySource::new(&cfg.sysfs_root)),
            client,
            wake_lock,
            install: InstallPrompt::detect(),
            simulator: Simulator::new(),
            network: None,
        }
    }
}

enum Event {
    Shutdown,
    TelemetryTick,
    HistoryTick,
    Network(NetworkState),
    NetworkClosed,
    Outcome(InsightOutcome),
    Command(DashboardCommand),
    CommandsClosed,
}

/// Single owner of all dashboard state.
///
/// Every mutation happens on the task running [`Dashboard::run`]; telemetry,
/// history, connectivity, insight completions and UI commands are all
/// multiplexed into one select loop.
pub struct Dashboard {
    cfg: Arc<DashboardCfg>,
    shutdown: ShutdownGuard,
    stats: BatteryStats,
    history: HistoryBuffer,
    insight: Option<Arc<BatteryInsight>>,
    insight_updated_at: Option<DateTime<Local>>,
    network: NetworkState,
    source: Box<dyn TelemetrySource>,
    mirror: TelemetryMirror,
    telemetry_available: bool,
    /// Set once a read failure has been logged; cleared on recovery.
    telemetry_warned: bool,
    orchestrator: Option<InsightOrchestrator>,
    outcome_rx: Option<OutcomeReceiver>,
    wake_lock: Box<dyn WakeLock>,
    wake_lock_held: bool,
    install: InstallPrompt,
    network_rx: Option<watch::Receiver<NetworkState>>,
    command_rx: Option<CommandReceiver>,
    snapshot_tx: SnapshotSender,
}

impl Dashboard {
    /// Returns the dashboard, the command sender for the presentation layer,
    /// and the snapshot receiver it renders from.
    pub fn new(cfg: Arc<DashboardCfg>, deps: DashboardDeps) -> (Self, CommandSender, SnapshotReceiver) {
        let shutdown = ShutdownGuard::new();
        let (command_tx, command_rx) = input::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = output::channel();

        let (orchestrator, outcome_rx) = match deps.client {
            Some(client) => {
                tracing::info!(provider = client.provider_name(), "insights enabled");
                let (orch, rx) =
                    InsightOrchestrator::new(client, cfg.insight_threshold, shutdown.token());
                (Some(orch), Some(rx))
            }
            None => {
                tracing::warn!("no LLM provider configured, insights disabled");
                (None, None)
            }
        };

        let dashboard = Self {
            history: HistoryBuffer::new(cfg.history_capacity),
            cfg,
            shutdown,
            stats: BatteryStats::default(),
            insight: None,
            insight_updated_at: None,
            network: NetworkState::Unknown,
            source: deps.source,
            mirror: TelemetryMirror::new(deps.simulator),
            telemetry_available: false,
            telemetry_warned: false,
            orchestrator,
            outcome_rx,
            wake_lock: deps.wake_lock,
            wake_lock_held: false,
            install: deps.install,
            network_rx: deps.network,
            command_rx: Some(command_rx),
            snapshot_tx,
        };
        dashboard.publish();
        (dashboard, command_tx, snapshot_rx)
    }

    /// Cancellation token scoping every task the dashboard owns.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            stats: self.stats.clone(),
            history: self.history.to_vec(),
            insight: self.insight.clone(),
            insight_updated_at: self.insight_updated_at,
            network: self.network,
            loading: self.orchestrator.as_ref().is_some_and(|o| o.is_loading()),
            insight_enabled: self.orchestrator.is_some(),
            telemetry_available: self.telemetry_available,
            wake_lock_held: self.wake_lock_held,
            install_offer: self.install.state(),
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    /// Activation: take the wake lock, read telemetry once and run the
    /// initial insight evaluation.
    pub fn start(&mut self) {
        tracing::info!(source = self.source.name(), "dashboard starting");
        self.acquire_wake_lock();
        if !self.poll_telemetry() {
            // No reading to react to: evaluate the defaults once so the
            // first insight is still requested.
            self.evaluate_insight();
        }
        self.publish();
    }

    /// Read the telemetry source. Returns true if the reading changed the
    /// stats (and so already ran the insight evaluation).
    pub fn poll_telemetry(&mut self) -> bool {
        match self.source.read() {
            Ok(reading) => {
                if !self.telemetry_available {
                    tracing::info!(source = self.source.name(), "battery telemetry available");
                }
                self.telemetry_available = true;
                self.telemetry_warned = false;
                match self.mirror.observe(reading) {
                    Some(patch) => {
                        self.apply_patch(&patch);
                        true
                    }
                    None => {
                        tracing::debug!(level = self.stats.level, "telemetry unchanged");
                        false
                    }
                }
            }
            Err(e) => {
                if !self.telemetry_warned {
                    tracing::warn!(error = %e, "battery telemetry unavailable, showing defaults");
                    self.telemetry_warned = true;
                }
                if self.telemetry_available {
                    self.telemetry_available = false;
                    self.publish();
                }
                false
            }
        }
    }

    /// Merge a stats update and re-run the insight threshold rule.
    pub fn apply_patch(&mut self, patch: &StatsPatch) {
        self.stats.apply(patch);
        tracing::debug!(level = self.stats.level, charging = self.stats.charging, "stats updated");
        self.evaluate_insight();
        self.publish();
    }

    fn evaluate_insight(&mut self) {
        if let Some(orch) = self.orchestrator.as_mut() {
            orch.on_stats(&self.stats, self.network);
        }
    }

    /// Append the current level to the history chart.
    pub fn record_history(&mut self, at: DateTime<Local>) {
        self.history.record(self.stats.level, at);
        self.publish();
    }

    pub fn on_network(&mut self, state: NetworkState) {
        if self.network == state {
            return;
        }
        let was_offline = self.network == NetworkState::Offline;
        self.network = state;
        if state == NetworkState::Offline {
            tracing::warn!("offline, insight requests paused");
        } else if was_offline {
            tracing::info!(?state, "connectivity restored");
            // Updates seen while offline were never judged.
            self.evaluate_insight();
        }
        self.publish();
    }

    pub fn on_outcome(&mut self, outcome: InsightOutcome) {
        let Some(orch) = self.orchestrator.as_mut() else {
            return;
        };
        if let Some(insight) = orch.complete(outcome) {
            self.insight = Some(Arc::new(insight));
            self.insight_updated_at = Some(Local::now());
        }
        self.publish();
    }

    pub fn on_command(&mut self, command: DashboardCommand) {
        match command {
            DashboardCommand::DeepAnalyze => match self.orchestrator.as_mut() {
                Some(orch) => {
                    orch.request_deep(&self.stats, self.network);
                }
                None => tracing::info!("deep analysis requested but insights are disabled"),
            },
            DashboardCommand::FocusGained => {
                self.wake_lock_held = self.wake_lock.is_held();
                if !self.wake_lock_held {
                    self.acquire_wake_lock();
                }
            }
            DashboardCommand::ShowInstallOffer => {
                if !self.install.prompt() {
                    tracing::debug!(state = ?self.install.state(), "no install offer to show");
                }
            }
            DashboardCommand::ResolveInstallOffer(accept) => {
                if let Err(e) = self.install.resolve(accept) {
                    tracing::warn!(error = %e, "install offer not resolved");
                }
            }
        }
        self.publish();
    }

    fn acquire_wake_lock(&mut self) {
        match self.wake_lock.acquire() {
            Ok(()) => self.wake_lock_held = true,
            Err(e) => {
                self.wake_lock_held = false;
                tracing::warn!(error = %e, "wake lock unavailable");
            }
        }
    }

    /// Release everything the dashboard holds. In-flight requests, the
    /// connectivity probe and the wake lock go together.
    pub fn teardown(&mut self) {
        if let Some(orch) = self.orchestrator.as_mut() {
            orch.cancel();
        }
        self.wake_lock.release();
        self.wake_lock_held = false;
        self.shutdown.token().cancel();
        self.publish();
        tracing::info!("dashboard stopped");
    }

    /// Run until the token is cancelled, then tear down.
    pub async fn run(&mut self) {
        self.shutdown.spawn_signal_listener();
        let token = self.shutdown.token();

        let mut network_rx = match self.network_rx.take() {
            Some(rx) => rx,
            None => ConnectivityWatcher::from_cfg(&self.cfg).spawn(token.child_token()),
        };
        self.network = *network_rx.borrow_and_update();
        let mut network_open = true;
        let mut outcome_rx = self.outcome_rx.take();
        let mut command_rx = self.command_rx.take();

        self.start();

        let poll = Duration::from_millis(self.cfg.telemetry_poll_ms);
        let mut telemetry = tokio::time::interval_at(Instant::now() + poll, poll);
        telemetry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let sample = Duration::from_secs(self.cfg.history_interval_secs);
        let mut history = tokio::time::interval_at(Instant::now() + sample, sample);
        history.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            poll_ms = self.cfg.telemetry_poll_ms,
            history_secs = self.cfg.history_interval_secs,
            "dashboard loop running"
        );

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => Event::Shutdown,
                _ = telemetry.tick() => Event::TelemetryTick,
                _ = history.tick() => Event::HistoryTick,
                changed = network_rx.changed(), if network_open => match changed {
                    Ok(()) => Event::Network(*network_rx.borrow_and_update()),
                    Err(_) => Event::NetworkClosed,
                },
                Some(outcome) = recv_outcome(&mut outcome_rx) => Event::Outcome(outcome),
                command = recv_command(&mut command_rx) => match command {
                    Some(c) => Event::Command(c),
                    None => Event::CommandsClosed,
                },
            };

            match event {
                Event::Shutdown => {
                    tracing::info!("shutdown signal received, exiting dashboard loop");
                    break;
                }
                Event::TelemetryTick => {
                    self.poll_telemetry();
                }
                Event::HistoryTick => self.record_history(Local::now()),
                Event::Network(state) => self.on_network(state),
                Event::NetworkClosed => {
                    tracing::debug!("network feed closed");
                    network_open = false;
                }
                Event::Outcome(outcome) => self.on_outcome(outcome),
                Event::Command(command) => self.on_command(command),
                Event::CommandsClosed => {
                    tracing::debug!("command channel closed");
                    command_rx = None;
                }
            }
        }

        self.teardown();
    }
}

async fn recv_outcome(rx: &mut Option<OutcomeReceiver>) -> Option<InsightOutcome> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_command(rx: &mut Option<CommandReceiver>) -> Option<DashboardCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
