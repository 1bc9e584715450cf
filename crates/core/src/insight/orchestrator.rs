use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::insight::client::InsightClient;
use crate::insight::debounce::InsightDebouncer;
use crate::insight::prompt::InsightDepth;
use crate::insight::InsightError;
use crate::types::{BatteryInsight, BatteryStats, NetworkState};

/// Completion of one spawned request.
#[derive(Debug)]
pub struct InsightOutcome {
    pub request_id: u64,
    pub result: Result<BatteryInsight, InsightError>,
}

pub type OutcomeReceiver = mpsc::Receiver<InsightOutcome>;

#[derive(Debug)]
struct InFlight {
    id: u64,
    depth: InsightDepth,
    token: CancellationToken,
}

/// Decides when to fetch, spawns fetches, and filters their completions.
///
/// Every request gets a monotonically increasing id. Only the completion of
/// the latest issued id is applied; a newer threshold trigger cancels the
/// request it supersedes.
pub struct InsightOrchestrator {
    client: InsightClient,
    debouncer: InsightDebouncer,
    next_id: u64,
    in_flight: Option<InFlight>,
    outcome_tx: mpsc::Sender<InsightOutcome>,
    /// Parent scope; cancelling it tears down every in-flight request.
    scope: CancellationToken,
}

impl InsightOrchestrator {
    pub fn new(
        client: InsightClient,
        threshold: u8,
        scope: CancellationToken,
    ) -> (Self, OutcomeReceiver) {
        let (outcome_tx, outcome_rx) = mpsc::channel(16);
        let orchestrator = Self {
            client,
            debouncer: InsightDebouncer::new(threshold),
            next_id: 0,
            in_flight: None,
            outcome_tx,
            scope,
        };
        (orchestrator, outcome_rx)
    }

    /// True while a request is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Id of the most recently issued request (0 = none yet).
    pub fn latest_id(&self) -> u64 {
        self.next_id
    }

    pub fn last_requested_level(&self) -> Option<u8> {
        self.debouncer.last_requested()
    }

    /// Evaluate the threshold rule after a stats update.
    /// Returns the new request id if a fetch was started.
    pub fn on_stats(&mut self, stats: &BatteryStats, network: NetworkState) -> Option<u64> {
        if !network.is_reachable() {
            tracing::debug!(level = stats.level, "offline, insight evaluation skipped");
            return None;
        }
        if !self.debouncer.evaluate(stats.level) {
            return None;
        }
        Some(self.spawn(stats.clone(), InsightDepth::Quick))
    }

    /// Manual deep analysis. Bypasses the threshold but not the
    /// connectivity gate or the in-flight guard.
    pub fn request_deep(&mut self, stats: &BatteryStats, network: NetworkState) -> Option<u64> {
        if !network.is_reachable() {
            tracing::info!("offline, deep analysis unavailable");
            return None;
        }
        if let Some(current) = &self.in_flight {
            tracing::debug!(request_id = current.id, "deep analysis ignored, request in flight");
            return None;
        }
        self.debouncer.record(stats.level);
        Some(self.spawn(stats.clone(), InsightDepth::Deep))
    }

    fn spawn(&mut self, stats: BatteryStats, depth: InsightDepth) -> u64 {
        if let Some(prev) = self.in_flight.take() {
            prev.token.cancel();
            tracing::debug!(request_id = prev.id, depth = ?prev.depth, "insight request superseded");
        }

        self.next_id += 1;
        let id = self.next_id;
        let token = self.scope.child_token();
        let client = self.client.clone();
        let tx = self.outcome_tx.clone();
        let task_token = token.clone();

        tracing::info!(request_id = id, level = stats.level, ?depth, "insight request started");
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = task_token.cancelled() => {
                    tracing::debug!(request_id = id, "insight request cancelled");
                    return;
                }
                result = client.fetch(&stats, depth) => result,
            };
            let _ = tx.send(InsightOutcome { request_id: id, result }).await;
        });

        self.in_flight = Some(InFlight { id, depth, token });
        id
    }

    /// Filter a completion. Returns the insight to display, or `None` when the
    /// completion is stale or failed (the caller keeps what it has).
    pub fn complete(&mut self, outcome: InsightOutcome) -> Option<BatteryInsight> {
        let is_latest = self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.id == outcome.request_id);
        if !is_latest {
            tracing::debug!(
                request_id = outcome.request_id,
                latest = self.next_id,
                "stale insight result discarded"
            );
            return None;
        }
        self.in_flight = None;

        match outcome.result {
            Ok(insight) => {
                tracing::info!(request_id = outcome.request_id, status = %insight.status, "insight updated");
                Some(insight)
            }
            Err(e) => {
                tracing::warn!(request_id = outcome.request_id, error = %e, "insight request failed");
                None
            }
        }
    }

    /// Cancel whatever is in flight.
    pub fn cancel(&mut self) {
        if let Some(f) = self.in_flight.take() {
            f.token.cancel();
        }
    }
}
