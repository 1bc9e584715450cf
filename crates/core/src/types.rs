use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Deserialize;

// ── Battery stats ────────────────────────────────────────────

/// Charge or discharge time estimate. `Infinite` means "not applicable"
/// (e.g. time-to-full while discharging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeEstimate {
    Seconds(u64),
    #[default]
    Infinite,
}

impl TimeEstimate {
    pub fn as_secs(&self) -> Option<u64> {
        match self {
            Self::Seconds(s) => Some(*s),
            Self::Infinite => None,
        }
    }
}

impl fmt::Display for TimeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "--"),
            Self::Seconds(s) => {
                let h = s / 3600;
                let m = (s % 3600) / 60;
                if h > 0 {
                    write!(f, "{h}h {m:02}m")
                } else {
                    write!(f, "{m}m")
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatteryHealth {
    #[default]
    Good,
    Fair,
    Poor,
}

impl BatteryHealth {
    /// Classify a full-charge / design-charge ratio.
    pub fn from_capacity_ratio(ratio: f64) -> Self {
        if ratio >= 0.8 {
            Self::Good
        } else if ratio >= 0.5 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

/// Current battery snapshot. Replaced on every telemetry update via [`StatsPatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryStats {
    /// Percent, always 0–100.
    pub level: u8,
    pub charging: bool,
    pub charging_time: TimeEstimate,
    pub discharging_time: TimeEstimate,
    /// Simulated °C.
    pub temperature: f32,
    /// Simulated volts.
    pub voltage: f32,
    pub health: BatteryHealth,
}

impl Default for BatteryStats {
    fn default() -> Self {
        Self {
            level: 100,
            charging: false,
            charging_time: TimeEstimate::Infinite,
            discharging_time: TimeEstimate::Infinite,
            temperature: 32.0,
            voltage: 3.85,
            health: BatteryHealth::Good,
        }
    }
}

impl BatteryStats {
    /// Merge a partial update. Level is clamped to 0–100.
    pub fn apply(&mut self, patch: &StatsPatch) {
        if let Some(level) = patch.level {
            self.level = level.min(100);
        }
        if let Some(charging) = patch.charging {
            self.charging = charging;
        }
        if let Some(t) = patch.charging_time {
            self.charging_time = t;
        }
        if let Some(t) = patch.discharging_time {
            self.discharging_time = t;
        }
        if let Some(t) = patch.temperature {
            self.temperature = t;
        }
        if let Some(v) = patch.voltage {
            self.voltage = v;
        }
        if let Some(h) = patch.health {
            self.health = h;
        }
    }

    /// The estimate relevant to the current charging direction.
    pub fn time_remaining(&self) -> TimeEstimate {
        if self.charging {
            self.charging_time
        } else {
            self.discharging_time
        }
    }
}

/// Partial stats update produced by one update source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsPatch {
    pub level: Option<u8>,
    pub charging: Option<bool>,
    pub charging_time: Option<TimeEstimate>,
    pub discharging_time: Option<TimeEstimate>,
    pub temperature: Option<f32>,
    pub voltage: Option<f32>,
    pub health: Option<BatteryHealth>,
}

/// Convert a platform level fraction (nominally 0.0–1.0) into a clamped percent.
pub fn level_from_fraction(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

// ── History ──────────────────────────────────────────────────

/// One chart point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSample {
    /// Local wall-clock time, `%H:%M:%S`.
    pub time: String,
    pub level: u8,
}

// ── Insight ──────────────────────────────────────────────────

/// Structured battery summary returned by the insight service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInsight {
    pub status: String,
    pub recommendation: String,
    pub estimated_life_remaining: String,
    pub optimization_tips: Vec<String>,
}

// ── Connectivity ─────────────────────────────────────────────

/// Network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkState {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl NetworkState {
    /// Fetches are gated only on a confirmed offline state.
    pub fn is_reachable(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

// ── Install offer ────────────────────────────────────────────

/// Deferred install offer as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallOffer {
    /// Nothing to offer (already installed, or outcome recorded).
    #[default]
    None,
    /// Intercepted and held back until the user asks for it.
    Deferred,
    /// Currently shown as a confirm prompt.
    Prompting,
}

// ── Dashboard snapshot (for TUI / headless output) ───────────

/// Read-only view of dashboard state, broadcast via watch channel.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub stats: BatteryStats,
    pub history: Vec<UsageSample>,
    pub insight: Option<Arc<BatteryInsight>>,
    pub insight_updated_at: Option<DateTime<Local>>,
    pub network: NetworkState,
    /// An insight request is in flight.
    pub loading: bool,
    /// False when no LLM provider is configured.
    pub insight_enabled: bool,
    pub telemetry_available: bool,
    pub wake_lock_held: bool,
    pub install_offer: InstallOffer,
}

impl DashboardSnapshot {
    /// Whether the manual deep-analyze control should accept input.
    pub fn can_analyze(&self) -> bool {
        self.insight_enabled && !self.loading && self.network.is_reachable()
    }
}
