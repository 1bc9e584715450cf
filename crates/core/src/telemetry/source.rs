use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::TimeEstimate;

/// Raw battery reading from the platform. Temperature and voltage are not
/// part of it; the mirror simulates those.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReading {
    /// Nominally 0.0–1.0.
    pub level: f64,
    pub charging: bool,
    pub charging_time: TimeEstimate,
    pub discharging_time: TimeEstimate,
    /// Full-charge / design-charge, when the platform reports both.
    pub capacity_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TelemetryError {
    #[error("no battery found under {0}")]
    NotFound(String),
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
}

/// Battery capability. Polled by the dashboard runtime.
pub trait TelemetrySource: Send {
    fn name(&self) -> &str;

    fn read(&mut self) -> Result<TelemetryReading, TelemetryError>;
}

// ── sysfs ────────────────────────────────────────────────────

/// Reads one battery under `/sys/class/power_supply`.
#[derive(Debug)]
pub struct SysfsSource {
    path: PathBuf,
    name: String,
}

impl SysfsSource {
    /// Scan `root` for a `type == Battery` supply. `BAT*` entries win,
    /// then lexical order (BAT0 before BAT1).
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let root = root.as_ref();
        let not_found = || TelemetryError::NotFound(root.display().to_string());

        let mut candidates: Vec<PathBuf> = fs::read_dir(root)
            .map_err(|_| not_found())?
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                let kind = fs::read_to_string(path.join("type")).ok()?;
                (kind.trim() == "Battery").then_some(path)
            })
            .collect();

        candidates.sort_by_key(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_owned();
            (!name.starts_with("BAT"), name)
        });

        let path = candidates.into_iter().next().ok_or_else(not_found)?;
        Ok(Self::with_path(path))
    }

    pub fn with_path(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("battery")
            .to_owned();
        Self { path, name }
    }

    fn read_raw(&self, file: &str) -> Result<String, TelemetryError> {
        let full = self.path.join(file);
        fs::read_to_string(&full)
            .map(|s| s.trim().to_owned())
            .map_err(|e| TelemetryError::Read {
                path: full.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Optional numeric attribute; missing or unparsable reads as `None`.
    fn read_num(&self, file: &str) -> Option<f64> {
        self.read_raw(file).ok()?.parse().ok()
    }

    /// First attribute pair that exists: energy (µWh/µW) or charge (µAh/µA).
    /// Rate is a magnitude: some drivers report a negative draw while
    /// discharging.
    fn now_full_rate(&self) -> Option<(f64, f64, f64)> {
        let energy = (
            self.read_num("energy_now"),
            self.read_num("energy_full"),
            self.read_num("power_now"),
        );
        if let (Some(now), Some(full), Some(rate)) = energy {
            return Some((now, full, rate.abs()));
        }
        match (
            self.read_num("charge_now"),
            self.read_num("charge_full"),
            self.read_num("current_now"),
        ) {
            (Some(now), Some(full), Some(rate)) => Some((now, full, rate.abs())),
            _ => None,
        }
    }

    fn capacity_ratio(&self) -> Option<f64> {
        let pair = match (self.read_num("energy_full"), self.read_num("energy_full_design")) {
            (Some(full), Some(design)) => Some((full, design)),
            _ => match (self.read_num("charge_full"), self.read_num("charge_full_design")) {
                (Some(full), Some(design)) => Some((full, design)),
                _ => None,
            },
        };
        pair.filter(|(_, design)| *design > 0.0).map(|(full, design)| full / design)
    }

    fn time_to_full(&self, status: &str) -> TimeEstimate {
        if status == "Full" {
            return TimeEstimate::Seconds(0);
        }
        if let Some(secs) = self.read_num("time_to_full_now") {
            return TimeEstimate::Seconds(secs as u64);
        }
        match self.now_full_rate() {
            Some((now, full, rate)) if rate > 0.0 && full >= now => {
                TimeEstimate::Seconds(((full - now) / rate * 3600.0) as u64)
            }
            _ => TimeEstimate::Infinite,
        }
    }

    fn time_to_empty(&self) -> TimeEstimate {
        if let Some(secs) = self.read_num("time_to_empty_now") {
            return TimeEstimate::Seconds(secs as u64);
        }
        match self.now_full_rate() {
            Some((now, _, rate)) if rate > 0.0 => {
                TimeEstimate::Seconds((now / rate * 3600.0) as u64)
            }
            _ => TimeEstimate::Infinite,
        }
    }
}

impl TelemetrySource for SysfsSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> Result<TelemetryReading, TelemetryError> {
        let capacity_raw = self.read_raw("capacity")?;
        let capacity: f64 = capacity_raw.parse().map_err(|_| TelemetryError::Read {
            path: self.path.join("capacity").display().to_string(),
            reason: format!("not a number: {capacity_raw:?}"),
        })?;
        let status = self.read_raw("status").unwrap_or_default();
        let charging = matches!(status.as_str(), "Charging" | "Full");

        let (charging_time, discharging_time) = if charging {
            (self.time_to_full(&status), TimeEstimate::Infinite)
        } else {
            (TimeEstimate::Infinite, self.time_to_empty())
        };

        Ok(TelemetryReading {
            level: capacity / 100.0,
            charging,
            charging_time,
            discharging_time,
            capacity_ratio: self.capacity_ratio(),
        })
    }
}

/// Production source: finds the battery lazily and re-scans after a read
/// failure, so a missing or hot-swapped battery is reported per poll instead
/// of failing startup.
#[derive(Debug)]
pub struct PowerSupplySource {
    root: PathBuf,
    battery: Option<SysfsSource>,
}

impl PowerSupplySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), battery: None }
    }
}

impl TelemetrySource for PowerSupplySource {
    fn name(&self) -> &str {
        self.battery.as_ref().map_or("power_supply", |b| b.name())
    }

    fn read(&mut self) -> Result<TelemetryReading, TelemetryError> {
        if self.battery.is_none() {
            let found = SysfsSource::discover(&self.root)?;
            tracing::info!(battery = found.name(), path = %found.path.display(), "battery discovered");
            self.battery = Some(found);
        }
        let result = match self.battery.as_mut() {
            Some(battery) => battery.read(),
            None => Err(TelemetryError::NotFound(self.root.display().to_string())),
        };
        if result.is_err() {
            self.battery = None;
        }
        result
    }
}

// ── scripted ─────────────────────────────────────────────────

/// Replays a fixed sequence of readings; the last one repeats once the
/// script runs out. Used by tests and demos.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<TelemetryReading, TelemetryError>>,
    last: Option<Result<TelemetryReading, TelemetryError>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script of discharging readings at the given percent levels.
    pub fn levels(levels: &[u8]) -> Self {
        let mut source = Self::new();
        for &level in levels {
            source.push(TelemetryReading::discharging(level));
        }
        source
    }

    pub fn push(&mut self, reading: TelemetryReading) {
        self.script.push_back(Ok(reading));
    }

    pub fn push_error(&mut self, error: TelemetryError) {
        self.script.push_back(Err(error));
    }
}

impl TelemetrySource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn read(&mut self) -> Result<TelemetryReading, TelemetryError> {
        if let Some(next) = self.script.pop_front() {
            self.last = Some(next);
        }
        self.last
            .clone()
            .unwrap_or_else(|| Err(TelemetryError::NotFound("empty script".into())))
    }
}

impl TelemetryReading {
    /// Discharging reading at `percent` with no time estimate.
    pub fn discharging(percent: u8) -> Self {
        Self {
            level: f64::from(percent) / 100.0,
            charging: false,
            charging_time: TimeEstimate::Infinite,
            discharging_time: TimeEstimate::Infinite,
            capacity_ratio: None,
        }
    }
}
