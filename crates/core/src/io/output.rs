use tokio::sync::watch;

use crate::types::{DashboardSnapshot, NetworkState};

/// Snapshot channel sender. The dashboard loop publishes here after every
/// state change.
pub type SnapshotSender = watch::Sender<DashboardSnapshot>;
/// Snapshot channel receiver. Renderers read the latest state from here.
pub type SnapshotReceiver = watch::Receiver<DashboardSnapshot>;

pub fn channel() -> (SnapshotSender, SnapshotReceiver) {
    watch::channel(DashboardSnapshot::default())
}

/// One-line summary used by the headless monitor.
pub fn status_line(snap: &DashboardSnapshot) -> String {
    let stats = &snap.stats;
    let mut line = format!(
        "{:>3}% {} | {} remaining | {:.1}°C | {:.2}V | health {}",
        stats.level,
        if stats.charging { "charging" } else { "on battery" },
        stats.time_remaining(),
        stats.temperature,
        stats.voltage,
        stats.health.as_str(),
    );
    match snap.network {
        NetworkState::Offline => line.push_str(" | OFFLINE"),
        NetworkState::Unknown => line.push_str(" | network ?"),
        NetworkState::Online => {}
    }
    if !snap.telemetry_available {
        line.push_str(" | no battery detected");
    }
    if snap.loading {
        line.push_str(" | analyzing...");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatteryStats, TimeEstimate};

    #[test]
    fn status_line_reports_core_fields() {
        let snap = DashboardSnapshot {
            stats: BatteryStats {
                level: 42,
                discharging_time: TimeEstimate::Seconds(3 * 3600 + 5 * 60),
                ..Default::default()
            },
            network: NetworkState::Online,
            telemetry_available: true,
            ..Default::default()
        };
        let line = status_line(&snap);
        assert!(line.starts_with(" 42% on battery"));
        assert!(line.contains("3h 05m remaining"));
        assert!(!line.contains("OFFLINE"));
    }

    #[test]
    fn status_line_flags_degraded_modes() {
        let snap = DashboardSnapshot {
            network: NetworkState::Offline,
            loading: true,
            ..Default::default()
        };
        let line = status_line(&snap);
        assert!(line.contains("OFFLINE"));
        assert!(line.contains("analyzing"));
        assert!(line.contains("no battery detected"));
    }
}
