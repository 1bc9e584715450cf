use std::collections::HashMap;

/// Prefix for every dashboard tunable read from the environment.
pub const ENV_PREFIX: &str = "VOLTSIGHT_";

/// All dashboard parameters. Loaded from `VOLTSIGHT_*` environment variables
/// at startup; anything unset or unparsable keeps its default.
#[derive(Debug, Clone)]
pub struct DashboardCfg {
    // telemetry
    pub telemetry_poll_ms: u64,
    pub sysfs_root: String,

    // history chart
    pub history_interval_secs: u64,
    pub history_capacity: usize,

    // insight debounce + request shape
    pub insight_threshold: u8,
    pub insight_max_tokens: u32,
    pub deep_max_tokens: u32,
    pub insight_temperature: f32,

    // connectivity probe
    pub connectivity_probe_addr: String,
    pub connectivity_interval_secs: u64,
    pub connectivity_timeout_ms: u64,

    // lifecycle
    pub wake_lock_enabled: bool,
}

impl Default for DashboardCfg {
    fn default() -> Self {
        Self {
            telemetry_poll_ms: 2000,
            sysfs_root: "/sys/class/power_supply".to_owned(),
            history_interval_secs: 5,
            history_capacity: 20,
            insight_threshold: 5,
            insight_max_tokens: 600,
            deep_max_tokens: 1500,
            insight_temperature: 0.4,
            connectivity_probe_addr: "1.1.1.1:443".to_owned(),
            connectivity_interval_secs: 10,
            connectivity_timeout_ms: 3000,
            wake_lock_enabled: true,
        }
    }
}

impl DashboardCfg {
    /// Load config from the process environment.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX).map(|key| (key.to_lowercase(), v))
            })
            .collect();
        let cfg = Self::from_map(&map);
        tracing::debug!(?cfg, "dashboard config loaded");
        cfg
    }

    /// Build from a lower-cased key → raw value map.
    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            telemetry_poll_ms: get_or(m, "telemetry_poll_ms", d.telemetry_poll_ms).max(100),
            sysfs_root: get_or(m, "sysfs_root", d.sysfs_root),
            history_interval_secs: get_or(m, "history_interval_secs", d.history_interval_secs).max(1),
            history_capacity: get_or(m, "history_capacity", d.history_capacity).max(1),
            insight_threshold: get_or(m, "insight_threshold", d.insight_threshold).max(1),
            insight_max_tokens: get_or(m, "insight_max_tokens", d.insight_max_tokens),
            deep_max_tokens: get_or(m, "deep_max_tokens", d.deep_max_tokens),
            insight_temperature: get_or(m, "insight_temperature", d.insight_temperature),
            connectivity_probe_addr: get_or(m, "connectivity_probe_addr", d.connectivity_probe_addr),
            connectivity_interval_secs: get_or(m, "connectivity_interval_secs", d.connectivity_interval_secs).max(1),
            connectivity_timeout_ms: get_or(m, "connectivity_timeout_ms", d.connectivity_timeout_ms).max(100),
            wake_lock_enabled: get_or(m, "wake_lock_enabled", d.wake_lock_enabled),
        }
    }

    /// Key / value / description triples, printed by the headless `config` command.
    pub fn to_entries(&self) -> Vec<(&'static str, String, &'static str)> {
        vec![
            ("telemetry_poll_ms", self.telemetry_poll_ms.to_string(), "Battery poll interval ms"),
            ("sysfs_root", self.sysfs_root.clone(), "power_supply class directory"),
            ("history_interval_secs", self.history_interval_secs.to_string(), "History sample interval seconds"),
            ("history_capacity", self.history_capacity.to_string(), "History buffer capacity"),
            ("insight_threshold", self.insight_threshold.to_string(), "Level delta that re-triggers an insight"),
            ("insight_max_tokens", self.insight_max_tokens.to_string(), "Max tokens for threshold insights"),
            ("deep_max_tokens", self.deep_max_tokens.to_string(), "Max tokens for deep analysis"),
            ("insight_temperature", self.insight_temperature.to_string(), "Sampling temperature for insights"),
            ("connectivity_probe_addr", self.connectivity_probe_addr.clone(), "host:port probed for reachability"),
            ("connectivity_interval_secs", self.connectivity_interval_secs.to_string(), "Reachability probe interval seconds"),
            ("connectivity_timeout_ms", self.connectivity_timeout_ms.to_string(), "Reachability probe timeout ms"),
            ("wake_lock_enabled", self.wake_lock_enabled.to_string(), "Hold an idle inhibitor while running"),
        ]
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_map_yields_defaults() {
        let cfg = DashboardCfg::from_map(&HashMap::new());
        assert_eq!(cfg.history_capacity, 20);
        assert_eq!(cfg.history_interval_secs, 5);
        assert_eq!(cfg.insight_threshold, 5);
        assert!(cfg.wake_lock_enabled);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = DashboardCfg::from_map(&map(&[
            ("history_capacity", "50"),
            ("insight_threshold", " 10 "),
            ("wake_lock_enabled", "false"),
            ("connectivity_probe_addr", "example.com:80"),
        ]));
        assert_eq!(cfg.history_capacity, 50);
        assert_eq!(cfg.insight_threshold, 10);
        assert!(!cfg.wake_lock_enabled);
        assert_eq!(cfg.connectivity_probe_addr, "example.com:80");
    }

    #[test]
    fn unparsable_values_fall_back() {
        let cfg = DashboardCfg::from_map(&map(&[
            ("history_capacity", "lots"),
            ("insight_threshold", "300"),
        ]));
        assert_eq!(cfg.history_capacity, 20);
        assert_eq!(cfg.insight_threshold, 5);
    }

    #[test]
    fn zero_values_are_clamped() {
        let cfg = DashboardCfg::from_map(&map(&[
            ("history_capacity", "0"),
            ("insight_threshold", "0"),
            ("telemetry_poll_ms", "1"),
            ("connectivity_timeout_ms", "0"),
        ]));
        assert_eq!(cfg.history_capacity, 1);
        assert_eq!(cfg.insight_threshold, 1);
        assert_eq!(cfg.telemetry_poll_ms, 100);
        assert_eq!(cfg.connectivity_timeout_ms, 100);
    }

    #[test]
    fn entries_cover_every_field() {
        let entries = DashboardCfg::default().to_entries();
        assert_eq!(entries.len(), 12);
        assert!(entries.iter().any(|(k, v, _)| *k == "history_capacity" && v == "20"));
        assert!(entries.iter().all(|(k, _, desc)| !k.is_empty() && !desc.is_empty()));
    }
}
