use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::telemetry::source::TelemetryReading;
use crate::types::{BatteryHealth, StatsPatch, level_from_fraction};

pub const TEMPERATURE_RANGE: Range<f32> = 30.0..38.0;
pub const VOLTAGE_RANGE: Range<f32> = 3.6..4.2;

/// Draws the fields the platform does not expose. Every draw is independent.
#[derive(Debug)]
pub struct Simulator {
    rng: StdRng,
}

impl Simulator {
    pub fn new() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn temperature(&mut self) -> f32 {
        self.rng.random_range(TEMPERATURE_RANGE)
    }

    pub fn voltage(&mut self) -> f32 {
        self.rng.random_range(VOLTAGE_RANGE)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns polled readings into stats patches. A reading identical to the
/// previous one is not a change and yields nothing.
#[derive(Debug)]
pub struct TelemetryMirror {
    last: Option<TelemetryReading>,
    simulator: Simulator,
}

impl TelemetryMirror {
    pub fn new(simulator: Simulator) -> Self {
        Self { last: None, simulator }
    }

    /// True once the first reading has been observed.
    pub fn is_active(&self) -> bool {
        self.last.is_some()
    }

    /// Feed a reading; returns a full patch on first availability or change.
    pub fn observe(&mut self, reading: TelemetryReading) -> Option<StatsPatch> {
        if self.last.as_ref() == Some(&reading) {
            return None;
        }
        let patch = StatsPatch {
            level: Some(level_from_fraction(reading.level)),
            charging: Some(reading.charging),
            charging_time: Some(reading.charging_time),
            discharging_time: Some(reading.discharging_time),
            temperature: Some(self.simulator.temperature()),
            voltage: Some(self.simulator.voltage()),
            health: Some(
                reading
                    .capacity_ratio
                    .map(BatteryHealth::from_capacity_ratio)
                    .unwrap_or_default(),
            ),
        };
        self.last = Some(reading);
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeEstimate;

    fn mirror() -> TelemetryMirror {
        TelemetryMirror::new(Simulator::seeded(7))
    }

    #[test]
    fn first_reading_activates_and_patches_everything() {
        let mut m = mirror();
        assert!(!m.is_active());
        let patch = m.observe(TelemetryReading::discharging(94)).unwrap();
        assert!(m.is_active());
        assert_eq!(patch.level, Some(94));
        assert_eq!(patch.charging, Some(false));
        assert_eq!(patch.charging_time, Some(TimeEstimate::Infinite));
        assert!(patch.temperature.is_some());
        assert!(patch.voltage.is_some());
        assert_eq!(patch.health, Some(BatteryHealth::Good));
    }

    #[test]
    fn unchanged_reading_is_not_an_update() {
        let mut m = mirror();
        assert!(m.observe(TelemetryReading::discharging(80)).is_some());
        assert!(m.observe(TelemetryReading::discharging(80)).is_none());
        assert!(m.observe(TelemetryReading::discharging(79)).is_some());
    }

    #[test]
    fn charging_flip_is_an_update() {
        let mut m = mirror();
        m.observe(TelemetryReading::discharging(50));
        let mut plugged = TelemetryReading::discharging(50);
        plugged.charging = true;
        let patch = m.observe(plugged).unwrap();
        assert_eq!(patch.charging, Some(true));
    }

    #[test]
    fn simulated_fields_stay_in_range() {
        let mut m = mirror();
        for level in 0..=100u8 {
            let patch = m.observe(TelemetryReading::discharging(level)).unwrap();
            let t = patch.temperature.unwrap();
            let v = patch.voltage.unwrap();
            assert!(TEMPERATURE_RANGE.contains(&t), "temperature {t} out of range");
            assert!(VOLTAGE_RANGE.contains(&v), "voltage {v} out of range");
        }
    }

    #[test]
    fn out_of_range_fraction_is_clamped() {
        let mut m = mirror();
        let mut reading = TelemetryReading::discharging(0);
        reading.level = 1.35;
        assert_eq!(m.observe(reading.clone()).unwrap().level, Some(100));
        reading.level = -0.5;
        assert_eq!(m.observe(reading).unwrap().level, Some(0));
    }

    #[test]
    fn health_follows_capacity_ratio() {
        let mut m = mirror();
        let mut reading = TelemetryReading::discharging(60);
        reading.capacity_ratio = Some(0.55);
        assert_eq!(m.observe(reading).unwrap().health, Some(BatteryHealth::Fair));
    }
}
