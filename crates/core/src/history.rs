use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::types::UsageSample;

pub const DEFAULT_CAPACITY: usize = 20;

/// Sliding window of recent level samples for the chart.
/// Strict FIFO: each append past capacity evicts exactly the oldest sample.
#[derive(Debug)]
pub struct HistoryBuffer {
    samples: VecDeque<UsageSample>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample stamped with `at`, formatted `%H:%M:%S`.
    pub fn record(&mut self, level: u8, at: DateTime<Local>) {
        self.push(UsageSample {
            time: at.format("%H:%M:%S").to_string(),
            level: level.min(100),
        });
    }

    pub fn push(&mut self, sample: UsageSample) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &UsageSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&UsageSample> {
        self.samples.back()
    }

    pub fn to_vec(&self) -> Vec<UsageSample> {
        self.samples.iter().cloned().collect()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(n: u8) -> UsageSample {
        UsageSample { time: format!("t{n}"), level: n }
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = HistoryBuffer::default();
        for n in 1..=60 {
            buf.push(sample(n));
            assert!(buf.len() <= 20);
        }
        assert_eq!(buf.len(), 20);
    }

    #[test]
    fn twenty_first_append_evicts_only_the_oldest() {
        let mut buf = HistoryBuffer::default();
        for n in 1..=21 {
            buf.push(sample(n));
        }
        let levels: Vec<u8> = buf.iter().map(|s| s.level).collect();
        assert_eq!(levels, (2..=21).collect::<Vec<u8>>());
    }

    #[test]
    fn twenty_five_ticks_keep_six_through_twenty_five() {
        let mut buf = HistoryBuffer::default();
        for n in 1..=25 {
            buf.push(sample(n));
        }
        let times: Vec<String> = buf.iter().map(|s| s.time.clone()).collect();
        let expected: Vec<String> = (6..=25).map(|n| format!("t{n}")).collect();
        assert_eq!(times, expected);
    }

    #[test]
    fn record_formats_wall_clock_time() {
        let mut buf = HistoryBuffer::new(3);
        let at = Local.with_ymd_and_hms(2026, 3, 1, 9, 5, 7).unwrap();
        buf.record(77, at);
        assert_eq!(buf.latest(), Some(&UsageSample { time: "09:05:07".into(), level: 77 }));
    }

    #[test]
    fn zero_capacity_is_treated_as_one() {
        let mut buf = HistoryBuffer::new(0);
        buf.push(sample(1));
        buf.push(sample(2));
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.to_vec(), vec![sample(2)]);
    }
}
