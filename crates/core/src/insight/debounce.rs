/// Change-threshold debounce for insight requests.
///
/// Fires on the first evaluation, then whenever the level has moved at least
/// `threshold` points away from the level of the last request. The level is
/// recorded at trigger time, not when the response arrives.
#[derive(Debug, Clone)]
pub struct InsightDebouncer {
    threshold: u8,
    last_requested: Option<u8>,
}

impl InsightDebouncer {
    pub fn new(threshold: u8) -> Self {
        Self { threshold: threshold.max(1), last_requested: None }
    }

    /// Pure check, no state change.
    pub fn should_request(&self, level: u8) -> bool {
        match self.last_requested {
            None => true,
            Some(last) => last.abs_diff(level) >= self.threshold,
        }
    }

    /// Check and, on trigger, record `level` as the last requested level.
    pub fn evaluate(&mut self, level: u8) -> bool {
        let fire = self.should_request(level);
        if fire {
            self.last_requested = Some(level);
        }
        fire
    }

    /// Record a request issued outside the threshold rule (manual analysis).
    pub fn record(&mut self, level: u8) {
        self.last_requested = Some(level);
    }

    pub fn last_requested(&self) -> Option<u8> {
        self.last_requested
    }
}
