use std::time::Duration;

/// Clock resolution
pub const CLOCK_RESOLUTION_MS: u64 = 100;

/// Free-running elapsed-time accumulator for a round.
///
/// Counts whole resolution steps so the displayed value never drifts the way
/// repeated `+= 0.1` does. There is no pause state: once stopped the value is
/// frozen until `reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clock {
    steps: u64,
    running: bool,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.steps = 0;
        self.running = false;
    }

    /// Advance by one resolution step. Ignored while stopped.
    pub fn tick(&mut self) {
        if self.running {
            self.steps += 1;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Elapsed seconds, in steps of 0.1
    pub fn elapsed_secs(&self) -> f64 {
        self.steps as f64 * CLOCK_RESOLUTION_MS as f64 / 1000.0
    }

    pub fn interval() -> Duration {
        Duration::from_millis(CLOCK_RESOLUTION_MS)
    }
}
