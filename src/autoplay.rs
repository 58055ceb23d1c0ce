use std::time::Duration;

use crate::layout::Token;
use crate::timers::{TimerHandle, TimerQueue};

/// Cadence between synthetic clicks
pub const AUTOPLAY_INTERVAL_MS: u64 = 3000;

/// What the driver wants done on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayStep {
    /// Click this id, which is the current next-expected token
    Click(u32),
    /// The expected token is not visible; stop instead of spinning
    Desync,
    /// Not armed
    Idle,
}

/// Periodic agent that clicks `next_expected` on a fixed cadence.
///
/// The driver owns at most one pending timer. Disarming cancels that timer
/// before returning, so no tick can land after a disarm.
#[derive(Debug, Default)]
pub struct AutoplayDriver {
    armed: bool,
    timer: Option<TimerHandle>,
}

impl AutoplayDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm<T>(&mut self, timers: &mut TimerQueue<T>) {
        self.armed = false;
        if let Some(handle) = self.timer.take() {
            timers.cancel(handle);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_scheduled(&self) -> bool {
        self.timer.is_some()
    }

    /// Schedule the next tick unless one is already pending
    pub fn schedule<T>(&mut self, timers: &mut TimerQueue<T>, event: T) {
        if self.armed && self.timer.is_none() {
            self.timer = Some(timers.schedule(Self::interval(), event));
        }
    }

    /// Decide what to do when the pending tick fires. Reads the live token
    /// state rather than anything cached at scheduling time.
    pub fn on_tick(&mut self, next_expected: u32, tokens: &[Token]) -> AutoplayStep {
        self.timer = None;
        if !self.armed {
            return AutoplayStep::Idle;
        }

        match tokens.iter().find(|t| t.id == next_expected) {
            Some(token) if token.is_visible() => AutoplayStep::Click(token.id),
            _ => AutoplayStep::Desync,
        }
    }

    pub fn interval() -> Duration {
        Duration::from_millis(AUTOPLAY_INTERVAL_MS)
    }
}
