use std::collections::BTreeMap;
use std::time::Duration;

/// Tie-breaker between timers sharing a deadline: `Early` fires first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Lane {
    Early,
    #[default]
    Normal,
}

/// Identifies one scheduled timer. Cancelling it guarantees it never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle {
    deadline: Duration,
    lane: Lane,
    seq: u64,
}

impl TimerHandle {
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Virtual-time timer queue.
///
/// Timers fire in deadline order, then by lane, then in scheduling order. Time only moves
/// when the owner pops due timers or settles, so the same inputs always
/// produce the same firing sequence.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    now: Duration,
    next_seq: u64,
    pending: BTreeMap<TimerHandle, T>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, after: Duration, event: T) -> TimerHandle {
        self.schedule_in(Lane::Normal, after, event)
    }

    pub fn schedule_in(&mut self, lane: Lane, after: Duration, event: T) -> TimerHandle {
        let handle = TimerHandle {
            deadline: self.now + after,
            lane,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.pending.insert(handle, event);
        handle
    }

    /// Returns true if the timer was still pending
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove the earliest timer due at or before `until` and move the clock to
    /// its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<T> {
        let handle = *self.pending.keys().next()?;
        if handle.deadline > until {
            return None;
        }
        self.now = self.now.max(handle.deadline);
        self.pending.remove(&handle)
    }

    /// Move the clock forward to `until` once everything due has been popped
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}
