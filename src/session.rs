use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::autoplay::{AutoplayDriver, AutoplayStep};
use crate::clock::Clock;
use crate::layout::{self, Board, Token, Visibility};
use crate::timers::{Lane, TimerHandle, TimerQueue};

/// How long a correctly clicked token stays `Fading` before it is hidden
pub const FADE_MS: u64 = 1000;
/// Quiet period before a resize is applied
pub const RESIZE_SETTLE_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    Ready,
    Running,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Phases in which the board may be reshuffled
    pub fn allows_relayout(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Ready)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot configure a round while {0}")]
    Busy(Phase),
}

/// What a click did to the round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Stale or out-of-phase click, nothing changed
    Ignored,
    Accepted,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    ClockTick,
    AutoplayTick,
    Fade { round: u64, id: u32 },
    ResizeSettled,
}

/// Read-only view handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub tokens: Vec<Token>,
    pub next_expected: u32,
    pub elapsed: f64,
    pub total_tokens: u32,
    pub autoplay: bool,
    pub round: u64,
}

impl Snapshot {
    /// Tokens not yet clicked
    pub fn remaining(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_visible()).count()
    }
}

/// The round state machine.
///
/// Every input (clicks, resizes, restarts and timer firings) is applied to
/// completion before the next one is looked at. Timers live in a virtual-time
/// queue that only moves on [`GameSession::advance`].
#[derive(Debug)]
pub struct GameSession {
    board: Board,
    pending_board: Option<Board>,
    total_tokens: u32,
    tokens: Vec<Token>,
    next_expected: u32,
    phase: Phase,
    clock: Clock,
    clock_timer: Option<TimerHandle>,
    resize_timer: Option<TimerHandle>,
    autoplay: AutoplayDriver,
    autoplay_assisted: bool,
    round: u64,
    timers: TimerQueue<Timer>,
    rng: StdRng,
}

impl GameSession {
    pub fn new(board: Board) -> Self {
        Self::with_rng(board, StdRng::from_entropy())
    }

    /// Reproducible layouts for a given seed
    pub fn with_seed(board: Board, seed: u64) -> Self {
        Self::with_rng(board, StdRng::seed_from_u64(seed))
    }

    fn with_rng(board: Board, rng: StdRng) -> Self {
        Self {
            board,
            pending_board: None,
            total_tokens: 0,
            tokens: Vec::new(),
            next_expected: 1,
            phase: Phase::Idle,
            clock: Clock::new(),
            clock_timer: None,
            resize_timer: None,
            autoplay: AutoplayDriver::new(),
            autoplay_assisted: false,
            round: 0,
            timers: TimerQueue::new(),
            rng,
        }
    }

    /// Set the token count and lay out a fresh round. Only from `idle` or a
    /// finished round.
    pub fn configure(&mut self, count: u32) -> Result<(), SessionError> {
        if matches!(self.phase, Phase::Ready | Phase::Running) {
            return Err(SessionError::Busy(self.phase));
        }

        if count == 0 {
            warn!("token count 0 clamped to 1");
        }
        self.total_tokens = count.max(1);
        self.new_round();
        info!(total = self.total_tokens, "configured round");
        Ok(())
    }

    /// Lay out the current token count again from scratch. Valid in every
    /// phase; autoplay has to be re-armed afterwards.
    pub fn restart(&mut self) {
        self.autoplay.disarm(&mut self.timers);
        if self.total_tokens == 0 {
            warn!("restart before configure, using a single token");
            self.total_tokens = 1;
        }
        self.new_round();
        info!(round = self.round, total = self.total_tokens, "restarted");
    }

    fn new_round(&mut self) {
        // stale fades carry the old round number and are dropped when they fire
        self.round += 1;
        self.stop_clock();
        self.clock.reset();
        self.autoplay_assisted = false;
        self.next_expected = 1;
        self.tokens = layout::generate(self.total_tokens, &self.board, &mut self.rng);
        self.phase = Phase::Ready;
    }

    pub fn click(&mut self, id: u32) -> ClickOutcome {
        if !matches!(self.phase, Phase::Ready | Phase::Running) {
            debug!(id, phase = %self.phase, "click ignored");
            return ClickOutcome::Ignored;
        }
        let Some(idx) = self.tokens.iter().position(|t| t.id == id) else {
            debug!(id, "click on unknown token ignored");
            return ClickOutcome::Ignored;
        };

        if self.phase == Phase::Ready {
            self.phase = Phase::Running;
            self.start_clock();
            info!(round = self.round, "round started");
        }

        if !self.tokens[idx].is_visible() {
            debug!(id, visibility = %self.tokens[idx].visibility, "stale click");
            return ClickOutcome::Ignored;
        }

        if id != self.next_expected {
            info!(id, expected = self.next_expected, "wrong token, round lost");
            self.finish(Phase::Failed);
            return ClickOutcome::Failed;
        }

        self.tokens[idx].visibility = Visibility::Fading;
        self.timers.schedule(
            Duration::from_millis(FADE_MS),
            Timer::Fade {
                round: self.round,
                id,
            },
        );

        if id == self.total_tokens {
            self.finish(Phase::Completed);
            info!(elapsed = self.clock.elapsed_secs(), "all cleared");
            return ClickOutcome::Completed;
        }

        self.next_expected += 1;
        self.autoplay.schedule(&mut self.timers, Timer::AutoplayTick);
        debug!(id, next = self.next_expected, "click accepted");
        ClickOutcome::Accepted
    }

    /// Record a new canvas size. The relayout is debounced and only happens if
    /// the round has not started when the resize settles.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_board = Some(self.board.resized(width, height));
        if let Some(handle) = self.resize_timer.take() {
            self.timers.cancel(handle);
        }
        self.resize_timer = Some(self.timers.schedule(
            Duration::from_millis(RESIZE_SETTLE_MS),
            Timer::ResizeSettled,
        ));
    }

    pub fn arm_autoplay(&mut self) {
        self.autoplay.arm();
        if self.phase == Phase::Running {
            self.autoplay.schedule(&mut self.timers, Timer::AutoplayTick);
        }
        debug!(phase = %self.phase, "autoplay armed");
    }

    pub fn disarm_autoplay(&mut self) {
        self.autoplay.disarm(&mut self.timers);
        debug!("autoplay disarmed");
    }

    pub fn toggle_autoplay(&mut self) {
        if self.autoplay.is_armed() {
            self.disarm_autoplay();
        } else {
            self.arm_autoplay();
        }
    }

    /// Move virtual time forward, firing every timer that falls due on the way
    pub fn advance(&mut self, dt: Duration) {
        let until = self.timers.now() + dt;
        while let Some(timer) = self.timers.pop_due(until) {
            self.fire(timer);
        }
        self.timers.settle(until);
    }

    fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::ClockTick => {
                self.clock_timer = None;
                if self.phase == Phase::Running {
                    self.clock.tick();
                    self.schedule_clock_tick();
                }
            }
            Timer::AutoplayTick => {
                if self.phase != Phase::Running {
                    self.autoplay.disarm(&mut self.timers);
                    return;
                }
                match self.autoplay.on_tick(self.next_expected, &self.tokens) {
                    AutoplayStep::Click(id) => {
                        self.autoplay_assisted = true;
                        self.click(id);
                    }
                    AutoplayStep::Desync => {
                        warn!(
                            expected = self.next_expected,
                            "autoplay lost track of the expected token"
                        );
                        self.autoplay.disarm(&mut self.timers);
                    }
                    AutoplayStep::Idle => {}
                }
            }
            Timer::Fade { round, id } => {
                if round != self.round {
                    debug!(round, id, "dropping fade from an earlier round");
                    return;
                }
                if let Some(token) = self
                    .tokens
                    .iter_mut()
                    .find(|t| t.id == id && t.visibility == Visibility::Fading)
                {
                    token.visibility = Visibility::Hidden;
                }
            }
            Timer::ResizeSettled => {
                self.resize_timer = None;
                let Some(board) = self.pending_board.take() else {
                    return;
                };
                self.board = board;
                if self.phase.allows_relayout() && self.total_tokens > 0 {
                    self.tokens =
                        layout::generate(self.total_tokens, &self.board, &mut self.rng);
                    debug!(
                        width = board.width,
                        height = board.height,
                        "relayout after resize"
                    );
                }
            }
        }
    }

    fn start_clock(&mut self) {
        self.clock.start();
        self.schedule_clock_tick();
    }

    // the clock counts a step before any other timer due at the same instant
    fn schedule_clock_tick(&mut self) {
        self.clock_timer = Some(self.timers.schedule_in(
            Lane::Early,
            Clock::interval(),
            Timer::ClockTick,
        ));
    }

    fn stop_clock(&mut self) {
        self.clock.stop();
        if let Some(handle) = self.clock_timer.take() {
            self.timers.cancel(handle);
        }
    }

    fn finish(&mut self, phase: Phase) {
        self.stop_clock();
        self.phase = phase;
        self.autoplay.disarm(&mut self.timers);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }

    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed_secs()
    }

    pub fn total_tokens(&self) -> u32 {
        self.total_tokens
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn autoplay_armed(&self) -> bool {
        self.autoplay.is_armed()
    }

    /// Whether autoplay clicked anything this round
    pub fn autoplay_assisted(&self) -> bool {
        self.autoplay_assisted
    }

    /// Virtual time consumed so far
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn hit_test(&self, x: i32, y: i32) -> Option<u32> {
        layout::hit_test(&self.tokens, self.board.geometry.token_size, x, y)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            tokens: self.tokens.clone(),
            next_expected: self.next_expected,
            elapsed: self.elapsed(),
            total_tokens: self.total_tokens,
            autoplay: self.autoplay.is_armed(),
            round: self.round,
        }
    }
}
