//! Interval timer state machine.
//!
//! ```text
//!            start                 pause
//!   Idle ───────────▶ Running ───────────▶ Paused
//!    ▲                 │   ▲                 │
//!    │   tick hits 0   │   └──── start ──────┘
//!    └── (Completion) ─┘
//!
//!   reset / switch_mode: any state ──▶ Idle
//! ```
//!
//! `Completed` is never observable: the tick that reaches zero emits one
//! [`Completion`] and lands in `Idle` in the same call. The timer never fails
//! and knows nothing about persistence; recording the completion is the sync
//! layer's job.

use crate::cadence::Cadence;
use crate::error::{PomoError, Result};
use crate::types::Mode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// Configured interval length per mode, in seconds. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pomodoro: u32,
    short_break: u32,
    long_break: u32,
}

impl Durations {
    pub fn new(pomodoro: u32, short_break: u32, long_break: u32) -> Result<Self> {
        let mut d = Self::default();
        d.set(Mode::Pomodoro, pomodoro)?;
        d.set(Mode::ShortBreak, short_break)?;
        d.set(Mode::LongBreak, long_break)?;
        Ok(d)
    }

    pub fn get(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Pomodoro => self.pomodoro,
            Mode::ShortBreak => self.short_break,
            Mode::LongBreak => self.long_break,
        }
    }

    pub fn set(&mut self, mode: Mode, secs: u32) -> Result<()> {
        if secs == 0 {
            return Err(PomoError::Validation(format!(
                "{mode} duration must be a positive number of seconds"
            )));
        }
        match mode {
            Mode::Pomodoro => self.pomodoro = secs,
            Mode::ShortBreak => self.short_break = secs,
            Mode::LongBreak => self.long_break = secs,
        }
        Ok(())
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            pomodoro: 25 * 60,
            short_break: 5 * 60,
            long_break: 15 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Status / Completion / Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// A fully elapsed interval, waiting to be recorded as a session.
///
/// `id` doubles as the idempotency token for the session write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub id: Uuid,
    pub mode: Mode,
    pub duration_secs: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub mode: Mode,
    pub remaining_secs: u32,
    pub interval_secs: u32,
    pub durations: Durations,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_pomodoros: Option<u32>,
}

impl TimerSnapshot {
    /// `MM:SS` rendering of the remaining time.
    pub fn clock(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_secs / 60,
            self.remaining_secs % 60
        )
    }
}

// ---------------------------------------------------------------------------
// IntervalTimer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IntervalTimer {
    mode: Mode,
    status: TimerStatus,
    remaining: u32,
    /// Length of the armed interval. Fixed until the timer is re-armed, so a
    /// reconfigure during a run never truncates it.
    interval: u32,
    durations: Durations,
    cadence: Option<Cadence>,
}

impl IntervalTimer {
    pub fn new(durations: Durations) -> Self {
        let interval = durations.get(Mode::Pomodoro);
        Self {
            mode: Mode::Pomodoro,
            status: TimerStatus::Idle,
            remaining: interval,
            interval,
            durations,
            cadence: None,
        }
    }

    /// Enable auto-advance between focus and break modes on completion.
    pub fn with_cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = Some(cadence);
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining
    }

    pub fn interval_secs(&self) -> u32 {
        self.interval
    }

    pub fn durations(&self) -> Durations {
        self.durations
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            status: self.status,
            mode: self.mode,
            remaining_secs: self.remaining,
            interval_secs: self.interval,
            durations: self.durations,
            completed_pomodoros: self.cadence.as_ref().map(Cadence::completed_pomodoros),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// `Idle | Paused → Running`. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.status = TimerStatus::Running;
        true
    }

    /// `Running → Paused`, preserving the remaining time. No-op otherwise.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = TimerStatus::Paused;
        true
    }

    /// Back to `Idle` for the current mode with a full interval. Not a completion.
    pub fn reset(&mut self) {
        self.status = TimerStatus::Idle;
        self.arm();
    }

    /// Advance one elapsed second. Returns the completion when this tick
    /// finishes the interval; the timer is already `Idle` again by then.
    pub fn tick(&mut self) -> Option<Completion> {
        if !self.is_running() {
            return None;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return None;
        }
        Some(self.complete())
    }

    /// Select `mode` and drop any in-flight interval without recording it.
    pub fn switch_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.status = TimerStatus::Idle;
        self.arm();
    }

    /// Change the configured duration for `mode`.
    ///
    /// Applies immediately when the timer is idle or paused in that mode; a
    /// running interval keeps its length and the new value arms the next one.
    pub fn reconfigure(&mut self, mode: Mode, secs: u32) -> Result<()> {
        self.durations.set(mode, secs)?;
        if mode == self.mode && !self.is_running() {
            self.arm();
        }
        Ok(())
    }

    fn complete(&mut self) -> Completion {
        let completion = Completion {
            id: Uuid::new_v4(),
            mode: self.mode,
            duration_secs: self.interval,
            completed_at: Utc::now(),
        };
        if let Some(cadence) = self.cadence.as_mut() {
            self.mode = cadence.advance(completion.mode);
        }
        self.status = TimerStatus::Idle;
        self.arm();
        completion
    }

    fn arm(&mut self) {
        self.interval = self.durations.get(self.mode);
        self.remaining = self.interval;
    }
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new(Durations::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn timer_with_pomodoro(secs: u32) -> IntervalTimer {
        IntervalTimer::new(Durations::new(secs, 5, 15).unwrap())
    }

    #[test]
    fn initial_state_is_idle_pomodoro_with_full_interval() {
        let timer = IntervalTimer::default();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.mode(), Mode::Pomodoro);
        assert_eq!(timer.remaining_secs(), 25 * 60);
    }

    #[test]
    fn two_second_pomodoro_completes_once_after_two_ticks() {
        let mut timer = timer_with_pomodoro(2);
        assert!(timer.start());

        assert!(timer.tick().is_none());
        assert_eq!(timer.status(), TimerStatus::Running);
        assert_eq!(timer.remaining_secs(), 1);

        let done = timer.tick().expect("second tick completes the interval");
        assert_eq!(done.mode, Mode::Pomodoro);
        assert_eq!(done.duration_secs, 2);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_secs(), 2);
    }

    #[test]
    fn ticks_after_completion_emit_nothing_until_restart() {
        let mut timer = timer_with_pomodoro(1);
        timer.start();
        assert!(timer.tick().is_some());
        for _ in 0..10 {
            assert!(timer.tick().is_none());
        }
        assert_eq!(timer.remaining_secs(), 1);

        timer.start();
        let again = timer.tick().unwrap();
        assert_eq!(again.duration_secs, 1);
    }

    #[test]
    fn completions_carry_distinct_ids() {
        let mut timer = timer_with_pomodoro(1);
        timer.start();
        let a = timer.tick().unwrap();
        timer.start();
        let b = timer.tick().unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn start_pause_reset_records_nothing_and_restores_interval() {
        let mut timer = timer_with_pomodoro(60);
        timer.start();
        assert!(timer.tick().is_none());
        assert!(timer.tick().is_none());
        assert!(timer.pause());
        assert_eq!(timer.remaining_secs(), 58);
        timer.reset();
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_secs(), 60);
    }

    #[test]
    fn pause_preserves_remaining_and_ignores_ticks() {
        let mut timer = timer_with_pomodoro(10);
        timer.start();
        timer.tick();
        timer.tick();
        timer.pause();
        for _ in 0..20 {
            assert!(timer.tick().is_none());
        }
        assert_eq!(timer.remaining_secs(), 8);
        assert!(timer.start());
        timer.tick();
        assert_eq!(timer.remaining_secs(), 7);
    }

    #[test]
    fn start_while_running_and_pause_while_idle_are_noops() {
        let mut timer = timer_with_pomodoro(10);
        assert!(!timer.pause());
        assert!(timer.start());
        assert!(!timer.start());
        assert_eq!(timer.status(), TimerStatus::Running);
    }

    #[test]
    fn switch_mode_while_running_discards_interval() {
        let mut timer = timer_with_pomodoro(3);
        timer.start();
        timer.tick();
        timer.switch_mode(Mode::ShortBreak);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.mode(), Mode::ShortBreak);
        assert_eq!(timer.remaining_secs(), 5);
        // Nothing ticks in idle, so the discarded focus interval never completes.
        for _ in 0..5 {
            assert!(timer.tick().is_none());
        }
    }

    #[test]
    fn reconfigure_while_running_keeps_current_interval() {
        let mut timer = timer_with_pomodoro(3);
        timer.start();
        timer.tick();
        timer.reconfigure(Mode::Pomodoro, 100).unwrap();
        assert_eq!(timer.remaining_secs(), 2);
        assert!(timer.tick().is_none());
        let done = timer.tick().unwrap();
        assert_eq!(done.duration_secs, 3);
        // Next interval uses the new length.
        assert_eq!(timer.remaining_secs(), 100);
    }

    #[test]
    fn reconfigure_shorter_while_running_does_not_truncate() {
        let mut timer = timer_with_pomodoro(5);
        timer.start();
        timer.reconfigure(Mode::Pomodoro, 1).unwrap();
        for _ in 0..4 {
            assert!(timer.tick().is_none());
        }
        assert_eq!(timer.tick().unwrap().duration_secs, 5);
        assert_eq!(timer.remaining_secs(), 1);
    }

    #[test]
    fn reconfigure_when_paused_or_idle_applies_immediately() {
        let mut timer = timer_with_pomodoro(10);
        timer.reconfigure(Mode::Pomodoro, 20).unwrap();
        assert_eq!(timer.remaining_secs(), 20);

        timer.start();
        timer.tick();
        timer.pause();
        timer.reconfigure(Mode::Pomodoro, 30).unwrap();
        assert_eq!(timer.remaining_secs(), 30);
        assert_eq!(timer.status(), TimerStatus::Paused);
    }

    #[test]
    fn reconfigure_other_mode_leaves_current_alone() {
        let mut timer = timer_with_pomodoro(10);
        timer.reconfigure(Mode::LongBreak, 99).unwrap();
        assert_eq!(timer.remaining_secs(), 10);
        assert_eq!(timer.durations().get(Mode::LongBreak), 99);
    }

    #[test]
    fn reconfigure_rejects_zero() {
        let mut timer = IntervalTimer::default();
        assert!(matches!(
            timer.reconfigure(Mode::ShortBreak, 0),
            Err(PomoError::Validation(_))
        ));
    }

    #[test]
    fn cadence_advances_mode_after_completion() {
        let mut timer = IntervalTimer::new(Durations::new(1, 2, 3).unwrap())
            .with_cadence(Cadence::new(2));

        timer.start();
        assert_eq!(timer.tick().unwrap().mode, Mode::Pomodoro);
        assert_eq!(timer.mode(), Mode::ShortBreak);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.remaining_secs(), 2);

        timer.start();
        timer.tick();
        assert_eq!(timer.tick().unwrap().mode, Mode::ShortBreak);
        assert_eq!(timer.mode(), Mode::Pomodoro);

        timer.start();
        timer.tick();
        assert_eq!(timer.mode(), Mode::LongBreak);
        assert_eq!(timer.snapshot().completed_pomodoros, Some(2));
    }

    #[test]
    fn remaining_stays_within_bounds_under_random_commands() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut timer = timer_with_pomodoro(4);
        let mut completions = 0;
        for _ in 0..5_000 {
            match rng.gen_range(0..5) {
                0 => {
                    timer.start();
                }
                1 => {
                    timer.pause();
                }
                2 => timer.reset(),
                _ => {
                    if timer.tick().is_some() {
                        completions += 1;
                    }
                }
            }
            assert!(timer.remaining_secs() > 0);
            assert!(timer.remaining_secs() <= timer.durations().get(timer.mode()));
        }
        assert!(completions > 0);
    }

    #[test]
    fn snapshot_clock_formats_minutes_and_seconds() {
        let timer = IntervalTimer::default();
        assert_eq!(timer.snapshot().clock(), "25:00");
    }
}
