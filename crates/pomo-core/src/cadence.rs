//! Optional auto-advance policy layered on top of the interval timer.
//!
//! After a focus interval the timer moves to a short break, except every
//! `long_break_interval`-th focus interval which earns a long break. Any
//! break moves back to focus.

use crate::types::Mode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LONG_BREAK_INTERVAL: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    long_break_interval: u32,
    completed_pomodoros: u32,
}

impl Cadence {
    /// An interval of zero is treated as one (every pomodoro earns a long break).
    pub fn new(long_break_interval: u32) -> Self {
        Self {
            long_break_interval: long_break_interval.max(1),
            completed_pomodoros: 0,
        }
    }

    pub fn long_break_interval(&self) -> u32 {
        self.long_break_interval
    }

    pub fn completed_pomodoros(&self) -> u32 {
        self.completed_pomodoros
    }

    /// Record a completed interval of `completed` and return the mode to arm next.
    pub fn advance(&mut self, completed: Mode) -> Mode {
        match completed {
            Mode::Pomodoro => {
                self.completed_pomodoros = self.completed_pomodoros.saturating_add(1);
                if self.completed_pomodoros % self.long_break_interval == 0 {
                    Mode::LongBreak
                } else {
                    Mode::ShortBreak
                }
            }
            Mode::ShortBreak | Mode::LongBreak => Mode::Pomodoro,
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::new(DEFAULT_LONG_BREAK_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fourth_pomodoro_earns_long_break() {
        let mut cadence = Cadence::default();
        let mut breaks = Vec::new();
        for _ in 0..8 {
            breaks.push(cadence.advance(Mode::Pomodoro));
        }
        assert_eq!(
            breaks,
            vec![
                Mode::ShortBreak,
                Mode::ShortBreak,
                Mode::ShortBreak,
                Mode::LongBreak,
                Mode::ShortBreak,
                Mode::ShortBreak,
                Mode::ShortBreak,
                Mode::LongBreak,
            ]
        );
        assert_eq!(cadence.completed_pomodoros(), 8);
    }

    #[test]
    fn breaks_return_to_focus_without_counting() {
        let mut cadence = Cadence::new(2);
        assert_eq!(cadence.advance(Mode::ShortBreak), Mode::Pomodoro);
        assert_eq!(cadence.advance(Mode::LongBreak), Mode::Pomodoro);
        assert_eq!(cadence.completed_pomodoros(), 0);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let mut cadence = Cadence::new(0);
        assert_eq!(cadence.long_break_interval(), 1);
        assert_eq!(cadence.advance(Mode::Pomodoro), Mode::LongBreak);
    }
}
