use crate::error::{PomoError, Result};
use crate::timer::Completion;
use crate::types::{Mode, OwnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A completed interval. Append-only: never updated or deleted.
///
/// `duration` is in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub owner: OwnerId,
    pub duration: u32,
    #[serde(rename = "type")]
    pub mode: Mode,
    pub completed_at: DateTime<Utc>,
}

/// Request to record a session, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    /// Seconds. Signed so that bad input reaches validation instead of
    /// failing deserialization with an opaque message.
    pub duration: i64,
    #[serde(rename = "type")]
    pub mode: String,
}

impl NewSession {
    pub fn validate(&self) -> Result<(u32, Mode)> {
        if self.duration <= 0 {
            return Err(PomoError::Validation(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration
            )));
        }
        let duration = u32::try_from(self.duration).map_err(|_| {
            PomoError::Validation(format!("duration {} is out of range", self.duration))
        })?;
        let mode = match self.mode.as_str() {
            "pomodoro" => Mode::Pomodoro,
            "shortBreak" => Mode::ShortBreak,
            "longBreak" => Mode::LongBreak,
            other => {
                return Err(PomoError::Validation(format!(
                    "type must be one of pomodoro, shortBreak, longBreak; got '{other}'"
                )))
            }
        };
        Ok((duration, mode))
    }
}

impl From<&Completion> for NewSession {
    fn from(c: &Completion) -> Self {
        Self {
            duration: i64::from(c.duration_secs),
            mode: c.mode.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// IdempotencyKey
// ---------------------------------------------------------------------------

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Client-chosen token identifying one completed interval across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let valid = !key.is_empty()
            && key.len() <= MAX_IDEMPOTENCY_KEY_LEN
            && key.bytes().all(|b| b.is_ascii_graphic());
        if !valid {
            return Err(PomoError::Validation(format!(
                "idempotency key must be 1-{MAX_IDEMPOTENCY_KEY_LEN} printable ASCII characters"
            )));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for IdempotencyKey {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = PomoError;

    fn try_from(value: String) -> Result<Self> {
        IdempotencyKey::new(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Recorded / Summary
// ---------------------------------------------------------------------------

/// Outcome of a record call. `replayed` is true when the idempotency key had
/// already been used and the original session is returned unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub session: Session,
    pub replayed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub total: usize,
    pub pomodoros: usize,
    pub focus_secs: u64,
    pub break_secs: u64,
}

impl SessionSummary {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut summary = Self {
            total: sessions.len(),
            ..Self::default()
        };
        for s in sessions {
            if s.mode.is_break() {
                summary.break_secs += u64::from(s.duration);
            } else {
                summary.pomodoros += 1;
                summary.focus_secs += u64::from(s.duration);
            }
        }
        summary
    }
}
