use chrono::Utc;
use redb::ReadableTable;
use uuid::Uuid;

use super::{
    db_err, idempotency_key, next_seq, owner_prefix, owner_upper_bound, session_key, Store,
    IDEMPOTENCY, META, SESSIONS, SESSION_SEQ,
};
use crate::error::{PomoError, Result};
use crate::session::{IdempotencyKey, NewSession, Recorded, Session, SessionSummary};
use crate::types::OwnerId;

impl Store {
    /// Append a session for `owner`.
    ///
    /// With an idempotency key, a replayed call returns the session stored by
    /// the first call instead of inserting another one. The key lookup and the
    /// insert share one write transaction.
    pub fn record_session(
        &self,
        owner: &OwnerId,
        new: &NewSession,
        key: Option<&IdempotencyKey>,
    ) -> Result<Recorded> {
        let (duration, mode) = new.validate()?;
        let idem = key.map(|k| idempotency_key(owner, k.as_str()));

        let wt = self.db.begin_write().map_err(db_err)?;
        let recorded = {
            let mut sessions = wt.open_table(SESSIONS).map_err(db_err)?;
            let mut idempotency = wt.open_table(IDEMPOTENCY).map_err(db_err)?;

            if let Some(idem) = &idem {
                let existing = idempotency
                    .get(idem.as_slice())
                    .map_err(db_err)?
                    .map(|g| g.value().to_vec());
                if let Some(session_key) = existing {
                    let raw = sessions
                        .get(session_key.as_slice())
                        .map_err(db_err)?
                        .map(|g| g.value().to_vec())
                        .ok_or_else(|| {
                            PomoError::TransientStore(
                                "idempotency entry points at a missing session".to_string(),
                            )
                        })?;
                    let session: Session = serde_json::from_slice(&raw)?;
                    tracing::info!(owner = %owner, session = %session.id, "idempotent replay");
                    return Ok(Recorded {
                        session,
                        replayed: true,
                    });
                }
            }

            let session = Session {
                id: Uuid::new_v4(),
                owner: owner.clone(),
                duration,
                mode,
                completed_at: Utc::now(),
            };
            let mut meta = wt.open_table(META).map_err(db_err)?;
            let key = session_key(owner, next_seq(&mut meta, SESSION_SEQ)?);
            let value = serde_json::to_vec(&session)?;
            sessions
                .insert(key.as_slice(), value.as_slice())
                .map_err(db_err)?;
            if let Some(idem) = &idem {
                idempotency
                    .insert(idem.as_slice(), key.as_slice())
                    .map_err(db_err)?;
            }
            Recorded {
                session,
                replayed: false,
            }
        };
        wt.commit().map_err(db_err)?;

        tracing::debug!(
            owner = %owner,
            session = %recorded.session.id,
            mode = %recorded.session.mode,
            duration = recorded.session.duration,
            "session recorded"
        );
        Ok(recorded)
    }

    /// Sessions of `owner`, most recently completed first.
    pub fn session_history(&self, owner: &OwnerId) -> Result<Vec<Session>> {
        let lo = owner_prefix(owner);
        let hi = owner_upper_bound(owner);
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(SESSIONS).map_err(db_err)?;

        let mut result = Vec::new();
        for entry in table
            .range(lo.as_slice()..hi.as_slice())
            .map_err(db_err)?
            .rev()
        {
            let (_, v) = entry.map_err(db_err)?;
            let session: Session = serde_json::from_slice(v.value())?;
            result.push(session);
        }
        Ok(result)
    }

    pub fn session_summary(&self, owner: &OwnerId) -> Result<SessionSummary> {
        Ok(SessionSummary::from_sessions(&self.session_history(owner)?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mode;
    use std::sync::Arc;

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn new_session(duration: i64, mode: &str) -> NewSession {
        NewSession {
            duration,
            mode: mode.to_string(),
        }
    }

    #[test]
    fn record_validates_input() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner("alice");
        assert!(matches!(
            store.record_session(&alice, &new_session(0, "pomodoro"), None),
            Err(PomoError::Validation(_))
        ));
        assert!(matches!(
            store.record_session(&alice, &new_session(60, "nap"), None),
            Err(PomoError::Validation(_))
        ));
        assert!(store.session_history(&alice).unwrap().is_empty());
    }

    #[test]
    fn record_returns_session_with_owner_and_type() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner("alice");
        let rec = store
            .record_session(&alice, &new_session(2, "pomodoro"), None)
            .unwrap();
        assert!(!rec.replayed);
        assert_eq!(rec.session.duration, 2);
        assert_eq!(rec.session.mode, Mode::Pomodoro);
        assert_eq!(rec.session.owner, alice);
    }

    #[test]
    fn history_is_newest_first_and_owner_scoped() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner("alice");
        let bob = owner("bob");
        store
            .record_session(&alice, &new_session(1500, "pomodoro"), None)
            .unwrap();
        store
            .record_session(&alice, &new_session(300, "shortBreak"), None)
            .unwrap();
        store
            .record_session(&bob, &new_session(900, "longBreak"), None)
            .unwrap();

        let history = store.session_history(&alice).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].mode, Mode::ShortBreak);
        assert_eq!(history[1].mode, Mode::Pomodoro);
        assert!(history[0].completed_at >= history[1].completed_at);
        assert_eq!(store.session_history(&bob).unwrap().len(), 1);
    }

    #[test]
    fn back_to_back_records_come_back_newest_first() {
        for _ in 0..50 {
            let store = Store::open_in_memory().unwrap();
            let alice = owner("alice");
            for duration in 1..=5 {
                store
                    .record_session(&alice, &new_session(duration, "pomodoro"), None)
                    .unwrap();
            }
            let durations: Vec<u32> = store
                .session_history(&alice)
                .unwrap()
                .iter()
                .map(|s| s.duration)
                .collect();
            assert_eq!(durations, vec![5, 4, 3, 2, 1]);
        }
    }

    #[test]
    fn replay_with_same_key_stores_exactly_one_session() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner("alice");
        let key = IdempotencyKey::new("interval-1").unwrap();

        let first = store
            .record_session(&alice, &new_session(1500, "pomodoro"), Some(&key))
            .unwrap();
        let second = store
            .record_session(&alice, &new_session(1500, "pomodoro"), Some(&key))
            .unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.session, second.session);
        assert_eq!(store.session_history(&alice).unwrap().len(), 1);
    }

    #[test]
    fn idempotency_keys_are_scoped_per_owner() {
        let store = Store::open_in_memory().unwrap();
        let key = IdempotencyKey::new("same-token").unwrap();
        let a = store
            .record_session(&owner("alice"), &new_session(60, "pomodoro"), Some(&key))
            .unwrap();
        let b = store
            .record_session(&owner("bob"), &new_session(60, "pomodoro"), Some(&key))
            .unwrap();
        assert!(!a.replayed);
        assert!(!b.replayed);
        assert_ne!(a.session.id, b.session.id);
    }

    #[test]
    fn concurrent_replays_insert_once() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let alice = owner("alice");
        let key = IdempotencyKey::new("racy").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let alice = alice.clone();
                let key = key.clone();
                std::thread::spawn(move || {
                    store
                        .record_session(&alice, &new_session(1500, "pomodoro"), Some(&key))
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<Recorded> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| !r.replayed).count(), 1);
        let id = results[0].session.id;
        assert!(results.iter().all(|r| r.session.id == id));
        assert_eq!(store.session_history(&alice).unwrap().len(), 1);
    }

    #[test]
    fn summary_reflects_history() {
        let store = Store::open_in_memory().unwrap();
        let alice = owner("alice");
        store
            .record_session(&alice, &new_session(1500, "pomodoro"), None)
            .unwrap();
        store
            .record_session(&alice, &new_session(300, "shortBreak"), None)
            .unwrap();
        let summary = store.session_summary(&alice).unwrap();
        assert_eq!(summary.pomodoros, 1);
        assert_eq!(summary.focus_secs, 1500);
        assert_eq!(summary.break_secs, 300);
    }
}
