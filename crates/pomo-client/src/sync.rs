use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use pomo_core::config::SyncConfig;
use pomo_core::session::Recorded;
use pomo_core::timer::Completion;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ClientError;

// ─── SessionSink ──────────────────────────────────────────────────────────

/// Durable destination for completed intervals.
///
/// Implementations must treat `completion.id` as an idempotency token: calling
/// `record` twice with the same completion stores one session.
pub trait SessionSink: Send + Sync + 'static {
    fn record(
        &self,
        completion: &Completion,
    ) -> impl Future<Output = Result<Recorded, ClientError>> + Send;
}

// ─── SyncReport ───────────────────────────────────────────────────────────

/// Out-of-band outcome of a durable write, for the user-facing surface.
#[derive(Debug, Clone)]
pub enum SyncReport {
    Recorded {
        completion: Uuid,
        session: Uuid,
        replayed: bool,
    },
    /// A transient failure; the write will be retried after `retry_in`.
    Retrying {
        completion: Uuid,
        attempt: u32,
        retry_in: Duration,
        error: String,
    },
    /// Gave up. The completion is handed back so it can be resubmitted.
    Failed {
        completion: Completion,
        error: String,
    },
}

// ─── SyncLayer ────────────────────────────────────────────────────────────

/// Background task that records completions through a [`SessionSink`].
///
/// Completions are delivered in order, one at a time. Transient failures are
/// retried with exponential backoff using the same idempotency token, so a
/// write that succeeded server-side but lost its response is not duplicated.
pub struct SyncLayer {
    completions: mpsc::UnboundedSender<Completion>,
    reports: SyncReports,
    task: JoinHandle<()>,
}

impl SyncLayer {
    pub fn spawn<S: SessionSink>(sink: S, policy: SyncConfig) -> Self {
        let (completions, mut rx) = mpsc::unbounded_channel::<Completion>();
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(completion) = rx.recv().await {
                deliver(&sink, &policy, completion, &report_tx).await;
            }
        });

        Self {
            completions,
            reports: SyncReports { rx: report_rx },
            task,
        }
    }

    /// Sender handed to the timer driver.
    pub fn submitter(&self) -> mpsc::UnboundedSender<Completion> {
        self.completions.clone()
    }

    /// Queue a completion again, typically one returned by `SyncReport::Failed`.
    pub fn resubmit(&self, completion: Completion) {
        if self.completions.send(completion).is_err() {
            tracing::error!("sync layer stopped; completion dropped on resubmit");
        }
    }

    pub fn reports(&mut self) -> &mut SyncReports {
        &mut self.reports
    }

    /// Stop accepting completions, wait for queued ones to finish (including
    /// retries) and return the reports not yet consumed.
    ///
    /// Every other submitter must be dropped first or this waits forever.
    pub async fn finish(self) -> Vec<SyncReport> {
        let Self {
            completions,
            mut reports,
            task,
        } = self;
        drop(completions);
        if let Err(e) = task.await {
            tracing::error!(error = %e, "sync task panicked");
        }
        let mut rest = Vec::new();
        while let Ok(report) = reports.rx.try_recv() {
            rest.push(report);
        }
        rest
    }
}

async fn deliver<S: SessionSink>(
    sink: &S,
    policy: &SyncConfig,
    completion: Completion,
    reports: &mpsc::UnboundedSender<SyncReport>,
) {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match sink.record(&completion).await {
            Ok(recorded) => {
                tracing::info!(
                    completion = %completion.id,
                    session = %recorded.session.id,
                    replayed = recorded.replayed,
                    "session recorded"
                );
                let _ = reports.send(SyncReport::Recorded {
                    completion: completion.id,
                    session: recorded.session.id,
                    replayed: recorded.replayed,
                });
                return;
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let retry_in = policy.backoff(attempt);
                tracing::warn!(
                    completion = %completion.id,
                    attempt,
                    error = %e,
                    "session write failed; retrying in {retry_in:?}"
                );
                let _ = reports.send(SyncReport::Retrying {
                    completion: completion.id,
                    attempt,
                    retry_in,
                    error: e.to_string(),
                });
                tokio::time::sleep(retry_in).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    completion = %completion.id,
                    attempt,
                    error = %e,
                    "session write failed; giving up"
                );
                let _ = reports.send(SyncReport::Failed {
                    completion,
                    error: e.to_string(),
                });
                return;
            }
        }
    }
}

// ─── SyncReports ──────────────────────────────────────────────────────────

/// Stream of [`SyncReport`]s, backed by the sync task's channel. Consume it
/// with [`futures::StreamExt`].
pub struct SyncReports {
    rx: mpsc::UnboundedReceiver<SyncReport>,
}

impl Stream for SyncReports {
    type Item = SyncReport;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;
    use pomo_core::session::{IdempotencyKey, NewSession};
    use pomo_core::types::{Mode, OwnerId};
    use pomo_core::{PomoError, Store};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Store-backed sink that fails the first `fail_first` calls. With
    /// `lose_response`, a failing call still writes before reporting the
    /// error, like a server that committed but whose reply never arrived.
    struct FlakySink {
        store: Arc<Store>,
        owner: OwnerId,
        fail_first: u32,
        lose_response: bool,
        calls: AtomicU32,
    }

    impl FlakySink {
        fn new(fail_first: u32, lose_response: bool) -> Self {
            Self {
                store: Arc::new(Store::open_in_memory().unwrap()),
                owner: OwnerId::new("alice").unwrap(),
                fail_first,
                lose_response,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl SessionSink for Arc<FlakySink> {
        async fn record(&self, completion: &Completion) -> Result<Recorded, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let key = IdempotencyKey::from(completion.id);
            if n < self.fail_first {
                if self.lose_response {
                    self.store
                        .record_session(&self.owner, &NewSession::from(completion), Some(&key))?;
                }
                return Err(PomoError::TransientStore("disk busy".into()).into());
            }
            Ok(self
                .store
                .record_session(&self.owner, &NewSession::from(completion), Some(&key))?)
        }
    }

    fn completion(secs: u32) -> Completion {
        Completion {
            id: Uuid::new_v4(),
            mode: Mode::Pomodoro,
            duration_secs: secs,
            completed_at: Utc::now(),
        }
    }

    fn fast_policy(max_attempts: u32) -> SyncConfig {
        SyncConfig {
            max_attempts,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn records_on_first_try() {
        let sink = Arc::new(FlakySink::new(0, false));
        let mut sync = SyncLayer::spawn(Arc::clone(&sink), fast_policy(3));
        let c = completion(1500);
        sync.submitter().send(c.clone()).unwrap();

        match sync.reports().next().await.unwrap() {
            SyncReport::Recorded {
                completion,
                replayed,
                ..
            } => {
                assert_eq!(completion, c.id);
                assert!(!replayed);
            }
            other => panic!("expected Recorded, got {other:?}"),
        }
        assert_eq!(sink.store.session_history(&sink.owner).unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_lost_response_stores_exactly_one_session() {
        let sink = Arc::new(FlakySink::new(2, true));
        let mut sync = SyncLayer::spawn(Arc::clone(&sink), fast_policy(5));
        sync.submitter().send(completion(2)).unwrap();

        let mut retries = 0;
        loop {
            match sync.reports().next().await.unwrap() {
                SyncReport::Retrying { attempt, .. } => {
                    retries += 1;
                    assert_eq!(attempt, retries);
                }
                SyncReport::Recorded { replayed, .. } => {
                    assert!(replayed);
                    break;
                }
                SyncReport::Failed { error, .. } => panic!("unexpected failure: {error}"),
            }
        }
        assert_eq!(retries, 2);
        let history = sink.store.session_history(&sink.owner).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].duration, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_the_completion() {
        let sink = Arc::new(FlakySink::new(10, false));
        let mut sync = SyncLayer::spawn(Arc::clone(&sink), fast_policy(3));
        let c = completion(60);
        sync.submitter().send(c.clone()).unwrap();

        let mut failed = None;
        while let Some(report) = sync.reports().next().await {
            if let SyncReport::Failed { completion, .. } = report {
                failed = Some(completion);
                break;
            }
        }
        assert_eq!(failed.unwrap(), c);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert!(sink.store.session_history(&sink.owner).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reports_stream_follows_submission_order() {
        let sink = Arc::new(FlakySink::new(1, false));
        let mut sync = SyncLayer::spawn(Arc::clone(&sink), fast_policy(3));
        let first = completion(1);
        let second = completion(2);
        sync.submitter().send(first.clone()).unwrap();
        sync.submitter().send(second.clone()).unwrap();

        let reports: Vec<SyncReport> = sync.reports().take(3).collect().await;
        assert!(
            matches!(reports[0], SyncReport::Retrying { attempt: 1, .. }),
            "got {reports:?}"
        );
        let recorded: Vec<Uuid> = reports[1..]
            .iter()
            .filter_map(|r| match r {
                SyncReport::Recorded { completion, .. } => Some(*completion),
                _ => None,
            })
            .collect();
        assert_eq!(recorded, vec![first.id, second.id]);
        assert_eq!(sink.store.session_history(&sink.owner).unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_errors_are_not_retried() {
        struct Rejecting(AtomicU32);
        impl SessionSink for Arc<Rejecting> {
            async fn record(&self, _: &Completion) -> Result<Recorded, ClientError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::Unauthenticated)
            }
        }

        let sink = Arc::new(Rejecting(AtomicU32::new(0)));
        let sync = SyncLayer::spawn(Arc::clone(&sink), fast_policy(5));
        sync.submitter().send(completion(60)).unwrap();
        let reports = sync.finish().await;

        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert!(matches!(reports.as_slice(), [SyncReport::Failed { .. }]));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_drains_queued_completions_in_order() {
        let sink = Arc::new(FlakySink::new(0, false));
        let sync = SyncLayer::spawn(Arc::clone(&sink), fast_policy(3));
        let ids: Vec<Uuid> = (1..=3)
            .map(|n| {
                let c = completion(n);
                sync.submitter().send(c.clone()).unwrap();
                c.id
            })
            .collect();

        let reports = sync.finish().await;
        let recorded: Vec<Uuid> = reports
            .into_iter()
            .filter_map(|r| match r {
                SyncReport::Recorded { completion, .. } => Some(completion),
                _ => None,
            })
            .collect();
        assert_eq!(recorded, ids);
    }
}
