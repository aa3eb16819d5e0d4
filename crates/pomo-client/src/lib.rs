//! `pomo-client`: runs the interval timer and gets its completions recorded.
//!
//! # Architecture
//!
//! ```text
//! TimerHandle ── Command ──▶ TimerDriver   ← owns IntervalTimer, 1s ticks
//!      ▲                        │
//!      └── watch<TimerSnapshot> ┤
//!                               │ Completion (unbounded mpsc)
//!                               ▼
//!                          SyncLayer       ← sequential delivery, backoff retry
//!                               │
//!                               ▼
//!                          SessionSink     ← ApiClient (HTTP) or LocalSink (redb)
//! ```
//!
//! The timer never waits on the network. A completion's id is sent as the
//! idempotency key on every attempt, so retries cannot store a session twice.
//!
//! ```rust,ignore
//! use pomo_client::{ApiClient, SyncLayer, TimerDriver, TICK};
//!
//! let api = ApiClient::new("http://localhost:5000", token)?;
//! let mut sync = SyncLayer::spawn(api, config.sync.clone());
//! let timer = TimerDriver::spawn(config.timer.build_timer()?, TICK, sync.submitter());
//! timer.start().await?;
//! ```

pub mod api;
pub mod driver;
pub mod error;
pub mod local;
pub mod sync;

pub use api::ApiClient;
pub use driver::{TimerDriver, TimerHandle, TICK};
pub use error::ClientError;
pub use local::LocalSink;
pub use sync::{SessionSink, SyncLayer, SyncReport, SyncReports};
