use std::time::Duration;

use pomo_core::timer::{Completion, IntervalTimer, TimerSnapshot};
use pomo_core::Mode;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::ClientError;

/// Real-world length of one timer tick.
pub const TICK: Duration = Duration::from_secs(1);

// ─── Command ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    Reset,
    SwitchMode(Mode),
    Reconfigure {
        mode: Mode,
        secs: u32,
        reply: oneshot::Sender<pomo_core::Result<()>>,
    },
    Shutdown,
}

// ─── TimerDriver ──────────────────────────────────────────────────────────

/// Owns an [`IntervalTimer`] on a background task and feeds it ticks.
///
/// Commands and ticks are applied one at a time by the same task, so the
/// timer never sees concurrent mutation. The tick source is only polled while
/// the timer is running; it is reset on every start so the first tick lands
/// one full period later. Each completion is forwarded once to the sync
/// layer's channel.
pub struct TimerDriver;

impl TimerDriver {
    pub fn spawn(
        timer: IntervalTimer,
        period: Duration,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> TimerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(timer.snapshot());
        let task = tokio::spawn(run(timer, period, cmd_rx, state_tx, completions));
        TimerHandle {
            commands: cmd_tx,
            state: state_rx,
            task,
        }
    }
}

async fn run(
    mut timer: IntervalTimer,
    period: Duration,
    mut commands: mpsc::Receiver<Command>,
    state: watch::Sender<TimerSnapshot>,
    completions: mpsc::UnboundedSender<Completion>,
) -> IntervalTimer {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                tracing::debug!(?cmd, "timer command");
                match cmd {
                    Command::Start => {
                        if timer.start() {
                            ticker.reset();
                        }
                    }
                    Command::Pause => {
                        timer.pause();
                    }
                    Command::Reset => timer.reset(),
                    Command::SwitchMode(mode) => timer.switch_mode(mode),
                    Command::Reconfigure { mode, secs, reply } => {
                        let _ = reply.send(timer.reconfigure(mode, secs));
                    }
                    Command::Shutdown => break,
                }
            }

            _ = ticker.tick(), if timer.is_running() => {
                if let Some(completion) = timer.tick() {
                    tracing::info!(
                        completion = %completion.id,
                        mode = %completion.mode,
                        duration = completion.duration_secs,
                        "interval completed"
                    );
                    if completions.send(completion).is_err() {
                        tracing::error!("sync layer is gone; completion not recorded");
                    }
                }
            }
        }
        state.send_replace(timer.snapshot());
    }

    tracing::debug!("timer driver stopped");
    timer
}

// ─── TimerHandle ──────────────────────────────────────────────────────────

/// Control surface for a running [`TimerDriver`].
pub struct TimerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<TimerSnapshot>,
    task: JoinHandle<IntervalTimer>,
}

impl TimerHandle {
    async fn send(&self, cmd: Command) -> Result<(), ClientError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| ClientError::DriverStopped)
    }

    pub async fn start(&self) -> Result<(), ClientError> {
        self.send(Command::Start).await
    }

    pub async fn pause(&self) -> Result<(), ClientError> {
        self.send(Command::Pause).await
    }

    pub async fn reset(&self) -> Result<(), ClientError> {
        self.send(Command::Reset).await
    }

    pub async fn switch_mode(&self, mode: Mode) -> Result<(), ClientError> {
        self.send(Command::SwitchMode(mode)).await
    }

    /// Change the duration for `mode`. Waits for the driver to apply it so a
    /// zero duration comes back as a validation error.
    pub async fn reconfigure(&self, mode: Mode, secs: u32) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reconfigure { mode, secs, reply }).await?;
        rx.await.map_err(|_| ClientError::DriverStopped)??;
        Ok(())
    }

    /// Latest published state.
    pub fn snapshot(&self) -> TimerSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified after every command and tick.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.state.clone()
    }

    /// Stop the driver and get the timer back. An interval in flight is
    /// dropped without a completion.
    pub async fn shutdown(self) -> Result<IntervalTimer, ClientError> {
        let _ = self.commands.send(Command::Shutdown).await;
        self.task
            .await
            .map_err(|e| ClientError::Join(e.to_string()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
