use crate::backend::{open_local, require_token, runtime};
use crate::output::format_secs;
use anyhow::Context;
use futures::StreamExt;
use pomo_client::{
    ApiClient, LocalSink, SessionSink, SyncLayer, SyncReport, TimerDriver, TimerHandle, TICK,
};
use pomo_core::config::{Config, SyncConfig};
use pomo_core::timer::{Completion, IntervalTimer, TimerSnapshot, TimerStatus};
use pomo_core::Mode;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct TimerArgs<'a> {
    pub token: Option<&'a str>,
    pub server: Option<&'a str>,
    pub mode: Option<Mode>,
    pub once: bool,
}

pub fn run(root: &Path, args: TimerArgs<'_>) -> anyhow::Result<()> {
    let token = require_token(args.token)?;
    let config = Config::load_or_default(root).context("failed to load config")?;
    let mut timer = config
        .timer
        .build_timer()
        .context("invalid timer settings in config.yaml")?;
    if let Some(mode) = args.mode {
        timer.switch_mode(mode);
    }

    let rt = runtime()?;
    let result = match args.server {
        Some(url) => {
            let api = ApiClient::new(url, token).context("failed to build HTTP client")?;
            rt.block_on(drive(timer, api, config.sync, args.once))
        }
        None => {
            let (store, owner) = open_local(root, token)?;
            rt.block_on(drive(timer, LocalSink::new(store, owner), config.sync, args.once))
        }
    };
    // A stdin read may still be parked on a blocking thread.
    rt.shutdown_background();
    result
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Start,
    Pause,
    Reset,
    Switch(Mode),
    Reconfigure(Mode, u32),
    Retry,
    Help,
    Quit,
    Nothing,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(Input::Nothing);
    };
    let mode = |w: Option<&str>| -> Result<Mode, String> {
        w.ok_or_else(|| "missing mode (pomodoro, shortBreak, longBreak)".to_string())?
            .parse::<Mode>()
            .map_err(|e| e.to_string())
    };
    let input = match cmd {
        "s" | "start" => Input::Start,
        "p" | "pause" => Input::Pause,
        "r" | "reset" => Input::Reset,
        "m" | "mode" => Input::Switch(mode(words.next())?),
        "c" | "config" => {
            let mode = mode(words.next())?;
            let secs = words
                .next()
                .ok_or("missing seconds")?
                .parse::<u32>()
                .map_err(|_| "seconds must be a positive whole number".to_string())?;
            Input::Reconfigure(mode, secs)
        }
        "retry" => Input::Retry,
        "h" | "?" | "help" => Input::Help,
        "q" | "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command '{other}' (h for help)")),
    };
    if words.next().is_some() {
        return Err(format!("too many arguments for '{cmd}'"));
    }
    Ok(input)
}

const HELP: &str = "\
commands:
  s                 start / resume
  p                 pause
  r                 reset the current interval
  m <mode>          switch to pomodoro | shortBreak | longBreak
  c <mode> <secs>   set the duration of a mode
  retry             resubmit sessions that could not be logged
  q                 quit";

// ---------------------------------------------------------------------------
// Driver loop
// ---------------------------------------------------------------------------

async fn drive<S: SessionSink>(
    timer: IntervalTimer,
    sink: S,
    policy: SyncConfig,
    once: bool,
) -> anyhow::Result<()> {
    let mut sync = SyncLayer::spawn(sink, policy);
    let handle = TimerDriver::spawn(timer, TICK, sync.submitter());
    let mut state = handle.subscribe();
    let mut unsynced: Vec<Completion> = Vec::new();

    if once {
        handle.start().await?;
    } else {
        println!("{HELP}\n");
    }
    render(&handle.snapshot());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = !once;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("failed to read stdin")? else {
                    stdin_open = false;
                    if handle.snapshot().status == TimerStatus::Running {
                        continue;
                    }
                    break;
                };
                match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => apply(&handle, &sync, &mut unsynced, input).await?,
                    Err(msg) => println!("{msg}"),
                }
            }

            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = state.borrow_and_update().clone();
                render(&snap);
            }

            Some(report) = sync.reports().next() => {
                let terminal = show_report(report, &mut unsynced);
                if terminal && (once || !stdin_open) {
                    break;
                }
            }
        }
    }

    println!();
    handle.shutdown().await?;
    for report in sync.finish().await {
        show_report(report, &mut unsynced);
    }
    if !unsynced.is_empty() {
        anyhow::bail!(
            "{} completed interval(s) could not be logged",
            unsynced.len()
        );
    }
    Ok(())
}

async fn apply(
    handle: &TimerHandle,
    sync: &SyncLayer,
    unsynced: &mut Vec<Completion>,
    input: Input,
) -> anyhow::Result<()> {
    match input {
        Input::Start => handle.start().await?,
        Input::Pause => handle.pause().await?,
        Input::Reset => handle.reset().await?,
        Input::Switch(mode) => handle.switch_mode(mode).await?,
        Input::Reconfigure(mode, secs) => {
            if let Err(e) = handle.reconfigure(mode, secs).await {
                println!("\n{e}");
            }
        }
        Input::Retry => {
            let n = unsynced.len();
            for completion in unsynced.drain(..) {
                sync.resubmit(completion);
            }
            println!("\nresubmitted {n} session(s)");
        }
        Input::Help => println!("\n{HELP}"),
        Input::Quit | Input::Nothing => {}
    }
    Ok(())
}

/// Print a sync outcome. Returns true once a completion is settled either way.
fn show_report(report: SyncReport, unsynced: &mut Vec<Completion>) -> bool {
    match report {
        SyncReport::Recorded {
            session, replayed, ..
        } => {
            let note = if replayed { " (already logged)" } else { "" };
            println!("\nsession {session} logged{note}");
            true
        }
        SyncReport::Retrying {
            attempt,
            retry_in,
            error,
            ..
        } => {
            println!(
                "\nwarning: session not logged yet ({error}); retry {attempt} in {}ms",
                retry_in.as_millis()
            );
            false
        }
        SyncReport::Failed { completion, error } => {
            println!(
                "\nwarning: could not log {} session of {} ({error}); type 'retry' to try again",
                completion.mode,
                format_secs(u64::from(completion.duration_secs))
            );
            unsynced.push(completion);
            true
        }
    }
}

fn render(snap: &TimerSnapshot) {
    let status = match snap.status {
        TimerStatus::Idle => "idle",
        TimerStatus::Running => "running",
        TimerStatus::Paused => "paused",
    };
    let streak = snap
        .completed_pomodoros
        .map(|n| format!("  [{n} done]"))
        .unwrap_or_default();
    print!("\r\x1b[2K{:<10} {}  {status}{streak}", snap.mode, snap.clock());
    let _ = std::io::stdout().flush();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
