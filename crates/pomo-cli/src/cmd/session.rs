use crate::backend::{runtime, Backend};
use crate::output::{format_secs, print_json, print_table};
use clap::Subcommand;
use pomo_core::session::SessionSummary;

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// Completed intervals, newest first, with totals
    History {
        /// Show at most this many sessions
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn run(backend: Backend, subcmd: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SessionSubcommand::History { limit } => {
            runtime()?.block_on(async move { history(&backend, limit, json).await })
        }
    }
}

async fn history(backend: &Backend, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let mut sessions = backend.session_history().await?;
    let summary = SessionSummary::from_sessions(&sessions);
    if let Some(limit) = limit {
        sessions.truncate(limit);
    }

    if json {
        return print_json(&serde_json::json!({
            "count": sessions.len(),
            "data": sessions,
            "summary": summary,
        }));
    }

    if sessions.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }
    let rows = sessions
        .iter()
        .map(|s| {
            vec![
                s.completed_at.format("%Y-%m-%d %H:%M").to_string(),
                s.mode.to_string(),
                format_secs(u64::from(s.duration)),
            ]
        })
        .collect();
    print_table(&["COMPLETED", "TYPE", "DURATION"], rows);
    println!(
        "\n{} pomodoro(s), {} focused, {} on breaks",
        summary.pomodoros,
        format_secs(summary.focus_secs),
        format_secs(summary.break_secs)
    );
    Ok(())
}
