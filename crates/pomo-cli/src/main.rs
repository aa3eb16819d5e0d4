mod backend;
mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, session::SessionSubcommand, task::TaskSubcommand,
    timer::TimerArgs, user::UserSubcommand,
};
use pomo_core::Mode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pomo",
    about = "Pomodoro timer with a per-user task list and session log",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data root (default: auto-detect from .pomo/)
    #[arg(long, global = true, env = "POMO_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Bearer token of the acting user
    #[arg(long, global = true, env = "POMO_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Talk to a running `pomo serve` instead of the local data file
    #[arg(long, global = true, env = "POMO_SERVER")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .pomo/ in the current directory
    Init,

    /// Register users and manage their tokens
    User {
        #[command(subcommand)]
        subcommand: UserSubcommand,
    },

    /// Manage your task list
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Inspect your session log
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// Run the interactive timer; completed intervals are logged as sessions
    Timer {
        /// Mode to start in (pomodoro, shortBreak, longBreak)
        #[arg(long)]
        mode: Option<Mode>,

        /// Start immediately, log one interval, then exit
        #[arg(long)]
        once: bool,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (default: server.port from config.yaml)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show or validate .pomo/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Timer { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let token = cli.token.as_deref();
    let server = cli.server.as_deref();

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::User { subcommand } => cmd::user::run(&root, subcommand, cli.json),
        Commands::Task { subcommand } => backend::Backend::connect(&root, token, server)
            .and_then(|b| cmd::task::run(b, subcommand, cli.json)),
        Commands::Session { subcommand } => backend::Backend::connect(&root, token, server)
            .and_then(|b| cmd::session::run(b, subcommand, cli.json)),
        Commands::Timer { mode, once } => cmd::timer::run(
            &root,
            TimerArgs {
                token,
                server,
                mode,
                once,
            },
        ),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
