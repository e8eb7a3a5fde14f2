use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod assistant_cmd;
mod calendar;
mod calendar_cmd;
mod config;
mod llm;
mod reminders_cmd;
mod speech;
mod state;
mod tasks_cmd;

use calendar_cmd::CalendarCommand;
use reminders_cmd::RemindCommand;
use tasks_cmd::{EnergyArg, TaskCommand};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TEMPO_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(
    name = "tempo",
    version,
    long_version = LONG_VERSION,
    about = "Tempo: tasks, daily plans, reminders and calendar checks from the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, list and update tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Build (or show the cached) plan for a day
    Plan {
        /// YYYY-MM-DD, default today
        #[arg(long)]
        date: Option<String>,

        /// Discard the cached plan and rebuild
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },

    /// Up to five pending tasks matching your current energy
    Recommend {
        #[arg(long, value_enum)]
        energy: EnergyArg,
    },

    /// Task reminders
    Remind {
        #[command(subcommand)]
        command: RemindCommand,
    },

    /// Local calendar, provider sync, conflicts and meeting prep
    Calendar {
        #[command(subcommand)]
        command: CalendarCommand,
    },

    /// Ask the assistant a free-text question
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// Interactive command loop (typed utterances, spoken replies when available)
    Voice,

    /// Deliver reminders in the foreground until Ctrl-C
    Run,

    /// Manage ~/.tempo/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config (API key redacted)
    Show,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tempo=info,tempo_core=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Task { command } => tasks_cmd::run(command)?,
        Command::Plan { date, refresh } => tasks_cmd::plan(date, refresh)?,
        Command::Recommend { energy } => tasks_cmd::recommend(energy)?,
        Command::Remind { command } => reminders_cmd::run(command)?,
        Command::Calendar { command } => calendar_cmd::run(command).await?,
        Command::Ask { text } => assistant_cmd::ask(&text.join(" ")).await?,
        Command::Voice => assistant_cmd::voice().await?,
        Command::Run => reminders_cmd::run_daemon().await?,
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let mut cfg = config::load_config()?;
                if cfg.llm.api_key.is_some() {
                    cfg.llm.api_key = Some("<redacted>".into());
                }
                for token in [&mut cfg.calendar.google_token, &mut cfg.calendar.outlook_token] {
                    if token.is_some() {
                        *token = Some("<redacted>".into());
                    }
                }
                print!("{}", toml::to_string_pretty(&cfg)?);
            }
        },
    }

    Ok(())
}
