pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use brewbot_core::config::LoadOptions;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "brewbot",
    about = "Brewbot operator CLI",
    long_about = "Inspect Brewbot configuration, runtime readiness, and the persisted reminder and pairing stores.",
    after_help = "Examples:\n  brewbot doctor --json\n  brewbot config\n  brewbot reminders --user 1234\n  brewbot history 1234"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Load configuration from this TOML file instead of brewbot.toml")]
    config_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, data directory writability, and store readability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List persisted reminders, soonest first")]
    Reminders {
        #[arg(long, help = "Only show reminders owned by this user id")]
        user: Option<String>,
    },
    #[command(about = "Show pair counts and last pairing per partner for one participant")]
    History {
        #[arg(help = "Participant id to inspect")]
        participant: String,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        match &self.config_file {
            Some(path) => LoadOptions {
                config_path: Some(path.clone()),
                require_file: true,
                ..LoadOptions::default()
            },
            None => LoadOptions::default(),
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
        Command::Reminders { user } => commands::reminders::run(options, user.as_deref()),
        Command::History { participant } => commands::history::run(options, &participant),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
