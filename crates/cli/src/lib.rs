pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "slack2doc",
    about = "slack2doc operator CLI",
    long_about = "Inspect configuration, sign test payloads, and run readiness checks for the slack2doc webhook.",
    after_help = "Examples:\n  slack2doc doctor --json\n  slack2doc config\n  slack2doc sign --body event.json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to the JSON secrets file")]
    secrets: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print Slack signature headers for a request body")]
    Sign {
        #[arg(long, help = "File holding the exact request body to sign")]
        body: PathBuf,
        #[arg(long, help = "Unix timestamp to sign with (defaults to now)")]
        timestamp: Option<i64>,
    },
    #[command(about = "Validate config, document target, and logging readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let secrets = cli.secrets.as_deref();

    let result = match cli.command {
        Command::Config => commands::config::run(secrets),
        Command::Sign { body, timestamp } => commands::sign::run(secrets, &body, timestamp),
        Command::Doctor { json } => commands::doctor::run(secrets, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
