pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "slotwise",
    about = "Slotwise operator CLI",
    long_about = "Operate the slotwise scheduler: chat with it from the terminal, query \
                  availability, run migrations, and inspect configuration.",
    after_help = "Examples:\n  slotwise chat\n  slotwise slots --duration 30 --preference \"next tuesday afternoon\"\n  slotwise doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive scheduling conversation on stdin/stdout")]
    Chat,
    #[command(about = "One-shot availability query without a conversation")]
    Slots {
        #[arg(long, help = "Meeting duration in minutes")]
        duration: i64,
        #[arg(long, help = "Natural-language time preference, e.g. 'next tuesday afternoon'")]
        preference: Option<String>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source precedence and redaction"
    )]
    Config,
    #[command(about = "Validate config, timezone resolution, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat => commands::chat::run(),
        Command::Slots { duration, preference } => {
            commands::slots::run(duration, preference.as_deref())
        }
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
