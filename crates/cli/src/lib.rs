pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use movely_core::config::{AppConfig, LoadOptions};
use rust_decimal::Decimal;

use commands::drafts::DraftsAction;
use commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "movely",
    about = "Movely service-request CLI",
    long_about = "Price requests, check form payloads, inspect saved drafts, and verify runtime readiness.",
    after_help = "Examples:\n  movely quote --attributes request.json --factors factors.json\n  movely validate --payload draft.json\n  movely drafts list\n  movely doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Compute a quote from request attributes and pricing factors")]
    Quote {
        #[arg(long, value_name = "FILE", help = "JSON file with request attributes")]
        attributes: PathBuf,
        #[arg(
            long,
            value_name = "FILE",
            help = "JSON array of pricing factors (fetched from the API when omitted)"
        )]
        factors: Option<PathBuf>,
        #[arg(long, value_name = "AMOUNT", help = "Base price (defaults to pricing.base_price)")]
        base_price: Option<Decimal>,
    },
    #[command(about = "Validate a form payload against every step of the request form")]
    Validate {
        #[arg(long, value_name = "FILE", help = "JSON object keyed by field name")]
        payload: PathBuf,
    },
    #[command(about = "List, show, or discard saved drafts")]
    Drafts {
        #[command(subcommand)]
        action: DraftsCommand,
    },
    #[command(about = "Apply pending draft database migrations")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, API client setup, and draft database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DraftsCommand {
    #[command(about = "List drafts, most recently updated first")]
    List,
    #[command(about = "Show one reconciled draft")]
    Show { id: String },
    #[command(about = "Discard a draft everywhere it is stored")]
    Discard { id: String },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        if let Err(error) = logging::init(&config.logging) {
            eprintln!("{error}");
        }
    }

    let result = match cli.command {
        Command::Quote { attributes, factors, base_price } => {
            commands::quote::run(QuoteArgs {
                attributes: &attributes,
                factors: factors.as_deref(),
                base_price,
            })
        }
        Command::Validate { payload } => commands::validate::run(&payload),
        Command::Drafts { action } => commands::drafts::run(match action {
            DraftsCommand::List => DraftsAction::List,
            DraftsCommand::Show { id } => DraftsAction::Show(id),
            DraftsCommand::Discard { id } => DraftsAction::Discard(id),
        }),
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
