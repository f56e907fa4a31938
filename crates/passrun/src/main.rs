//! passrun - query a password store the way a launcher does
//!
//! Mirrors the launcher contract from the command line: match, list actions,
//! run an action. Handy for scripting and for checking what the launcher
//! would see.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use passrun::{Action, MatchService};
use passrun_core::Config;

#[derive(Parser)]
#[command(name = "passrun")]
#[command(about = "Fuzzy-find password-store entries, copy or auto-type them")]
#[command(version)]
#[command(after_help = r#"EXAMPLES:
    passrun match gh                   # Rank entries against "gh"
    passrun match ""                   # List everything (capped)
    passrun actions pass:work/github   # What can be done with a match
    passrun run pass:work/github       # Copy the password
    passrun run pass:work/github --action type
    passrun session --json             # Detected session and typer

CONFIG:
    ~/.config/passrun/config.toml (see --config)

LOGGING:
    RUST_LOG=passrun=debug passrun match gh
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List every entry in the store
    List {
        #[arg(long)]
        json: bool,
    },

    /// Rank entries against a query
    Match {
        /// Search term (empty lists everything)
        #[arg(default_value = "")]
        query: String,

        #[arg(long)]
        json: bool,
    },

    /// Show the actions available for a match
    Actions {
        /// Match id, e.g. pass:work/github
        match_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Decrypt a match and deliver it
    Run {
        /// Match id, e.g. pass:work/github
        match_id: String,

        /// copy or type
        #[arg(short, long, default_value = "copy")]
        action: String,
    },

    /// Show the detected session and delivery backends
    Session {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stderr only; stdout carries command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let service = MatchService::from_config(config).await;

    match cli.command {
        Commands::List { json } => cmd_list(&service, json),
        Commands::Match { query, json } => cmd_match(&service, &query, json),
        Commands::Actions { match_id, json } => cmd_actions(&service, &match_id, json),
        Commands::Run { match_id, action } => cmd_run(&service, &match_id, &action).await,
        Commands::Session { json } => cmd_session(&service, json),
    }
}

fn cmd_list(service: &MatchService, json: bool) -> Result<()> {
    let entries = service.list_entries()?;

    if json {
        println!("{}", serde_json::to_string_pretty(entries.as_slice())?);
    } else {
        for entry in entries.iter() {
            println!("{}", entry);
        }
    }
    Ok(())
}

fn cmd_match(service: &MatchService, query: &str, json: bool) -> Result<()> {
    let items = service.match_query(query);

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No matches");
        return Ok(());
    }
    for item in &items {
        println!("{:>5}  {:.2}  {}", item.score, item.relevance, item.match_id);
    }
    Ok(())
}

fn cmd_actions(service: &MatchService, match_id: &str, json: bool) -> Result<()> {
    let actions = service.actions(match_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    if actions.is_empty() {
        bail!("Unknown match: {}", match_id);
    }
    for action in &actions {
        println!("{:<6} {} ({})", action.action_id, action.label, action.icon);
    }
    Ok(())
}

async fn cmd_run(service: &MatchService, match_id: &str, action: &str) -> Result<()> {
    let action: Action = action.parse()?;
    service.run(match_id, action).await?;

    // Keep the process alive until the clipboard has been cleared
    if action == Action::Copy {
        if let Some(after) = service.config().clipboard.clear_after() {
            eprintln!("Clipboard will be cleared in {}s", after.as_secs());
            service.wait_pending().await;
        }
    }
    Ok(())
}

fn cmd_session(service: &MatchService, json: bool) -> Result<()> {
    let session = service.session();
    let backends = service.backends();

    if json {
        let value = serde_json::json!({
            "displayServer": session.display_server(),
            "sessionType": session.session_type(),
            "copy": backends.copy.name(),
            "typing": backends.typing.name(),
            "typingUnavailableReason": backends.typing.unavailable_reason(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Display server: {}", session.display_server());
    println!("Session type:   {}", session.session_type().unwrap_or("unset"));
    println!("Copy via:       {}", backends.copy.name());
    match backends.typing.unavailable_reason() {
        Some(reason) => println!("Type via:       unavailable\n\n{}", reason),
        None => println!("Type via:       {}", backends.typing.name()),
    }
    Ok(())
}
