use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};

/// Back up chats, messages and media from a linked messaging account.
#[derive(Parser, Debug)]
#[command(name = "chatkeep", version, about)]
struct Cli {
    /// Print command reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect, sync history and archive live messages until disconnect
    Run {
        /// Skip the history sync after the session becomes ready
        #[arg(long)]
        no_sync: bool,
    },
    /// Connect, run one history sync pass and exit
    Sync,
    /// Browse archived chats interactively
    View,
    /// Show resolved paths, effective config and backup state
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let status = if report.ok { "ok" } else { "issues" };
    println!("{} [{status}]", report.command);
    for line in &report.details {
        println!("  - {line}");
    }
    for line in &report.issues {
        println!("  ! {line}");
    }
    Ok(())
}

pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Run { no_sync } => commands::run::run(&commands::run::RunOptions { no_sync })?,
        Command::Sync => commands::sync::run()?,
        Command::Status => commands::status::run()?,
        Command::View => {
            commands::view::run()?;
            return Ok(0);
        }
    };

    print_report(&report, cli.json)?;
    Ok(if report.ok { 0 } else { 1 })
}
