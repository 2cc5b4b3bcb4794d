//! domcheck - DOM-scoped test runner
//!
//! Runs declarative suite files against an HTML document: every test runs
//! once per element its CSS selector matches.

use clap::Parser;
use colored::Colorize;
use commands::Commands;
use domcheck::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "domcheck", about = "Run selector-scoped tests against HTML documents")]
#[command(version, long_about = None)]
struct Cli {
    /// Log every engine event
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        logging::init_verbose();
    } else {
        logging::init_cli();
    }

    // The engine is single-threaded; watch mode spawns onto this set
    let local = tokio::task::LocalSet::new();
    let result = local.run_until(cli::dispatch(cli.command)).await;

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {e}", format!("error[{}]:", e.code()).red().bold());
            std::process::exit(2);
        }
    }
}
