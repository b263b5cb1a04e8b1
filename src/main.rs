//! Stream acceptance harness
//!
//! Runs black-box acceptance checks against a streaming-source client and
//! the media server it streams into. Exits 0 only when every case passed.

use std::path::PathBuf;

use clap::Parser;
use stream_acceptance::cli::{self, Options};
use stream_acceptance::commands::Commands;
use stream_acceptance::common::logging;

#[derive(Parser)]
#[command(name = "stream-acceptance", about = "Acceptance checks for a streaming-source client")]
#[command(version, long_about = None)]
struct Cli {
    /// Harness configuration file (TOML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Run only these cases, in this order (repeatable)
    #[arg(long = "case", global = true)]
    cases: Vec<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    logging::init_cli(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let options = Options {
        config: cli.config,
        cases: cli.cases,
    };

    let code = match cli::dispatch(cli.command.unwrap_or_default(), &options).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };

    std::process::exit(code);
}
