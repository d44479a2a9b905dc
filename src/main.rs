//! StreamFlix - catalogue browser with stream resolution
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP API for a browser front-end
//! streamflix serve
//!
//! # CLI mode (for automation)
//! streamflix search "blade runner" --json
//! streamflix play 78 --title "Blade Runner" --quality 720p
//! ```

use clap::Parser;

use streamflix::cli::{Cli, Command, ExitCode, Output};
use streamflix::commands;
use streamflix::config::Config;
use streamflix::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);

    let config = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => config,
            Err(e) => return output.error(e.to_string(), ExitCode::InvalidArgs),
        },
        None => Config::load(),
    };

    match cli.command {
        Command::Serve(cmd) => commands::serve_cmd(cmd, config, &output).await,
        Command::Home => commands::home_cmd(&config, &output).await,
        Command::Browse(cmd) => commands::browse_cmd(cmd, &config, &output).await,
        Command::Search(cmd) => commands::search_cmd(cmd, &config, &output).await,
        Command::Resolve(cmd) => commands::resolve_cmd(cmd, &config, &output).await,
        Command::Play(cmd) => commands::play_cmd(cmd, &config, &output).await,
        Command::Recent(cmd) => commands::recent_cmd(cmd, &output).await,
    }
}
