use std::process::ExitCode;

use clap::Parser;
use log::debug;

mod cli;

use cli::{Cli, Outcome};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.debug { "debug" } else { "warn" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_level));

    debug!("Using data file {}", cli.data_file.display());

    match cli::run(cli)? {
        Outcome::Invalid => Ok(ExitCode::FAILURE),
        Outcome::Modified | Outcome::Unchanged => Ok(ExitCode::SUCCESS),
    }
}
