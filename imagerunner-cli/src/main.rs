//! imagerunner CLI.
//!
//! `run` bridges a build process's work messages (newline-delimited JSON on
//! stdin/stdout) into the ingest supervisor; `render` materializes one
//! deferred transform from a job store, the way the on-demand handler
//! would.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use error::CliError;

#[derive(Parser)]
#[command(name = "imagerunner")]
#[command(version = imagerunner::VERSION)]
#[command(about = "Defer build-time image transforms to first request", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest transform work messages from stdin, answering on stdout
    Run(commands::run::RunArgs),
    /// Materialize one deferred transform from a job store
    Render(commands::render::RenderArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _guard = match imagerunner::logging::init_logging(
        imagerunner::logging::default_log_dir(),
        imagerunner::logging::default_log_file(),
    ) {
        Ok(guard) => guard,
        Err(err) => CliError::LoggingInit(err.to_string()).exit(),
    };

    let result = match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Render(args) => commands::render::execute(args).await,
    };

    if let Err(err) = result {
        err.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
