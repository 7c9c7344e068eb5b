//! kiln CLI entry point: argument parsing, logging setup and command dispatch.

use clap::Parser;
use kiln_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Dev(dev_args) => commands::dev_execute(dev_args, args.config).await,
        cli::Command::Test(test_args) => commands::test_execute(test_args, args.config).await,
    };

    result.map_err(error::cli_error_to_miette)
}
