mod cli;
mod commands;
mod config;
mod engine;
mod progress;
mod schema;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub paths: config::Paths,
    pub dsn: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "dbconverge", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        paths: config::Paths::resolve(cli.manifest.as_deref(), cli.state.as_deref())?,
        dsn: cli.dsn,
    };

    match cli.command {
        Command::Plan(args) => commands::converge::plan(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::converge::apply(&ctx, &args),
        Command::Destroy(args) => commands::converge::destroy(&ctx, &args),
        Command::Import { address, id } => commands::import::run(&ctx, &address, &id),
        Command::Show => commands::show::run(&ctx),
        Command::Users(args) => commands::users::run(&ctx, &args),
        Command::Completions { .. } => Ok(()),
    }
}
