//! sqldag CLI - Main entry point

use clap::Parser;
use colored::Colorize;
use sqldag_cli::{Cli, CliError, RunConfig};
use sqldag_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // A .env file may supply REMOTE_DB_URL, so load it before clap reads the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("sqldag")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging, so a failed init is not fatal
    let guard = init_logging(&log_config).ok().flatten();

    let code = match execute_command(&cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{} {}", "Error:".red().bold(), e);
            e.exit_code()
        },
    };

    drop(guard);
    process::exit(code);
}

/// Load the job file, then list or run
async fn execute_command(cli: &Cli) -> sqldag_cli::Result<()> {
    let config = RunConfig::from_cli(cli)?;

    let jobs = sqldag_engine::load_jobs(&config.jobs_path)?;
    if jobs.is_empty() {
        return Err(CliError::NoJobs(config.jobs_path.clone()));
    }

    if cli.list {
        return sqldag_cli::commands::list::run(&jobs);
    }

    sqldag_cli::commands::run::run(&config, &jobs).await
}
