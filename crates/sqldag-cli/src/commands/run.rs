//! Run jobs against the database
//!
//! Fatal problems (missing URL, unknown names, cycles) surface before a
//! connection is opened. Job failures only show up in the summary and the exit
//! status.

use crate::config::RunConfig;
use crate::error::{CliError, Result};
use colored::Colorize;
use sqldag_engine::{Job, Orchestrator, RunSummary};

pub async fn run(config: &RunConfig, jobs: &[Job]) -> Result<()> {
    let database = config.database()?;

    // Planning needs no connection, so its failures never reach the database.
    let ordered = Orchestrator::plan(jobs, &config.options)?;
    if ordered.is_empty() {
        return Ok(());
    }

    let orchestrator = Orchestrator::connect(&database).await?;
    let summary = orchestrator
        .run_ordered(&ordered, config.options.stop_on_failure)
        .await;

    print_summary(&summary);
    check_outcome(&summary, config.fail_on_empty)
}

/// Decide the run's outcome; failures take precedence over empty outputs.
pub fn check_outcome(summary: &RunSummary, fail_on_empty: bool) -> Result<()> {
    if !summary.success() {
        return Err(CliError::JobsFailed {
            failed: summary.failed(),
            total: summary.reports.len(),
        });
    }

    if fail_on_empty && summary.any_empty() {
        let empty = summary
            .reports
            .iter()
            .filter(|r| r.rows == 0)
            .map(|r| r.job.clone())
            .collect();
        return Err(CliError::EmptyResults(empty));
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "Run Summary:".cyan().bold());

    for report in &summary.reports {
        if report.success {
            let target = report
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "  {} {}: {} rows -> {} ({:.1}s)",
                "OK".green().bold(),
                report.job,
                report.rows,
                target,
                report.elapsed.as_secs_f64()
            );
        } else {
            println!(
                "  {} {}: {}",
                "FAILED".red().bold(),
                report.job,
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!();
    println!("  Jobs:   {}", summary.reports.len());
    println!("  Failed: {}", summary.failed());
    println!("  Rows:   {}", summary.total_rows());
}
