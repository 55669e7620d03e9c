//! `sqldag --list` implementation
//!
//! Prints job names one per line, in declaration order.

use crate::error::Result;
use sqldag_engine::Job;
use std::io::Write;

/// Print job names to stdout
pub fn run(jobs: &[Job]) -> Result<()> {
    let stdout = std::io::stdout();
    write_names(jobs, &mut stdout.lock())?;
    Ok(())
}

pub fn write_names(jobs: &[Job], out: &mut impl Write) -> std::io::Result<()> {
    for job in jobs {
        writeln!(out, "{}", job.name)?;
    }
    out.flush()
}
