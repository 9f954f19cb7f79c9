use crate::cli::output::Output;
use crate::errors::Result;
use crate::workflow::{Gitum, Resumed, Signal, UpdateReport};
use std::path::Path;

pub fn run(repo_path: &Path, count: usize) -> Result<()> {
    let report = Gitum::new(repo_path).update(count)?;
    print_report(&report);
    Ok(())
}

pub fn resume(repo_path: &Path, signal: Signal) -> Result<()> {
    match Gitum::new(repo_path).continue_update(signal)? {
        Resumed::Completed(report) => print_report(&report),
        Resumed::Aborted => Output::warning("Update aborted; all gitum branches restored"),
    }
    Ok(())
}

fn print_report(report: &UpdateReport) {
    if report.rebuilt {
        Output::success(format!("Captured {} patches", report.patches));
    } else {
        Output::info(format!(
            "Patch set unchanged ({} patches already captured)",
            report.patches
        ));
    }
}
