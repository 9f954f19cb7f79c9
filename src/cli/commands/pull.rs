use crate::cli::output::Output;
use crate::errors::Result;
use crate::utils::spinner::Spinner;
use crate::workflow::{Gitum, PullReport, Resumed, Signal};
use std::path::Path;

pub fn run(repo_path: &Path, remote: &str) -> Result<()> {
    let gitum = Gitum::new(repo_path);
    let report = Spinner::run(format!("Pulling from {remote}..."), || gitum.pull(remote))?;
    print_report(remote, &report);
    Ok(())
}

pub fn resume(repo_path: &Path, signal: Signal) -> Result<()> {
    match Gitum::new(repo_path).continue_pull(signal)? {
        Resumed::Completed(report) => print_report("remote", &report),
        Resumed::Aborted => Output::warning("Pull aborted; all gitum branches restored"),
    }
    Ok(())
}

fn print_report(remote: &str, report: &PullReport) {
    if report.upstream_advanced {
        Output::success(format!("Upstream fast-forwarded from {remote}"));
    }
    if report.applied > 0 {
        Output::success(format!("Applied {} new patches", report.applied));
    } else if !report.upstream_advanced {
        Output::info("Already up to date");
    }
}
