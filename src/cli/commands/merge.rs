use crate::cli::output::Output;
use crate::errors::Result;
use crate::workflow::{Gitum, MergeReport, Resumed, Signal};
use std::path::Path;

pub fn run(repo_path: &Path) -> Result<()> {
    let report = Gitum::new(repo_path).merge()?;
    print_report(&report);
    Ok(())
}

pub fn resume(repo_path: &Path, signal: Signal) -> Result<()> {
    match Gitum::new(repo_path).continue_merge(signal)? {
        Resumed::Completed(report) => print_report(&report),
        Resumed::Aborted => Output::warning("Merge aborted; all gitum branches restored"),
    }
    Ok(())
}

fn print_report(report: &MergeReport) {
    if report.upstream_commits == 0 {
        Output::info("Already up to date");
        return;
    }

    Output::success(format!(
        "Merged {} upstream commits",
        report.upstream_commits
    ));
    Output::sub_item(format!("{} patches rebased", report.patches));
    if report.carried_local_edits {
        Output::sub_item("Uncaptured dev changes were carried forward");
    }
}
