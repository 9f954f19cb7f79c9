use crate::cli::output::Output;
use crate::errors::Result;
use crate::workflow::Gitum;
use console::style;
use std::path::Path;

/// Create the gitum branches in the repository at `repo_path`
pub fn run(
    repo_path: &Path,
    merge: &str,
    dev: &str,
    upstream: &str,
    rebased: &str,
    patches: &str,
) -> Result<()> {
    let mapping = Gitum::new(repo_path).create(merge, dev, upstream, rebased, patches)?;

    Output::success("Repository is now managed by gitum");
    for (role, branch) in mapping.iter() {
        Output::sub_item(format!("{role:<8} {}", style(branch).cyan()));
    }
    Output::next_steps(&[
        "Commit your changes on the dev branch",
        "Capture them as patches: gitum update <count>",
    ]);
    Ok(())
}
