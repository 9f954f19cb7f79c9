use crate::cli::output::Output;
use crate::config::{Role, RoleMapping};
use crate::errors::{GitumError, Result};
use crate::workflow::Gitum;
use console::Term;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::Path;

pub fn run(repo_path: &Path, yes: bool) -> Result<()> {
    let gitum = Gitum::new(repo_path);

    if !yes && Term::stdout().is_term() {
        if let Some(mapping) = gitum.mapping()? {
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(confirmation_prompt(&mapping))
                .default(false)
                .interact()
                .map_err(|e| GitumError::config(format!("Input error: {e}")))?;

            if !confirmed {
                Output::info("Nothing removed");
                return Ok(());
            }
        }
    }

    let report = gitum.remove_all()?;
    if report.unmanaged {
        Output::warning("Repository is not managed by gitum; nothing to remove");
        return Ok(());
    }

    Output::success(format!("Removed {} gitum branches", report.deleted.len()));
    for branch in &report.deleted {
        Output::sub_item(branch);
    }
    Ok(())
}

/// Confirmation text naming every branch that will be deleted, upstream included
fn confirmation_prompt(mapping: &RoleMapping) -> String {
    let branches = mapping
        .iter()
        .map(|(_, name)| name)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Delete the gitum branches ({branches}), including the upstream branch '{}', and the gitum configuration?",
        mapping.branch(Role::Upstream)
    )
}
