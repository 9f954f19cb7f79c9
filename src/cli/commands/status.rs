use crate::cli::output::Output;
use crate::errors::Result;
use crate::git::short_id;
use crate::workflow::{Gitum, OperationKind};
use console::style;
use std::path::Path;

/// Show the role branches and any suspended operation
pub fn run(repo_path: &Path) -> Result<()> {
    let status = Gitum::new(repo_path).status()?;

    Output::section("Branches");
    for role in &status.roles {
        let marker = if status.current_branch.as_deref() == Some(role.branch.as_str()) {
            "*"
        } else {
            " "
        };
        let tip = match role.tip {
            Some(tip) => style(short_id(tip)).yellow().to_string(),
            None => style("missing").red().to_string(),
        };
        Output::sub_item(format!(
            "{marker} {:<8} {:<20} {tip}",
            role.role.as_str(),
            role.branch
        ));
    }
    Output::sub_item(format!("{} patches published", status.patches));

    Output::section("Operation");
    let Some(operation) = &status.operation else {
        Output::success("No operation in progress");
        return Ok(());
    };

    Output::warning(format!(
        "{} suspended at step {} (started {})",
        operation.kind,
        operation.cursor,
        operation.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for file in &status.conflicted_files {
        Output::bullet(format!("conflict: {file}"));
    }

    let resume_flag = match operation.kind {
        OperationKind::Pull => "--resolved",
        OperationKind::Update | OperationKind::Merge => "--continue",
    };
    Output::tip("Resolve the conflicts and stage them with 'git add', then run:");
    Output::command_example(format!("gitum continue_{} {resume_flag}", operation.kind));
    Output::command_example(format!("gitum continue_{} --abort", operation.kind));
    Ok(())
}
