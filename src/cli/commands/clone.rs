use crate::cli::output::Output;
use crate::errors::Result;
use crate::utils::spinner::Spinner;
use crate::workflow::Gitum;
use console::style;
use std::path::Path;

pub fn run(source: &str, dest: &Path) -> Result<()> {
    let (_, mapping) = Spinner::run(format!("Cloning {source}..."), || {
        Gitum::clone_from(source, dest)
    })?;

    Output::success(format!("Cloned {source} into {}", dest.display()));
    for (role, branch) in mapping.iter() {
        Output::sub_item(format!("{role:<8} {}", style(branch).cyan()));
    }
    Ok(())
}
