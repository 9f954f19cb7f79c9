use crate::cli::Cli;
use crate::errors::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

/// Generate shell completions for the specified shell
pub fn generate_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let bin_name = "gitum";

    generate(shell, &mut cmd, bin_name, &mut io::stdout());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_mention_every_verb() {
        let mut cmd = Cli::command();
        let mut buffer = Vec::new();
        generate(Shell::Bash, &mut cmd, "gitum", &mut buffer);

        let script = String::from_utf8(buffer).unwrap();
        for verb in ["create", "update", "continue_merge", "pull", "remove_all"] {
            assert!(script.contains(verb), "missing {verb}");
        }
    }
}
