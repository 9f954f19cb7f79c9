pub mod commands;
pub mod output;

use crate::errors::{GitumError, Result};
use crate::git::find_repository_root;
use crate::workflow::Signal;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gitum")]
#[command(about = "Gitum - keep a set of local patches on top of an evolving upstream")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "repo", global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start managing the repository: create the five gitum branches at HEAD
    Create {
        /// Branch tracking the last upstream point merged into dev
        merge: String,
        /// Your working branch
        dev: String,
        /// Branch following the upstream project
        upstream: String,
        /// Branch holding the merge tip plus your patches
        rebased: String,
        /// Branch publishing the patch queue
        patches: String,
    },

    /// Capture the last N commits of the dev branch as the patch set
    Update {
        /// Number of dev commits to capture
        count: usize,
    },

    /// Resume or abort a conflicted update
    #[command(name = "continue_update", alias = "continue-update")]
    ContinueUpdate(ResumeArgs),

    /// Integrate new upstream commits into the patch set and dev
    Merge,

    /// Resume or abort a conflicted merge
    #[command(name = "continue_merge", alias = "continue-merge")]
    ContinueMerge(ResumeArgs),

    /// Fetch a remote, fast-forward upstream and apply its new patches to dev
    Pull {
        /// Remote to pull from
        #[arg(default_value = "origin")]
        remote: String,
    },

    /// Resume or abort a conflicted pull
    #[command(name = "continue_pull", alias = "continue-pull")]
    ContinuePull(PullResumeArgs),

    /// Clone a gitum-managed repository with all of its branches
    Clone {
        /// Repository to clone (path or URL)
        source: String,
        /// Destination directory (defaults to the current directory)
        dest: Option<PathBuf>,
    },

    /// Delete the gitum branches and configuration
    #[command(name = "remove_all", alias = "remove-all")]
    RemoveAll {
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },

    /// Show the gitum branches and any operation in progress
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `--continue` or `--abort`
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct ResumeArgs {
    /// The conflicts are resolved and staged; carry on
    #[arg(long = "continue")]
    pub proceed: bool,

    /// Put every gitum branch back where the operation started
    #[arg(long)]
    pub abort: bool,
}

impl ResumeArgs {
    pub fn signal(&self) -> Signal {
        if self.abort {
            Signal::Abort
        } else {
            Signal::Continue
        }
    }
}

/// `--resolved` or `--abort`
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct PullResumeArgs {
    /// The conflicts are resolved and staged; carry on
    #[arg(long)]
    pub resolved: bool,

    /// Put every gitum branch back where the pull started
    #[arg(long)]
    pub abort: bool,
}

impl PullResumeArgs {
    pub fn signal(&self) -> Signal {
        if self.abort {
            Signal::Abort
        } else {
            Signal::Continue
        }
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        // Set up logging based on verbosity
        self.setup_logging();

        if self.no_color {
            console::set_colors_enabled(false);
        }

        match self.command {
            Commands::Create {
                ref merge,
                ref dev,
                ref upstream,
                ref rebased,
                ref patches,
            } => commands::create::run(
                &self.repository_path()?,
                merge,
                dev,
                upstream,
                rebased,
                patches,
            ),
            Commands::Update { count } => commands::update::run(&self.repository_path()?, count),
            Commands::ContinueUpdate(ref args) => {
                commands::update::resume(&self.repository_path()?, args.signal())
            }
            Commands::Merge => commands::merge::run(&self.repository_path()?),
            Commands::ContinueMerge(ref args) => {
                commands::merge::resume(&self.repository_path()?, args.signal())
            }
            Commands::Pull { ref remote } => {
                commands::pull::run(&self.repository_path()?, remote)
            }
            Commands::ContinuePull(ref args) => {
                commands::pull::resume(&self.repository_path()?, args.signal())
            }
            Commands::Clone {
                ref source,
                ref dest,
            } => {
                let dest = match dest {
                    Some(dest) => dest.clone(),
                    None => self.start_dir()?,
                };
                commands::clone::run(source, &dest)
            }
            Commands::RemoveAll { yes } => commands::remove::run(&self.repository_path()?, yes),
            Commands::Status => commands::status::run(&self.repository_path()?),
            Commands::Completions { shell } => commands::completions::generate_completions(shell),
        }
    }

    fn start_dir(&self) -> Result<PathBuf> {
        match &self.repo {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().map_err(|e| {
                GitumError::config(format!("Could not get current directory: {e}"))
            }),
        }
    }

    fn repository_path(&self) -> Result<PathBuf> {
        find_repository_root(&self.start_dir()?)
    }

    fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time();

        if self.no_color {
            subscriber.with_ansi(false).init();
        } else {
            subscriber.init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_continue_flags_are_exclusive_and_required() {
        assert!(Cli::try_parse_from(["gitum", "continue_merge"]).is_err());
        assert!(Cli::try_parse_from(["gitum", "continue_merge", "--continue", "--abort"]).is_err());

        let cli = Cli::try_parse_from(["gitum", "continue_merge", "--abort"]).unwrap();
        match cli.command {
            Commands::ContinueMerge(args) => assert_eq!(args.signal(), Signal::Abort),
            _ => panic!("expected continue_merge"),
        }

        let cli = Cli::try_parse_from(["gitum", "continue_pull", "--resolved"]).unwrap();
        match cli.command {
            Commands::ContinuePull(args) => assert_eq!(args.signal(), Signal::Continue),
            _ => panic!("expected continue_pull"),
        }
    }

    #[test]
    fn test_create_takes_five_branch_names() {
        assert!(Cli::try_parse_from(["gitum", "create", "m", "d", "u", "r"]).is_err());
        let cli =
            Cli::try_parse_from(["gitum", "create", "merge", "dev", "master", "rebased", "patches"])
                .unwrap();
        match cli.command {
            Commands::Create { upstream, .. } => assert_eq!(upstream, "master"),
            _ => panic!("expected create"),
        }
    }
}
