use clap::Parser;
use gitum::cli::output::Output;
use gitum::cli::Cli;
use gitum::errors::GitumError;
use gitum::workflow::OperationKind;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli.run().map_err(anyhow::Error::new) {
        Output::error(format!("{err:#}"));

        let code = match err.downcast_ref::<GitumError>() {
            Some(GitumError::Conflict { operation, .. }) => {
                let resume_flag = match operation {
                    OperationKind::Pull => "--resolved",
                    OperationKind::Update | OperationKind::Merge => "--continue",
                };
                Output::tip(format!(
                    "Resolve the conflicts, stage them with 'git add', then run 'gitum continue_{operation} {resume_flag}' (or --abort)"
                ));
                1
            }
            Some(gitum_err) => gitum_err.exit_code(),
            None => 3,
        };
        std::process::exit(code);
    }
}
