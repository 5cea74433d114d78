use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Prints the shell's working directory.
#[derive(Parser)]
pub(crate) struct PwdCommand {}

impl builtins::Command for PwdCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        let mut stdout = context.stdout();
        writeln!(stdout, "{}", context.shell.working_dir.to_string_lossy())?;
        stdout.flush()?;
        Ok(ExitCode::Success)
    }
}
