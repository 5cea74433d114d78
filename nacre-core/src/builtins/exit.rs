use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Exits the shell.
#[derive(Parser)]
#[clap(allow_negative_numbers = true)]
pub(crate) struct ExitCommand {
    /// The exit code to use; defaults to the status of the last command.
    code: Option<i32>,
}

impl builtins::Command for ExitCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let code_8bit = match self.code {
            Some(code) => (code & 0xFF) as u8,
            None => context.shell.last_exit_status,
        };

        Ok(ExitCode::ExitShell(code_8bit))
    }
}
