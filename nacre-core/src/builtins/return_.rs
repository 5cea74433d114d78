use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Returns from the current function or sourced script.
#[derive(Parser)]
#[clap(allow_negative_numbers = true)]
pub(crate) struct ReturnCommand {
    /// The code to return; defaults to the status of the last command.
    code: Option<i32>,
}

impl builtins::Command for ReturnCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let code_8bit = match self.code {
            Some(code) => (code & 0xFF) as u8,
            None => context.shell.last_exit_status,
        };

        if context.shell.call_stack.depth() > 0 {
            Ok(ExitCode::ReturnFromFunctionOrScript(code_8bit))
        } else {
            let mut stderr = context.stderr();
            let _ = std::io::Write::write_all(
                &mut stderr,
                b"return: can only be used in a function or sourced script\n",
            );
            Ok(ExitCode::InvalidUsage)
        }
    }
}
