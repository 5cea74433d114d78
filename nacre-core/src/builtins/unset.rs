use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Unsets variables or functions.
#[derive(Parser)]
pub(crate) struct UnsetCommand {
    /// Treat the names as variable names.
    #[arg(short = 'v')]
    variables: bool,

    /// Treat the names as function names.
    #[arg(short = 'f')]
    functions: bool,

    /// The names to unset.
    names: Vec<String>,
}

impl builtins::Command for UnsetCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        let mut exit_code = ExitCode::Success;

        for name in &self.names {
            if self.functions {
                context.shell.funcs.remove(name);
                continue;
            }

            match context.shell.env.unset(name) {
                // Trying to unset a readonly variable is an error.
                Err(_) => exit_code = ExitCode::Custom(1),
                Ok(removed) => {
                    // Without -v or -f, fall back to removing a function of
                    // the same name when no variable was found.
                    if !removed && !self.variables {
                        context.shell.funcs.remove(name);
                    }
                }
            }
        }

        Ok(exit_code)
    }
}
