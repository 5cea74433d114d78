use std::io::Write;
use std::path::Path;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Reads and executes a script in the current shell environment.
#[derive(Parser)]
pub(crate) struct DotCommand {
    /// The path of the script to source.
    script_path: String,

    /// Positional parameters to make visible to the script.
    args: Vec<String>,
}

impl builtins::Command for DotCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        let path = context.shell.get_absolute_path(self.script_path.as_str());
        if !path.is_file() {
            writeln!(
                context.stderr(),
                ".: {}: no such file",
                self.script_path
            )?;
            return Ok(ExitCode::Custom(1));
        }

        let result = context
            .shell
            .run_script(
                Path::new(&path),
                self.args.iter().map(|a| a.as_str()),
                &context.params,
            )
            .await?;

        if result.exit_shell {
            Ok(ExitCode::ExitShell(result.exit_code))
        } else {
            Ok(ExitCode::Custom(result.exit_code))
        }
    }
}
