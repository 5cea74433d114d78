use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Changes the shell's working directory.
#[derive(Parser)]
pub(crate) struct CdCommand {
    /// The directory to change to; defaults to `$HOME`.
    target_dir: Option<String>,
}

impl builtins::Command for CdCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        let target = match &self.target_dir {
            Some(dir) if dir == "-" => {
                // `cd -` goes to $OLDPWD and reports where it went.
                let Some(oldpwd) = context.shell.env.get_str("OLDPWD").map(|s| s.to_owned())
                else {
                    writeln!(context.stderr(), "cd: OLDPWD not set")?;
                    return Ok(ExitCode::Custom(1));
                };

                writeln!(context.stdout(), "{oldpwd}")?;
                oldpwd
            }
            Some(dir) => dir.clone(),
            None => match context.shell.home_dir() {
                Some(home) => home,
                None => {
                    writeln!(context.stderr(), "cd: HOME not set")?;
                    return Ok(ExitCode::Custom(1));
                }
            },
        };

        if let Err(e) = context.shell.set_working_dir(target.as_str()) {
            writeln!(context.stderr(), "cd: {e}")?;
            return Ok(ExitCode::Custom(1));
        }

        Ok(ExitCode::Success)
    }
}
