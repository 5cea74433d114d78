use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Removes alias definitions.
#[derive(Parser)]
pub(crate) struct UnaliasCommand {
    /// Remove all alias definitions.
    #[arg(short = 'a')]
    remove_all: bool,

    /// The names of the aliases to remove.
    names: Vec<String>,
}

impl builtins::Command for UnaliasCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        let mut exit_code = ExitCode::Success;

        if self.remove_all {
            context.shell.aliases.clear();
            return Ok(exit_code);
        }

        for name in &self.names {
            if context.shell.aliases.remove(name).is_none() {
                writeln!(context.stderr(), "unalias: {name}: not found")?;
                exit_code = ExitCode::Custom(1);
            }
        }

        Ok(exit_code)
    }
}
