use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Shifts positional parameters to the left.
#[derive(Parser)]
pub(crate) struct ShiftCommand {
    /// How many positions to shift by; defaults to 1.
    #[clap(default_value_t = 1)]
    count: i32,
}

impl builtins::Command for ShiftCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        let param_count = context.shell.positional_parameters.len();

        let Ok(count) = usize::try_from(self.count) else {
            writeln!(context.stderr(), "shift: invalid count")?;
            return Ok(ExitCode::InvalidUsage);
        };

        if count > param_count {
            return Ok(ExitCode::Custom(1));
        }

        context.shell.positional_parameters.drain(0..count);

        Ok(ExitCode::Success)
    }
}
