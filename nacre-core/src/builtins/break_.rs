use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Breaks out of a control-flow loop.
#[derive(Parser)]
pub(crate) struct BreakCommand {
    /// If specified, indicates which nested loop to break out of.
    #[clap(default_value_t = 1)]
    which_loop: i8,
}

impl builtins::Command for BreakCommand {
    async fn execute(
        &self,
        _context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        // If specified, which_loop needs to be positive.
        if self.which_loop <= 0 {
            return Ok(ExitCode::InvalidUsage);
        }

        #[allow(clippy::cast_sign_loss)]
        Ok(ExitCode::BreakLoop((self.which_loop - 1) as u8))
    }
}
