use crate::builtins::{ExitCode, RawCommand};
use crate::{commands, error};

/// Returns failure.
pub(crate) struct FalseCommand {}

impl RawCommand for FalseCommand {
    fn new() -> Self {
        Self {}
    }

    async fn execute(
        &self,
        _context: commands::ExecutionContext<'_>,
        _args: Vec<String>,
    ) -> Result<ExitCode, error::Error> {
        Ok(ExitCode::Custom(1))
    }
}
