use crate::builtins::{ExitCode, RawCommand};
use crate::{commands, error};

/// No-op command.
pub(crate) struct ColonCommand {}

impl RawCommand for ColonCommand {
    fn new() -> Self {
        Self {}
    }

    async fn execute(
        &self,
        _context: commands::ExecutionContext<'_>,
        _args: Vec<String>,
    ) -> Result<ExitCode, error::Error> {
        Ok(ExitCode::Success)
    }
}
