use crate::builtins::{ExitCode, RawCommand};
use crate::{commands, error};

/// Returns success.
pub(crate) struct TrueCommand {}

impl RawCommand for TrueCommand {
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
