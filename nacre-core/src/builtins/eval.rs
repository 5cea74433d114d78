use crate::builtins::{ExitCode, RawCommand};
use crate::{commands, error};

/// Concatenates its arguments and executes the result as a command.
pub(crate) struct EvalCommand {}

impl RawCommand for EvalCommand {
    fn new() -> Self {
        Self {}
    }

    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
        args: Vec<String>,
    ) -> Result<ExitCode, error::Error> {
        if args.is_empty() {
            return Ok(ExitCode::Success);
        }

        let command = args.join(" ");
        let result = context.shell.run_string(command, &context.params).await?;

        if result.exit_shell {
            Ok(ExitCode::ExitShell(result.exit_code))
        } else if result.return_from_function_or_script {
            Ok(ExitCode::ReturnFromFunctionOrScript(result.exit_code))
        } else if let Some(count) = result.break_loop {
            Ok(ExitCode::BreakLoop(count))
        } else if let Some(count) = result.continue_loop {
            Ok(ExitCode::ContinueLoop(count))
        } else {
            Ok(ExitCode::Custom(result.exit_code))
        }
    }
}
