use std::io::Write;
use std::str::FromStr;

use crate::builtins::{ExitCode, RawCommand};
use crate::traps::TrapSignal;
use crate::{commands, error, sys};

/// Configures signal trap handlers.
pub(crate) struct TrapCommand {}

impl RawCommand for TrapCommand {
    fn new() -> Self {
        Self {}
    }

    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
        args: Vec<String>,
    ) -> Result<ExitCode, error::Error> {
        let mut stderr = context.stderr();

        if args.is_empty() {
            // Display the registered traps in re-usable form.
            let mut stdout = context.stdout();
            for (signal, command) in context.shell.traps.iter_handlers() {
                writeln!(
                    stdout,
                    "trap -- {} {signal}",
                    crate::escape::quote_if_needed(command)
                )?;
            }
            stdout.flush()?;
            return Ok(ExitCode::Success);
        }

        let mut args = args;

        // A first argument that itself parses as a signal spec means "reset
        // these signals to their default dispositions".
        let (action, signal_specs) = if TrapSignal::from_str(args[0].as_str()).is_ok() {
            (None, args)
        } else {
            let action = args.remove(0);
            (Some(action), args)
        };

        if signal_specs.is_empty() {
            writeln!(stderr, "trap: signal specification required")?;
            return Ok(ExitCode::InvalidUsage);
        }

        for spec in &signal_specs {
            let signal = match TrapSignal::from_str(spec.as_str()) {
                Ok(signal) => signal,
                Err(e) => {
                    writeln!(stderr, "trap: {e}")?;
                    return Ok(ExitCode::Custom(1));
                }
            };

            let reset = action.is_none() || action.as_deref() == Some("-");

            if reset {
                context.shell.traps.remove_handlers(signal);
                if let TrapSignal::Signal(s) = signal {
                    sys::signal::uninstall_trap_handler(s)?;
                }
            } else {
                let command = action.clone().unwrap_or_default();

                if let TrapSignal::Signal(s) = signal {
                    if let Err(e) = sys::signal::install_trap_handler(s) {
                        writeln!(stderr, "trap: {e}")?;
                        return Ok(ExitCode::Custom(1));
                    }
                }

                context.shell.traps.register_handler(signal, command);
            }
        }

        Ok(ExitCode::Success)
    }
}
