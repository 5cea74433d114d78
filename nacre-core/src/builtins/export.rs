use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::env::{self, EnvironmentScope};
use crate::variables::ShellVariable;
use crate::{commands, error};

/// Marks variables as exported to child processes.
#[derive(Parser)]
pub(crate) struct ExportCommand {
    /// Print all exported variables in a re-usable form.
    #[arg(short = 'p')]
    print: bool,

    /// Names (or name=value pairs) to export.
    names: Vec<String>,
}

impl builtins::Command for ExportCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        if self.print || self.names.is_empty() {
            let mut stdout = context.stdout();
            for (name, var) in context.shell.env.iter_exported() {
                writeln!(
                    stdout,
                    "export {name}={}",
                    crate::escape::quote_if_needed(var.value())
                )?;
            }
            stdout.flush()?;
            return Ok(ExitCode::Success);
        }

        for entry in &self.names {
            let (name, value) = match entry.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (entry.as_str(), None),
            };

            if !env::valid_variable_name(name) {
                writeln!(context.stderr(), "export: {name}: not a valid identifier")?;
                return Ok(ExitCode::Custom(1));
            }

            if context.shell.env.is_set(name) {
                if let Some((_, var)) = context.shell.env.get_mut(name) {
                    if let Some(value) = value {
                        var.assign(name, value)?;
                    }
                    var.export();
                }
            } else {
                let mut var = ShellVariable::new(value.unwrap_or(""));
                var.export();
                context.shell.env.add(name, var, EnvironmentScope::Global)?;
            }
        }

        Ok(ExitCode::Success)
    }
}
