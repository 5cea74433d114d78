use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::env::{self, EnvironmentScope};
use crate::variables::ShellVariable;
use crate::{commands, error};

/// Marks variables as read-only.
#[derive(Parser)]
pub(crate) struct ReadonlyCommand {
    /// Print all read-only variables in a re-usable form.
    #[arg(short = 'p')]
    print: bool,

    /// Names (or name=value pairs) to mark read-only.
    names: Vec<String>,
}

impl builtins::Command for ReadonlyCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        if self.print || self.names.is_empty() {
            let mut stdout = context.stdout();
            for (name, var) in context.shell.env.iter() {
                if var.is_readonly() {
                    writeln!(
                        stdout,
                        "readonly {name}={}",
                        crate::escape::quote_if_needed(var.value())
                    )?;
                }
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
                writeln!(
                    context.stderr(),
                    "readonly: {name}: not a valid identifier"
                )?;
                return Ok(ExitCode::Custom(1));
            }

            if context.shell.env.is_set(name) {
                if let Some((_, var)) = context.shell.env.get_mut(name) {
                    if let Some(value) = value {
                        var.assign(name, value)?;
                    }
                    var.set_readonly();
                }
            } else {
                let mut var = ShellVariable::new(value.unwrap_or(""));
                var.set_readonly();
                context.shell.env.add(name, var, EnvironmentScope::Global)?;
            }
        }

        Ok(ExitCode::Success)
    }
}
