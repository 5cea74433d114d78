use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error};

/// Defines or displays aliases.
#[derive(Parser)]
pub(crate) struct AliasCommand {
    /// Aliases to define (name=value) or display (name).
    entries: Vec<String>,
}

impl builtins::Command for AliasCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        let mut stdout = context.stdout();
        let mut exit_code = ExitCode::Success;

        if self.entries.is_empty() {
            for (name, value) in &context.shell.aliases {
                writeln!(
                    stdout,
                    "alias {name}={}",
                    crate::escape::quote_if_needed(value)
                )?;
            }
            stdout.flush()?;
            return Ok(exit_code);
        }

        for entry in &self.entries {
            match entry.split_once('=') {
                Some((name, value)) => {
                    context
                        .shell
                        .aliases
                        .insert(name.to_owned(), value.to_owned());
                }
                None => match context.shell.aliases.get(entry) {
                    Some(value) => {
                        writeln!(
                            stdout,
                            "alias {entry}={}",
                            crate::escape::quote_if_needed(value)
                        )?;
                    }
                    None => {
                        writeln!(context.stderr(), "alias: {entry}: not found")?;
                        exit_code = ExitCode::Custom(1);
                    }
                },
            }
        }

        stdout.flush()?;
        Ok(exit_code)
    }
}
