use std::io::Write;

use clap::Parser;

use crate::builtins::{self, ExitCode};
use crate::{commands, error, sys};

/// Displays or sets the file-creation mask.
#[derive(Parser)]
pub(crate) struct UmaskCommand {
    /// The octal mask to establish; when absent, the current mask is printed.
    mask: Option<String>,
}

impl builtins::Command for UmaskCommand {
    async fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> Result<ExitCode, error::Error> {
        match &self.mask {
            Some(mask_str) => {
                let Ok(mask) = u32::from_str_radix(mask_str, 8) else {
                    return Err(error::Error::InvalidUmask);
                };

                if mask > 0o777 {
                    return Err(error::Error::InvalidUmask);
                }

                sys::fs::set_umask(mask)?;
            }
            None => {
                let current = sys::fs::get_umask()?;
                writeln!(context.stdout(), "{current:04o}")?;
            }
        }

        Ok(ExitCode::Success)
    }
}
