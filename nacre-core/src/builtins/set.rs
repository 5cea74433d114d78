use std::io::Write;

use itertools::Itertools;

use crate::builtins::{ExitCode, RawCommand};
use crate::{commands, error};

/// Sets shell options and positional parameters.
pub(crate) struct SetCommand {}

impl RawCommand for SetCommand {
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
            // With no arguments, display the visible variables.
            let mut stdout = context.stdout();
            for (name, var) in context
                .shell
                .env
                .iter()
                .sorted_by(|(a, _), (b, _)| a.cmp(b))
            {
                writeln!(
                    stdout,
                    "{name}={}",
                    crate::escape::quote_if_needed(var.value())
                )?;
            }
            stdout.flush()?;
            return Ok(ExitCode::Success);
        }

        let mut iter = args.into_iter();
        let mut new_positional_params: Option<Vec<String>> = None;

        while let Some(arg) = iter.next() {
            if arg == "--" {
                new_positional_params = Some(iter.collect());
                break;
            }

            if arg == "-" {
                // A lone '-' turns off both -x and -v.
                context.shell.options.print_commands_and_arguments = false;
                context.shell.options.print_shell_input_lines = false;
                continue;
            }

            let (enable, flags) = if let Some(flags) = arg.strip_prefix('-') {
                (true, flags)
            } else if let Some(flags) = arg.strip_prefix('+') {
                (false, flags)
            } else {
                // First operand: everything from here on replaces the
                // positional parameters.
                let mut params = vec![arg];
                params.extend(iter);
                new_positional_params = Some(params);
                break;
            };

            let mut flag_chars = flags.chars();
            while let Some(c) = flag_chars.next() {
                if c == 'o' {
                    // The rest of this argument (or the next one) names the
                    // option.
                    let mut option_name: String = flag_chars.by_ref().collect();
                    if option_name.is_empty() {
                        match iter.next() {
                            Some(next) => option_name = next,
                            None => {
                                // Bare -o (or +o): display the option settings.
                                let mut stdout = context.stdout();
                                for (name, value) in context.shell.options.iter_named() {
                                    let formatted = if value { "on" } else { "off" };
                                    writeln!(stdout, "{name:15} {formatted}")?;
                                }
                                stdout.flush()?;
                                continue;
                            }
                        }
                    }

                    if !context
                        .shell
                        .options
                        .set_by_name(option_name.as_str(), enable)
                    {
                        writeln!(stderr, "set: {option_name}: invalid option name")?;
                        return Ok(ExitCode::InvalidUsage);
                    }
                } else if !context.shell.options.set_by_char(c, enable) {
                    writeln!(stderr, "set: invalid option: {c}")?;
                    return Ok(ExitCode::InvalidUsage);
                }
            }
        }

        if let Some(params) = new_positional_params {
            context.shell.positional_parameters = params;
        }

        Ok(ExitCode::Success)
    }
}
