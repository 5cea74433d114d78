//! Parses command-line arguments for the shell.

use clap::Parser;

/// Command-line arguments accepted by the shell.
#[derive(Parser)]
#[clap(name = "nacre", version, about = "POSIX-focused shell")]
pub(crate) struct CommandLineArgs {
    /// Execute the provided command string, then exit.
    #[clap(short = 'c', value_name = "COMMAND")]
    pub command: Option<String>,

    /// Read commands from standard input.
    #[clap(short = 's')]
    pub read_commands_from_stdin: bool,

    /// Run in interactive mode.
    #[clap(short = 'i')]
    pub interactive: bool,

    /// Make the shell act as if it had been invoked as a login shell.
    #[clap(short = 'l', long = "login")]
    pub login: bool,

    /// Exit immediately on a command failing with non-zero status.
    #[clap(short = 'e')]
    pub exit_on_nonzero_command_exit: bool,

    /// Parse commands without executing them.
    #[clap(short = 'n')]
    pub do_not_execute_commands: bool,

    /// Disable pathname expansion.
    #[clap(short = 'f')]
    pub disable_filename_globbing: bool,

    /// Treat expansion of unset variables as an error.
    #[clap(short = 'u')]
    pub treat_unset_variables_as_error: bool,

    /// Print input lines as they are read.
    #[clap(short = 'v')]
    pub print_shell_input_lines: bool,

    /// Print commands and arguments as they execute.
    #[clap(short = 'x')]
    pub print_commands_and_arguments: bool,

    /// Export variables whenever they are assigned.
    #[clap(short = 'a')]
    pub export_variables_on_modification: bool,

    /// Disallow overwriting existing regular files via `>` redirection.
    #[clap(short = 'C')]
    pub disallow_overwriting_regular_files_via_output_redirection: bool,

    /// Enable job control.
    #[clap(short = 'm')]
    pub enable_job_control: bool,

    /// Enable the named option (as with `set -o`).
    #[clap(short = 'o', value_name = "OPTION")]
    pub enabled_options: Vec<String>,

    /// Path to a script to execute (or, with -c, the value for $0).
    pub script_path: Option<String>,

    /// Arguments to pass to the script as positional parameters.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub script_args: Vec<String>,
}

impl CommandLineArgs {
    /// Maps the parsed arguments onto shell-creation options.
    pub fn to_create_options(&self) -> nacre_core::CreateOptions {
        // With -c, the first operand (if any) provides $0 and the rest become
        // positional parameters; otherwise the operands name a script and its
        // parameters.
        let (shell_name, shell_args) = if self.command.is_some() {
            (
                self.script_path.clone(),
                self.script_args.clone(),
            )
        } else if let Some(script_path) = &self.script_path {
            (Some(script_path.clone()), self.script_args.clone())
        } else {
            (None, vec![])
        };

        let interactive = self.interactive
            || (self.command.is_none() && self.script_path.is_none() && is_stdin_a_terminal());

        nacre_core::CreateOptions {
            shell_name: shell_name.or_else(|| Some("nacre".to_owned())),
            shell_args,
            interactive,
            login: self.login || is_login_invocation(),
            exit_on_nonzero_command_exit: self.exit_on_nonzero_command_exit,
            do_not_execute_commands: self.do_not_execute_commands,
            disable_filename_globbing: self.disable_filename_globbing,
            treat_unset_variables_as_error: self.treat_unset_variables_as_error,
            print_shell_input_lines: self.print_shell_input_lines,
            print_commands_and_arguments: self.print_commands_and_arguments,
            export_variables_on_modification: self.export_variables_on_modification,
            disallow_overwriting_regular_files_via_output_redirection: self
                .disallow_overwriting_regular_files_via_output_redirection,
            enable_job_control: self.enable_job_control,
            ..nacre_core::CreateOptions::default()
        }
    }
}

fn is_stdin_a_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal()
}

fn is_login_invocation() -> bool {
    std::env::args()
        .next()
        .is_some_and(|argv0| argv0.starts_with('-'))
}
