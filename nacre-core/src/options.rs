//! Defines runtime options for the shell.

/// Runtime changeable options for a shell instance.
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    //
    // Single-character options.
    /// -a
    pub export_variables_on_modification: bool,
    /// -b
    pub notify_job_termination_immediately: bool,
    /// -e
    pub exit_on_nonzero_command_exit: bool,
    /// -f
    pub disable_filename_globbing: bool,
    /// -h
    pub remember_command_locations: bool,
    /// -m
    pub enable_job_control: bool,
    /// -n
    pub do_not_execute_commands: bool,
    /// -u
    pub treat_unset_variables_as_error: bool,
    /// -v
    pub print_shell_input_lines: bool,
    /// -x
    pub print_commands_and_arguments: bool,
    /// -C
    pub disallow_overwriting_regular_files_via_output_redirection: bool,

    //
    // Options set through -o.
    /// 'ignoreeof'
    pub ignore_eof: bool,
    /// 'pipefail'
    pub return_last_failure_from_pipeline: bool,
    /// 'posix'
    pub posix_mode: bool,

    //
    // Options set at shell creation time.
    /// Whether the shell is interactive.
    pub interactive: bool,
    /// Whether the shell is a login shell.
    pub login_shell: bool,
}

impl RuntimeOptions {
    /// Returns the set of active single-character option flags, for `$-`.
    pub fn option_flags_str(&self) -> String {
        let mut result = String::new();

        for (c, enabled) in [
            ('a', self.export_variables_on_modification),
            ('b', self.notify_job_termination_immediately),
            ('e', self.exit_on_nonzero_command_exit),
            ('f', self.disable_filename_globbing),
            ('h', self.remember_command_locations),
            ('m', self.enable_job_control),
            ('n', self.do_not_execute_commands),
            ('u', self.treat_unset_variables_as_error),
            ('v', self.print_shell_input_lines),
            ('x', self.print_commands_and_arguments),
            ('C', self.disallow_overwriting_regular_files_via_output_redirection),
            ('i', self.interactive),
        ] {
            if enabled {
                result.push(c);
            }
        }

        result
    }

    /// Tries to set the option with the given single-character name.
    ///
    /// # Arguments
    ///
    /// * `c` - The character naming the option.
    /// * `value` - Whether to enable or disable the option.
    pub fn set_by_char(&mut self, c: char, value: bool) -> bool {
        let field = match c {
            'a' => &mut self.export_variables_on_modification,
            'b' => &mut self.notify_job_termination_immediately,
            'e' => &mut self.exit_on_nonzero_command_exit,
            'f' => &mut self.disable_filename_globbing,
            'h' => &mut self.remember_command_locations,
            'm' => &mut self.enable_job_control,
            'n' => &mut self.do_not_execute_commands,
            'u' => &mut self.treat_unset_variables_as_error,
            'v' => &mut self.print_shell_input_lines,
            'x' => &mut self.print_commands_and_arguments,
            'C' => &mut self.disallow_overwriting_regular_files_via_output_redirection,
            _ => return false,
        };

        *field = value;
        true
    }

    /// Tries to set the option with the given `set -o` style name.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the option.
    /// * `value` - Whether to enable or disable the option.
    pub fn set_by_name(&mut self, name: &str, value: bool) -> bool {
        let field = match name {
            "allexport" => &mut self.export_variables_on_modification,
            "errexit" => &mut self.exit_on_nonzero_command_exit,
            "ignoreeof" => &mut self.ignore_eof,
            "monitor" => &mut self.enable_job_control,
            "noclobber" => &mut self.disallow_overwriting_regular_files_via_output_redirection,
            "noexec" => &mut self.do_not_execute_commands,
            "noglob" => &mut self.disable_filename_globbing,
            "notify" => &mut self.notify_job_termination_immediately,
            "nounset" => &mut self.treat_unset_variables_as_error,
            "pipefail" => &mut self.return_last_failure_from_pipeline,
            "posix" => &mut self.posix_mode,
            "verbose" => &mut self.print_shell_input_lines,
            "xtrace" => &mut self.print_commands_and_arguments,
            _ => return false,
        };

        *field = value;
        true
    }

    /// Iterates over (name, enabled) pairs of all `set -o` style options.
    pub fn iter_named(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        [
            ("allexport", self.export_variables_on_modification),
            ("errexit", self.exit_on_nonzero_command_exit),
            ("ignoreeof", self.ignore_eof),
            ("monitor", self.enable_job_control),
            (
                "noclobber",
                self.disallow_overwriting_regular_files_via_output_redirection,
            ),
            ("noexec", self.do_not_execute_commands),
            ("noglob", self.disable_filename_globbing),
            ("notify", self.notify_job_termination_immediately),
            ("nounset", self.treat_unset_variables_as_error),
            ("pipefail", self.return_last_failure_from_pipeline),
            ("posix", self.posix_mode),
            ("verbose", self.print_shell_input_lines),
            ("xtrace", self.print_commands_and_arguments),
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_by_char_round_trips() {
        let mut options = RuntimeOptions::default();
        assert!(options.set_by_char('e', true));
        assert!(options.exit_on_nonzero_command_exit);
        assert!(options.set_by_char('e', false));
        assert!(!options.exit_on_nonzero_command_exit);
        assert!(!options.set_by_char('Z', true));
    }

    #[test]
    fn set_by_name_matches_char_aliases() {
        let mut options = RuntimeOptions::default();
        assert!(options.set_by_name("xtrace", true));
        assert!(options.print_commands_and_arguments);
        assert!(options.set_by_name("noclobber", true));
        assert!(options.disallow_overwriting_regular_files_via_output_redirection);
        assert!(!options.set_by_name("bogus", true));
    }

    #[test]
    fn option_flags_string_reflects_enabled_options() {
        let mut options = RuntimeOptions::default();
        options.set_by_char('e', true);
        options.set_by_char('x', true);
        let flags = options.option_flags_str();
        assert!(flags.contains('e'));
        assert!(flags.contains('x'));
        assert!(!flags.contains('a'));
    }
}
