//! Module defining the core shell structure and behavior.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::env::{EnvironmentScope, ShellEnvironment};
use crate::interp::{Execute, ExecutionParameters, ExecutionResult};
use crate::openfiles::{OpenFile, OpenFiles};
use crate::options::RuntimeOptions;
use crate::variables::ShellVariable;
use crate::{builtins, callstack, error, functions, interp, jobs, sys, traps};

/// Options used when creating a new shell instance.
#[derive(Clone, Default)]
pub struct CreateOptions {
    /// The name of the shell ($0).
    pub shell_name: Option<String>,
    /// Initial positional parameters for the shell.
    pub shell_args: Vec<String>,
    /// Explicitly provided variables, set after inheriting the environment.
    pub vars: Vec<(String, String)>,
    /// Whether to skip inheriting variables from the process environment.
    pub do_not_inherit_env: bool,
    /// The initial working directory; defaults to the process's.
    pub working_dir: Option<PathBuf>,
    /// The file-creation mask to establish, if any.
    pub umask: Option<u32>,
    /// Whether the shell is interactive.
    pub interactive: bool,
    /// Whether the shell is a login shell.
    pub login: bool,
    /// Whether to enable exit-on-error (`set -e`).
    pub exit_on_nonzero_command_exit: bool,
    /// Whether to disable executing commands (`set -n`).
    pub do_not_execute_commands: bool,
    /// Whether to disable pathname expansion (`set -f`).
    pub disable_filename_globbing: bool,
    /// Whether to treat unset variables as errors (`set -u`).
    pub treat_unset_variables_as_error: bool,
    /// Whether to print input lines as they're read (`set -v`).
    pub print_shell_input_lines: bool,
    /// Whether to trace commands before execution (`set -x`).
    pub print_commands_and_arguments: bool,
    /// Whether to export variables on modification (`set -a`).
    pub export_variables_on_modification: bool,
    /// Whether to disallow clobbering files via redirection (`set -C`).
    pub disallow_overwriting_regular_files_via_output_redirection: bool,
    /// Whether to enable job control (`set -m`).
    pub enable_job_control: bool,
    /// Whether to enable strict POSIX compliance mode.
    pub posix_mode: bool,
}

impl RuntimeOptions {
    /// Returns runtime options seeded from shell-creation options.
    pub fn defaults_from(options: &CreateOptions) -> Self {
        Self {
            exit_on_nonzero_command_exit: options.exit_on_nonzero_command_exit,
            do_not_execute_commands: options.do_not_execute_commands,
            disable_filename_globbing: options.disable_filename_globbing,
            treat_unset_variables_as_error: options.treat_unset_variables_as_error,
            print_shell_input_lines: options.print_shell_input_lines,
            print_commands_and_arguments: options.print_commands_and_arguments,
            export_variables_on_modification: options.export_variables_on_modification,
            disallow_overwriting_regular_files_via_output_redirection: options
                .disallow_overwriting_regular_files_via_output_redirection,
            enable_job_control: options.enable_job_control,
            posix_mode: options.posix_mode,
            interactive: options.interactive,
            login_shell: options.login,
            ..Self::default()
        }
    }
}

/// Represents an instance of a shell.
pub struct Shell {
    /// Trap handler configuration for the shell.
    pub traps: traps::TrapHandlerConfig,

    /// Manages files opened and accessible via redirection operators.
    pub open_files: OpenFiles,

    /// The current working directory.
    pub working_dir: PathBuf,

    /// The shell environment, containing shell variables.
    pub env: ShellEnvironment,

    /// Shell function definitions.
    pub funcs: functions::FunctionEnv,

    /// Runtime shell options.
    pub options: RuntimeOptions,

    /// State of managed jobs.
    pub jobs: jobs::JobManager,

    /// Shell aliases.
    pub aliases: HashMap<String, String>,

    /// The status of the last completed command.
    pub last_exit_status: u8,

    /// The status of each of the commands in the last pipeline.
    pub last_pipeline_statuses: Vec<u8>,

    /// Shell name ($0).
    pub shell_name: Option<String>,

    /// Positional parameters ($1 and beyond).
    pub positional_parameters: Vec<String>,

    /// Shell built-in commands.
    pub builtins: HashMap<String, builtins::Registration>,

    /// The process ID of the shell.
    pub process_id: i32,

    /// The process ID of the shell's parent.
    pub parent_process_id: i32,

    /// Function/script call stack.
    pub call_stack: callstack::CallStack,

    /// Clone depth from the original ancestor shell; non-zero in subshells.
    pub(crate) depth: usize,

    /// Non-zero while executing a construct whose failure must not trigger
    /// errexit (e.g. an `if` condition).
    pub(crate) errexit_suppression_count: usize,

    /// Slot through which, when running as a background job, the first
    /// spawned external process ID is reported for `$!`.
    pub(crate) bg_pid_slot: Option<jobs::PidSlot>,
}

impl Clone for Shell {
    fn clone(&self) -> Self {
        Self {
            traps: self.traps.clone(),
            open_files: self.open_files.clone(),
            working_dir: self.working_dir.clone(),
            env: self.env.clone(),
            funcs: self.funcs.clone(),
            options: self.options.clone(),
            jobs: jobs::JobManager::new(),
            aliases: self.aliases.clone(),
            last_exit_status: self.last_exit_status,
            last_pipeline_statuses: self.last_pipeline_statuses.clone(),
            shell_name: self.shell_name.clone(),
            positional_parameters: self.positional_parameters.clone(),
            builtins: self.builtins.clone(),
            process_id: self.process_id,
            parent_process_id: self.parent_process_id,
            call_stack: self.call_stack.clone(),
            depth: self.depth + 1,
            errexit_suppression_count: self.errexit_suppression_count,
            bg_pid_slot: self.bg_pid_slot.clone(),
        }
    }
}

impl Shell {
    /// Returns a new shell instance created with the given options. Does *not*
    /// load any configuration files.
    ///
    /// # Arguments
    ///
    /// * `options` - The options to use when creating the shell.
    pub fn new(options: &CreateOptions) -> Result<Self, error::Error> {
        let mut shell = Self {
            traps: traps::TrapHandlerConfig::default(),
            open_files: OpenFiles::default(),
            working_dir: options
                .working_dir
                .clone()
                .map_or_else(std::env::current_dir, Ok)?,
            env: ShellEnvironment::new(),
            funcs: functions::FunctionEnv::default(),
            options: RuntimeOptions::defaults_from(options),
            jobs: jobs::JobManager::new(),
            aliases: HashMap::new(),
            last_exit_status: 0,
            last_pipeline_statuses: vec![],
            shell_name: options.shell_name.clone(),
            positional_parameters: options.shell_args.clone(),
            builtins: builtins::default_builtins(),
            process_id: sys::users::get_process_id(),
            parent_process_id: sys::users::get_parent_process_id(),
            call_stack: callstack::CallStack::default(),
            depth: 0,
            errexit_suppression_count: 0,
            bg_pid_slot: None,
        };

        // If requested, seed variables from the process environment.
        if !options.do_not_inherit_env {
            for (name, value) in std::env::vars() {
                let mut var = ShellVariable::new(value);
                var.export();
                shell.env.add(name, var, EnvironmentScope::Global)?;
            }
        }

        // Establish well-known variables that aren't inherited.
        if !shell.env.is_set("IFS") {
            shell.env.set_global("IFS", " \t\n")?;
        }
        if !shell.env.is_set("PATH") {
            let default_path = sys::fs::get_default_executable_search_paths().join(":");
            let mut path_var = ShellVariable::new(default_path);
            path_var.export();
            shell.env.add("PATH", path_var, EnvironmentScope::Global)?;
        }
        shell
            .env
            .set_global("PWD", shell.working_dir.to_string_lossy().to_string())?;
        shell.env.set_global("PPID", shell.parent_process_id.to_string())?;

        // Set any explicitly provided variables.
        for (name, value) in &options.vars {
            shell.env.set_global(name.clone(), value.clone())?;
        }

        // Establish the requested file-creation mask.
        if let Some(umask) = options.umask {
            sys::fs::set_umask(umask)?;
        }

        Ok(shell)
    }

    /// Returns whether or not this shell is a subshell.
    pub fn is_subshell(&self) -> bool {
        self.depth > 0
    }

    /// Returns the default execution parameters for this shell.
    pub fn default_exec_params(&self) -> ExecutionParameters {
        ExecutionParameters {
            open_files: self.open_files.clone(),
            ..ExecutionParameters::default()
        }
    }

    /// Returns the file backing this shell's standard error.
    pub fn stderr(&self) -> OpenFile {
        self.open_files
            .stderr()
            .map(|f| f.try_dup().unwrap())
            .unwrap_or_else(|| OpenFile::Stderr(std::io::stderr()))
    }

    /// Returns the options that should be used for parsing shell programs.
    pub fn parser_options(&self) -> nacre_parser::ParserOptions {
        nacre_parser::ParserOptions {
            posix_mode: self.options.posix_mode,
        }
    }

    /// Parses the given string as a shell program.
    ///
    /// # Arguments
    ///
    /// * `s` - The string to parse as a program.
    pub fn parse_string<S: Into<String>>(
        &self,
        s: S,
    ) -> Result<nacre_parser::ast::Program, nacre_parser::ParseError> {
        parse_string_impl(s.into(), self.parser_options())
    }

    /// Parses and executes the given string in the current shell context,
    /// returning the execution result.
    ///
    /// # Arguments
    ///
    /// * `command` - The command string to run.
    /// * `params` - Execution parameters to use.
    pub async fn run_string<S: Into<String>>(
        &mut self,
        command: S,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let program = self.parse_string(command)?;
        program.execute(self, params).await
    }

    /// Parses and executes the given file as a shell script.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the script.
    /// * `args` - Positional parameters to make visible to the script.
    /// * `params` - Execution parameters to use.
    pub async fn run_script<S: Into<String>, I: Iterator<Item = S>>(
        &mut self,
        path: &Path,
        args: I,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let contents = std::fs::read_to_string(path)?;

        let prior_positional_params = std::mem::take(&mut self.positional_parameters);
        let mut args: Vec<String> = args.map(Into::into).collect();
        if args.is_empty() {
            args = prior_positional_params.clone();
        }
        self.positional_parameters = args;

        self.call_stack.push(callstack::CallFrame {
            kind: callstack::FrameKind::Script,
            name: path.to_string_lossy().to_string(),
        })?;

        let mut result = self.run_string(contents, params).await;

        self.call_stack.pop();
        self.positional_parameters = prior_positional_params;

        // A top-of-script `return` is consumed at this boundary.
        if let Ok(inner) = &mut result {
            inner.return_from_function_or_script = false;
        }

        result
    }

    /// Reads commands from the given byte source, accumulating input until a
    /// complete program can be parsed, then executes it; repeats until
    /// end-of-input, a requested exit, or a syntax error.
    ///
    /// # Arguments
    ///
    /// * `reader` - The byte source to consume.
    /// * `params` - Execution parameters to use.
    pub async fn run_stream<R: std::io::Read>(
        &mut self,
        reader: R,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let mut buf_reader = std::io::BufReader::new(reader);
        let mut pending = String::new();
        let mut result = ExecutionResult::success();

        loop {
            let mut line = String::new();
            let n = buf_reader.read_line(&mut line)?;
            let at_eof = n == 0;

            if self.options.print_shell_input_lines && !line.is_empty() {
                write!(self.stderr(), "{line}")?;
            }

            pending.push_str(line.as_str());

            if at_eof && pending.is_empty() {
                break;
            }

            match self.parse_string(pending.as_str()) {
                Ok(program) => {
                    pending.clear();

                    if !program.is_empty() {
                        result = program.execute(self, params).await?;

                        // Reap any background jobs that have finished.
                        let completed = self.jobs.poll();
                        if self.options.interactive {
                            for job in completed {
                                writeln!(self.stderr(), "{job}")?;
                            }
                        }

                        if result.exit_shell {
                            break;
                        }
                    }

                    if at_eof {
                        break;
                    }
                }
                Err(e) if !at_eof && e.is_incomplete() => {
                    // The program is incomplete (unterminated construct or a
                    // here-document awaiting its body); wait for more input.
                    continue;
                }
                Err(e) => {
                    writeln!(self.stderr(), "nacre: {e}")?;
                    self.last_exit_status = 2;
                    result = ExecutionResult::new(2);
                    break;
                }
            }
        }

        Ok(result)
    }

    /// Applies errexit semantics to a result if enabled and appropriate.
    ///
    /// # Arguments
    ///
    /// * `result` - The execution result to potentially modify.
    /// * `applicable` - Whether the failing command's status is untested.
    pub fn apply_errexit_if_applicable(&self, result: &mut ExecutionResult, applicable: bool) {
        if self.options.exit_on_nonzero_command_exit
            && applicable
            && self.errexit_suppression_count == 0
            && !result.is_success()
            && result.is_normal_flow()
        {
            result.exit_shell = true;
        }
    }

    /// Runs handlers for any traps whose signals have been delivered since the
    /// last scan.
    ///
    /// # Arguments
    ///
    /// * `params` - Execution parameters in effect.
    pub async fn run_pending_traps(
        &mut self,
        params: &ExecutionParameters,
    ) -> Result<(), error::Error> {
        // Don't dispatch traps from within a trap handler.
        if self.traps.handler_depth > 0 {
            return Ok(());
        }

        for signo in sys::signal::take_pending_signals() {
            let Ok(signal) = traps::TrapSignal::try_from(signo) else {
                continue;
            };

            interp::run_trap_handler(self, params, signal).await?;
        }

        Ok(())
    }

    /// Runs the EXIT trap (if registered) and restores the signal dispositions
    /// the shell started with. Called once as the shell shuts down.
    ///
    /// # Arguments
    ///
    /// * `params` - Execution parameters in effect.
    pub async fn on_exit(&mut self, params: &ExecutionParameters) -> Result<(), error::Error> {
        interp::run_trap_handler(self, params, traps::TrapSignal::Exit).await?;
        sys::signal::restore_all_dispositions()?;
        Ok(())
    }

    /// Writes an `xtrace` line for the given command to stderr.
    ///
    /// # Arguments
    ///
    /// * `params` - Execution parameters in effect.
    /// * `command` - The already-formatted command text.
    pub fn trace_command<S: AsRef<str>>(
        &mut self,
        params: &ExecutionParameters,
        command: S,
    ) -> Result<(), error::Error> {
        writeln!(params.stderr(), "+ {}", command.as_ref())?;
        Ok(())
    }

    /// Notes entry into the named function.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the function being entered.
    pub fn enter_function(&mut self, name: &str) -> Result<(), error::Error> {
        self.call_stack.push(callstack::CallFrame {
            kind: callstack::FrameKind::Function,
            name: name.to_owned(),
        })
    }

    /// Notes exit from the current function.
    pub fn leave_function(&mut self) {
        self.call_stack.pop();
    }

    /// Returns the value the shell uses for field splitting.
    pub fn ifs(&self) -> String {
        self.env.get_str("IFS").unwrap_or(" \t\n").to_owned()
    }

    /// Returns the first character of `$IFS`, used to join fields in `"$*"`.
    pub fn get_ifs_first_char(&self) -> char {
        self.ifs().chars().next().unwrap_or(' ')
    }

    /// Returns the current user's home directory, if known.
    pub fn home_dir(&self) -> Option<String> {
        if let Some(home) = self.env.get_str("HOME") {
            if !home.is_empty() {
                return Some(home.to_owned());
            }
        }

        sys::users::get_current_user_home_dir().map(|p| p.to_string_lossy().to_string())
    }

    /// Resolves the given path against the shell's working directory.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to resolve.
    pub fn get_absolute_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Updates the shell's working directory, keeping `$PWD` in sync.
    ///
    /// # Arguments
    ///
    /// * `target` - The directory to change to.
    pub fn set_working_dir(&mut self, target: &str) -> Result<(), error::Error> {
        let candidate = self.get_absolute_path(target);

        if !candidate.is_dir() {
            return Err(error::Error::NotADirectory(candidate));
        }

        let canonical = candidate.canonicalize()?;
        self.env
            .set_global("OLDPWD", self.working_dir.to_string_lossy().to_string())?;
        self.env
            .set_global("PWD", canonical.to_string_lossy().to_string())?;
        self.working_dir = canonical;

        Ok(())
    }
}

#[cached::proc_macro::cached(size = 32, result = true)]
fn parse_string_impl(
    s: String,
    parser_options: nacre_parser::ParserOptions,
) -> Result<nacre_parser::ast::Program, nacre_parser::ParseError> {
    let mut parser =
        nacre_parser::Parser::new(std::io::BufReader::new(s.as_bytes()), &parser_options);

    tracing::debug!(target: "parse", "parsing string as program...");
    parser.parse_program()
}
