//! Command resolution and execution.

#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

#[cfg(unix)]
use command_fds::{CommandFdExt, FdMapping};
use itertools::Itertools;
use nacre_parser::ast;

use crate::interp::{self, Execute, ExecutionParameters, ExecutionResult, ProcessGroupPolicy};
use crate::openfiles::{OpenFile, OpenFiles};
use crate::pathsearch::{self, PathResolution};
use crate::shell::Shell;
use crate::{builtins, error, processes, sys};

/// Represents the result of spawning a command.
pub(crate) enum CommandSpawnResult {
    /// A child process was spawned.
    SpawnedProcess(processes::ChildProcess),
    /// The command immediately exited with the given numeric exit code.
    ImmediateExit(u8),
    /// The shell should exit after this command, yielding the given numeric exit code.
    ExitShell(u8),
    /// The shell should return from the current function or script, yielding
    /// the given numeric exit code.
    ReturnFromFunctionOrScript(u8),
    /// The shell should break out of the containing loop, identified by the
    /// given depth count.
    BreakLoop(u8),
    /// The shell should continue the containing loop, identified by the given
    /// depth count.
    ContinueLoop(u8),
}

impl CommandSpawnResult {
    /// Waits for the command to complete, mapping the outcome onto an
    /// execution result.
    pub async fn wait(self) -> Result<ExecutionResult, error::Error> {
        match self {
            Self::SpawnedProcess(mut child) => {
                let output = child.wait().await?;
                Ok(ExecutionResult::from(output.status))
            }
            Self::ImmediateExit(exit_code) => Ok(ExecutionResult::new(exit_code)),
            Self::ExitShell(exit_code) => Ok(ExecutionResult {
                exit_code,
                exit_shell: true,
                ..ExecutionResult::default()
            }),
            Self::ReturnFromFunctionOrScript(exit_code) => Ok(ExecutionResult {
                exit_code,
                return_from_function_or_script: true,
                ..ExecutionResult::default()
            }),
            Self::BreakLoop(count) => Ok(ExecutionResult {
                break_loop: Some(count),
                ..ExecutionResult::default()
            }),
            Self::ContinueLoop(count) => Ok(ExecutionResult {
                continue_loop: Some(count),
                ..ExecutionResult::default()
            }),
        }
    }
}

/// Represents the context for executing a command.
pub struct ExecutionContext<'a> {
    /// The shell in which the command is being executed.
    pub shell: &'a mut Shell,
    /// The name of the command being executed.
    pub command_name: String,
    /// Parameters for the execution.
    pub params: ExecutionParameters,
}

impl ExecutionContext<'_> {
    /// Returns the standard output file; usable with `write!` et al.
    pub fn stdout(&self) -> OpenFile {
        self.params
            .open_files
            .stdout()
            .map(|f| f.try_dup().unwrap())
            .unwrap_or_else(|| OpenFile::Stdout(std::io::stdout()))
    }

    /// Returns the standard error file; usable with `write!` et al.
    pub fn stderr(&self) -> OpenFile {
        self.params
            .open_files
            .stderr()
            .map(|f| f.try_dup().unwrap())
            .unwrap_or_else(|| OpenFile::Stderr(std::io::stderr()))
    }
}

#[allow(unused_variables)]
pub(crate) fn compose_std_command<S: AsRef<OsStr>>(
    shell: &Shell,
    command_path: &Path,
    argv0: &str,
    args: &[S],
    open_files: OpenFiles,
) -> Result<std::process::Command, error::Error> {
    let mut cmd = std::process::Command::new(command_path);

    // Override argv[0].
    #[cfg(unix)]
    cmd.arg0(argv0);

    // Pass through args.
    for arg in args {
        cmd.arg(arg);
    }

    // Use the shell's current working dir.
    cmd.current_dir(shell.working_dir.as_path());

    // Start with a clear environment, then add in exported variables; inner
    // scopes (notably the per-command assignment overlay) shadow outer ones.
    cmd.env_clear();
    for (name, var) in shell.env.iter_exported() {
        cmd.env(name, var.value());
    }

    let mut open_files = open_files;

    // Redirect stdin, if applicable.
    match open_files.remove(OpenFiles::STDIN_FD) {
        Some(OpenFile::Stdin(_)) | None => (),
        Some(stdin_file) => {
            let as_stdio: Stdio = stdin_file.into();
            cmd.stdin(as_stdio);
        }
    }

    // Redirect stdout, if applicable.
    match open_files.remove(OpenFiles::STDOUT_FD) {
        Some(OpenFile::Stdout(_)) | None => (),
        Some(stdout_file) => {
            let as_stdio: Stdio = stdout_file.into();
            cmd.stdout(as_stdio);
        }
    }

    // Redirect stderr, if applicable.
    match open_files.remove(OpenFiles::STDERR_FD) {
        Some(OpenFile::Stderr(_)) | None => (),
        Some(stderr_file) => {
            let as_stdio: Stdio = stderr_file.into();
            cmd.stderr(as_stdio);
        }
    }

    // Inject any other fds.
    #[cfg(unix)]
    {
        let fd_mappings: Vec<FdMapping> = open_files
            .into_iter()
            .map(|(child_fd, open_file)| {
                Ok(FdMapping {
                    child_fd: i32::try_from(child_fd)?,
                    parent_fd: open_file.into_owned_fd()?,
                })
            })
            .collect::<Result<_, error::Error>>()?;
        cmd.fd_mappings(fd_mappings)
            .map_err(|_e| error::Error::ChildCreationFailure)?;
    }
    #[cfg(not(unix))]
    {
        if open_files.into_iter().next().is_some() {
            return error::unimp("fd redirections on non-Unix platform");
        }
    }

    Ok(cmd)
}

pub(crate) async fn execute(
    cmd_context: ExecutionContext<'_>,
    process_group_id: &mut Option<i32>,
    args: Vec<String>,
    use_functions: bool,
) -> Result<CommandSpawnResult, error::Error> {
    if !cmd_context.command_name.contains('/') {
        let builtin = cmd_context
            .shell
            .builtins
            .get(&cmd_context.command_name)
            .cloned();

        // Special builtins take precedence over functions.
        if builtin.as_ref().is_some_and(|r| r.special_builtin) {
            return execute_builtin_command(&builtin.unwrap(), cmd_context, args).await;
        }

        if use_functions {
            if let Some(func_reg) = cmd_context
                .shell
                .funcs
                .get(cmd_context.command_name.as_str())
            {
                // Strip the function name off args.
                return invoke_shell_function(func_reg.definition.clone(), cmd_context, &args[1..])
                    .await;
            }
        }

        if let Some(builtin) = builtin {
            return execute_builtin_command(&builtin, cmd_context, args).await;
        }
    }

    // Strip the command name off args.
    execute_external_command(cmd_context, process_group_id, &args[1..])
}

pub(crate) fn execute_external_command<S: AsRef<str> + AsRef<OsStr>>(
    context: ExecutionContext<'_>,
    process_group_id: &mut Option<i32>,
    args: &[S],
) -> Result<CommandSpawnResult, error::Error> {
    let mut stderr = context.stderr();

    // Resolve the command name to an executable path.
    let resolution = if context.command_name.contains('/') {
        pathsearch::resolve_direct(context.command_name.as_str())
    } else {
        let path_value = context.shell.env.get_str("PATH").unwrap_or("").to_owned();
        pathsearch::search(context.command_name.as_str(), path_value.as_str())
    };

    let command_path = match resolution {
        PathResolution::Executable(path) => path,
        PathResolution::NotExecutable(_) => {
            writeln!(stderr, "{}: permission denied", context.command_name)?;
            return Ok(CommandSpawnResult::ImmediateExit(126));
        }
        PathResolution::NotFound => {
            writeln!(stderr, "{}: not found", context.command_name)?;
            return Ok(CommandSpawnResult::ImmediateExit(127));
        }
    };

    // Compose the std::process::Command that encapsulates what we want to launch.
    #[allow(unused_mut)]
    let mut cmd = compose_std_command(
        context.shell,
        command_path.as_path(),
        context.command_name.as_str(),
        args,
        context.params.open_files.clone(),
    )?;

    // Place external children in process groups per policy when job control
    // is on.
    #[cfg(unix)]
    if context.shell.options.enable_job_control {
        match context.params.process_group_policy {
            ProcessGroupPolicy::NewProcessGroup => {
                cmd.process_group(0);
            }
            ProcessGroupPolicy::SameProcessGroup => {
                if let Some(pgid) = process_group_id {
                    cmd.process_group(*pgid);
                }
            }
        }
    }

    // When tracing is enabled, report.
    tracing::debug!(
        target: "commands",
        "spawning: {} {}",
        cmd.get_program().to_string_lossy(),
        cmd.get_args()
            .map(|a| a.to_string_lossy().to_string())
            .join(" ")
    );

    match sys::process::spawn(cmd) {
        Ok(child) => {
            let pid = child.id().and_then(|id| i32::try_from(id).ok());

            if process_group_id.is_none() {
                *process_group_id = pid;
            }

            // Report the pid for `$!` if a background job is waiting on it.
            if let (Some(slot), Some(pid)) = (&context.shell.bg_pid_slot, pid) {
                let _ = slot.set(pid);
            }

            Ok(CommandSpawnResult::SpawnedProcess(processes::ChildProcess::new(
                pid, child,
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            writeln!(stderr, "{}: not found", context.command_name)?;
            Ok(CommandSpawnResult::ImmediateExit(127))
        }
        Err(e) => {
            writeln!(stderr, "{}: {e}", context.command_name)?;
            Ok(CommandSpawnResult::ImmediateExit(126))
        }
    }
}

async fn execute_builtin_command(
    builtin: &builtins::Registration,
    context: ExecutionContext<'_>,
    args: Vec<String>,
) -> Result<CommandSpawnResult, error::Error> {
    let command_name = context.command_name.clone();
    let mut stderr = context.stderr();

    let exit_code = match (builtin.execute_func)(context, args).await {
        Ok(builtin_result) => match builtin_result.exit_code {
            builtins::ExitCode::Success => 0,
            builtins::ExitCode::InvalidUsage => 2,
            builtins::ExitCode::Custom(code) => code,
            builtins::ExitCode::ExitShell(code) => {
                return Ok(CommandSpawnResult::ExitShell(code))
            }
            builtins::ExitCode::ReturnFromFunctionOrScript(code) => {
                return Ok(CommandSpawnResult::ReturnFromFunctionOrScript(code))
            }
            builtins::ExitCode::BreakLoop(count) => {
                return Ok(CommandSpawnResult::BreakLoop(count))
            }
            builtins::ExitCode::ContinueLoop(count) => {
                return Ok(CommandSpawnResult::ContinueLoop(count))
            }
        },
        Err(e) => {
            writeln!(stderr, "{command_name}: {e}")?;
            1
        }
    };

    Ok(CommandSpawnResult::ImmediateExit(exit_code))
}

pub(crate) async fn invoke_shell_function(
    function_definition: Arc<ast::FunctionDefinition>,
    mut context: ExecutionContext<'_>,
    args: &[String],
) -> Result<CommandSpawnResult, error::Error> {
    let ast::FunctionBody(body, redirects) = &function_definition.body;

    // Apply any redirects specified at function definition time.
    if let Some(redirects) = redirects {
        for redirect in &redirects.0 {
            interp::setup_redirect(context.shell, &mut context.params, redirect).await?;
        }
    }

    // Temporarily replace positional parameters.
    let prior_positional_params = std::mem::take(&mut context.shell.positional_parameters);
    context.shell.positional_parameters = args.to_vec();

    // Note that we're going deeper. Once we do this, we need to make sure we
    // don't bail early before "exiting" the function.
    context.shell.enter_function(context.command_name.as_str())?;

    // Invoke the function.
    let result = body.execute(context.shell, &context.params).await;

    // We've come back out, reflect it.
    context.shell.leave_function();

    // Restore positional parameters.
    context.shell.positional_parameters = prior_positional_params;

    let result = result?;
    if result.exit_shell {
        Ok(CommandSpawnResult::ExitShell(result.exit_code))
    } else {
        Ok(CommandSpawnResult::ImmediateExit(result.exit_code))
    }
}

/// Runs the given command string in a subshell-like context, capturing its
/// standard output; used for command substitution.
///
/// # Arguments
///
/// * `shell` - The shell performing the substitution.
/// * `params` - Execution parameters in effect.
/// * `s` - The command string to execute.
pub(crate) async fn invoke_command_in_subshell_and_get_output(
    shell: &mut Shell,
    params: &ExecutionParameters,
    s: &str,
) -> Result<String, error::Error> {
    let program = shell.parse_string(s)?;

    // Set up a pipe to receive the command's output.
    let (reader, writer) = crate::openfiles::pipe()?;

    // Clone off a subshell and bind its stdout to the pipe.
    let mut subshell = shell.clone();
    let mut child_params = params.clone();
    child_params
        .open_files
        .set(OpenFiles::STDOUT_FD, writer.into());
    child_params.process_group_policy = ProcessGroupPolicy::SameProcessGroup;

    // Drain the pipe on a blocking thread while the command runs so a large
    // output can't fill the pipe and wedge the child.
    let mut pipe_reader: sys::pipes::PipeReader = reader.0;
    let reader_handle = tokio::task::spawn_blocking(move || {
        let mut output = vec![];
        let _ = std::io::Read::read_to_end(&mut pipe_reader, &mut output);
        output
    });

    let result = program.execute(&mut subshell, &child_params).await;

    // Close our copy of the write end so the reader sees EOF.
    drop(child_params);
    drop(subshell);

    let output = reader_handle.await?;
    let result = result?;

    // The child's exit status becomes visible as `$?`.
    shell.last_exit_status = result.exit_code;

    Ok(String::from_utf8_lossy(output.as_slice()).into_owned())
}
