//! Execution of parsed shell programs.

use std::collections::VecDeque;
use std::io::Write;
#[cfg(target_os = "linux")]
use std::os::fd::AsFd;
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::sync::Arc;
use std::sync::OnceLock;

use itertools::Itertools;
use nacre_parser::ast;

use crate::commands::{self, CommandSpawnResult};
use crate::env::EnvironmentScope;
use crate::openfiles::{self, OpenFile, OpenFiles};
use crate::shell::Shell;
use crate::variables::ShellVariable;
use crate::{error, expansion, functions, jobs, sys, traps};

/// Encapsulates the result of executing a command.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// The numerical exit code of the command.
    pub exit_code: u8,
    /// Whether the shell should exit after this command.
    pub exit_shell: bool,
    /// Whether the shell should return from the current function or script.
    pub return_from_function_or_script: bool,
    /// If the command was executed in a loop, this is the number of levels to break out of.
    pub break_loop: Option<u8>,
    /// If the command was executed in a loop, this is the number of levels to continue.
    pub continue_loop: Option<u8>,
}

impl From<std::process::ExitStatus> for ExecutionResult {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            #[allow(clippy::cast_sign_loss)]
            return Self::new((code & 0xFF) as u8);
        }

        #[cfg(unix)]
        if let Some(signal) = status.signal() {
            #[allow(clippy::cast_sign_loss)]
            return Self::new((signal & 0xFF) as u8 + 128);
        }

        tracing::error!("unhandled process exit");
        Self::new(127)
    }
}

impl ExecutionResult {
    /// Returns a new `ExecutionResult` with the given exit code.
    ///
    /// # Parameters
    /// - `exit_code` - The exit code of the command.
    pub fn new(exit_code: u8) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    /// Returns a new `ExecutionResult` with an exit code of 0.
    pub fn success() -> Self {
        Self::new(0)
    }

    /// Returns whether the command was successful.
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns whether the result carries no control-flow request.
    pub const fn is_normal_flow(&self) -> bool {
        !self.exit_shell
            && !self.return_from_function_or_script
            && self.break_loop.is_none()
            && self.continue_loop.is_none()
    }
}

/// Encapsulates the context of execution in a command pipeline.
struct PipelineExecutionContext<'a> {
    /// The shell in which the command is being executed.
    shell: &'a mut Shell,

    current_pipeline_index: usize,
    pipeline_len: usize,
    output_pipes: &'a mut Vec<openfiles::OpenPipeReader>,

    process_group_id: Option<i32>,
}

/// Parameters for execution.
#[derive(Clone, Default)]
pub struct ExecutionParameters {
    /// The open files tracked by the current context.
    pub open_files: OpenFiles,
    /// Policy for how to manage spawned external processes.
    pub process_group_policy: ProcessGroupPolicy,
}

impl ExecutionParameters {
    /// Returns the standard output file; usable with `write!` et al.
    pub fn stdout(&self) -> OpenFile {
        self.open_files
            .stdout()
            .map(|f| f.try_dup().unwrap())
            .unwrap_or_else(|| OpenFile::Stdout(std::io::stdout()))
    }

    /// Returns the standard error file; usable with `write!` et al.
    pub fn stderr(&self) -> OpenFile {
        self.open_files
            .stderr()
            .map(|f| f.try_dup().unwrap())
            .unwrap_or_else(|| OpenFile::Stderr(std::io::stderr()))
    }
}

/// Policy for how to manage spawned external processes.
#[derive(Clone, Debug, Default)]
pub enum ProcessGroupPolicy {
    /// Place the process in a new process group.
    #[default]
    NewProcessGroup,
    /// Place the process in the same process group as its parent.
    SameProcessGroup,
}

/// Trait implemented by all executable AST nodes.
#[async_trait::async_trait]
pub trait Execute {
    /// Executes the node against the given shell.
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error>;
}

#[async_trait::async_trait]
trait ExecuteInPipeline {
    async fn execute_in_pipeline(
        &self,
        context: &mut PipelineExecutionContext<'_>,
        params: ExecutionParameters,
    ) -> Result<CommandSpawnResult, error::Error>;
}

#[async_trait::async_trait]
impl Execute for ast::Program {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let mut result = ExecutionResult::success();

        for command in &self.complete_commands {
            result = command.execute(shell, params).await?;
            if result.exit_shell || result.return_from_function_or_script {
                break;
            }
        }

        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

#[async_trait::async_trait]
impl Execute for ast::CompoundList {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let mut result = ExecutionResult::success();

        for ast::CompoundListItem(ao_list, sep) in &self.0 {
            // Dispatch any traps whose signals arrived while the previous
            // command was running.
            shell.run_pending_traps(params).await?;

            let run_async = matches!(sep, ast::SeparatorOperator::Async);

            if run_async {
                let job = spawn_ao_list_in_task(ao_list, shell, params);
                let job_formatted = job.to_pid_style_string();

                if shell.options.interactive && !shell.is_subshell() {
                    writeln!(params.stderr(), "{job_formatted}")?;
                }

                result = ExecutionResult::success();
            } else {
                result = ao_list.execute(shell, params).await?;
            }

            // Check for early return.
            if !result.is_normal_flow() {
                break;
            }
        }

        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

fn spawn_ao_list_in_task<'a>(
    ao_list: &ast::AndOrList,
    shell: &'a mut Shell,
    params: &ExecutionParameters,
) -> &'a jobs::Job {
    // Clone the inputs for the background task.
    let mut cloned_shell = shell.clone();
    let cloned_params = params.clone();
    let cloned_ao_list = ao_list.clone();

    // The background task shouldn't interact with the terminal, and reports
    // the first process it spawns through the job's pid slot.
    let pid_slot: jobs::PidSlot = Arc::new(OnceLock::new());
    cloned_shell.options.interactive = false;
    cloned_shell.bg_pid_slot = Some(pid_slot.clone());

    let join_handle = tokio::spawn(async move {
        cloned_ao_list
            .execute(&mut cloned_shell, &cloned_params)
            .await
    });

    shell.jobs.add(jobs::Job::new(
        join_handle,
        pid_slot,
        ao_list.to_string(),
    ))
}

#[async_trait::async_trait]
impl Execute for ast::AndOrList {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let mut result = self.first.execute(shell, params).await?;

        // Track whether the most recently executed pipeline is one whose
        // failure errexit should honor: the failure must not be "tested" by a
        // following && or ||, nor inverted with '!'.
        let mut errexit_applicable = self.additional.is_empty() && !self.first.bang;

        for (i, next_ao) in self.additional.iter().enumerate() {
            if !result.is_normal_flow() {
                break;
            }

            let (is_and, pipeline) = match next_ao {
                ast::AndOr::And(p) => (true, p),
                ast::AndOr::Or(p) => (false, p),
            };

            // On short-circuit, skip evaluating this pipeline; a subsequent
            // one may still run, depending on the operator before it.
            if is_and {
                if !result.is_success() {
                    continue;
                }
            } else if result.is_success() {
                continue;
            }

            result = pipeline.execute(shell, params).await?;
            errexit_applicable = i == self.additional.len() - 1 && !pipeline.bang;
        }

        shell.apply_errexit_if_applicable(&mut result, errexit_applicable);

        Ok(result)
    }
}

#[async_trait::async_trait]
impl Execute for ast::Pipeline {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        // Spawn all the commands of the pipeline, connecting outputs/inputs
        // with pipes as needed.
        let spawn_results = spawn_pipeline_processes(self, shell, params).await?;

        // Wait for the processes; this also updates pipeline status.
        let mut result =
            wait_for_pipeline_processes_and_update_status(spawn_results, shell).await?;

        // Invert the exit code if requested.
        if self.bang {
            result.exit_code = if result.exit_code == 0 { 1 } else { 0 };
        }

        shell.last_exit_status = result.exit_code;

        Ok(result)
    }
}

async fn spawn_pipeline_processes(
    pipeline: &ast::Pipeline,
    shell: &mut Shell,
    params: &ExecutionParameters,
) -> Result<VecDeque<CommandSpawnResult>, error::Error> {
    let pipeline_len = pipeline.seq.len();
    let mut output_pipes = vec![];
    let mut spawn_results = VecDeque::new();
    let mut process_group_id: Option<i32> = None;

    for (current_pipeline_index, command) in pipeline.seq.iter().enumerate() {
        // A single command runs directly in the current shell; each command of
        // a longer pipeline runs against a cloned subshell so its state
        // changes stay confined to its own stage.
        if pipeline_len > 1 {
            let mut subshell = shell.clone();
            let mut pipeline_context = PipelineExecutionContext {
                shell: &mut subshell,
                current_pipeline_index,
                pipeline_len,
                output_pipes: &mut output_pipes,
                process_group_id,
            };

            let mut cmd_params = params.clone();

            // Make sure that all commands in the pipeline are in the same
            // process group.
            if current_pipeline_index > 0 {
                cmd_params.process_group_policy = ProcessGroupPolicy::SameProcessGroup;
            }

            spawn_results.push_back(
                command
                    .execute_in_pipeline(&mut pipeline_context, cmd_params)
                    .await?,
            );
            process_group_id = pipeline_context.process_group_id;
        } else {
            let mut pipeline_context = PipelineExecutionContext {
                shell: &mut *shell,
                current_pipeline_index,
                pipeline_len,
                output_pipes: &mut output_pipes,
                process_group_id,
            };

            spawn_results.push_back(
                command
                    .execute_in_pipeline(&mut pipeline_context, params.clone())
                    .await?,
            );
            process_group_id = pipeline_context.process_group_id;
        }
    }

    Ok(spawn_results)
}

async fn wait_for_pipeline_processes_and_update_status(
    mut process_spawn_results: VecDeque<CommandSpawnResult>,
    shell: &mut Shell,
) -> Result<ExecutionResult, error::Error> {
    let mut result = ExecutionResult::success();

    // Clear out the pipeline status so we can start filling it out.
    shell.last_pipeline_statuses.clear();

    while let Some(child) = process_spawn_results.pop_front() {
        result = child.wait().await?;
        shell.last_exit_status = result.exit_code;
        shell.last_pipeline_statuses.push(result.exit_code);
    }

    // Under pipefail, the pipeline's status is the rightmost non-zero status
    // (or zero if every command succeeded).
    if shell.options.return_last_failure_from_pipeline {
        if let Some(status) = shell
            .last_pipeline_statuses
            .iter()
            .rev()
            .find(|status| **status != 0)
        {
            result.exit_code = *status;
        }
    }

    Ok(result)
}

#[async_trait::async_trait]
impl ExecuteInPipeline for ast::Command {
    async fn execute_in_pipeline(
        &self,
        pipeline_context: &mut PipelineExecutionContext<'_>,
        mut params: ExecutionParameters,
    ) -> Result<CommandSpawnResult, error::Error> {
        if pipeline_context.shell.options.do_not_execute_commands {
            return Ok(CommandSpawnResult::ImmediateExit(0));
        }

        match self {
            Self::Simple(simple) => simple.execute_in_pipeline(pipeline_context, params).await,
            Self::Compound(compound, redirects) => {
                // Set up pipelining.
                setup_pipeline_redirection(&mut params.open_files, pipeline_context)?;

                // Set up any additional redirects.
                if let Some(redirects) = redirects {
                    for redirect in &redirects.0 {
                        if let Err(e) =
                            setup_redirect(pipeline_context.shell, &mut params, redirect).await
                        {
                            writeln!(params.stderr(), "nacre: {e}")?;
                            return Ok(CommandSpawnResult::ImmediateExit(1));
                        }
                    }
                }

                let result = compound.execute(pipeline_context.shell, &params).await?;
                if result.exit_shell {
                    Ok(CommandSpawnResult::ExitShell(result.exit_code))
                } else if result.return_from_function_or_script {
                    Ok(CommandSpawnResult::ReturnFromFunctionOrScript(
                        result.exit_code,
                    ))
                } else if let Some(count) = result.break_loop {
                    Ok(CommandSpawnResult::BreakLoop(count))
                } else if let Some(count) = result.continue_loop {
                    Ok(CommandSpawnResult::ContinueLoop(count))
                } else {
                    Ok(CommandSpawnResult::ImmediateExit(result.exit_code))
                }
            }
            Self::Function(func) => {
                let result = func.execute(pipeline_context.shell, &params).await?;
                Ok(CommandSpawnResult::ImmediateExit(result.exit_code))
            }
        }
    }
}

enum WhileOrUntil {
    While,
    Until,
}

#[async_trait::async_trait]
impl Execute for ast::CompoundCommand {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        match self {
            Self::BraceGroup(ast::BraceGroupCommand(g)) => g.execute(shell, params).await,
            Self::Subshell(ast::SubshellCommand(s)) => {
                // Clone off a new subshell, and run the body of the subshell
                // there.
                let mut subshell = shell.clone();
                let subshell_result = s.execute(&mut subshell, params).await?;

                // Preserve the subshell's exit code, but don't honor any of
                // its requests to exit the shell, break out of loops, etc.
                Ok(ExecutionResult::new(subshell_result.exit_code))
            }
            Self::ForClause(f) => f.execute(shell, params).await,
            Self::CaseClause(c) => c.execute(shell, params).await,
            Self::IfClause(i) => i.execute(shell, params).await,
            Self::WhileClause(w) => (WhileOrUntil::While, w).execute(shell, params).await,
            Self::UntilClause(u) => (WhileOrUntil::Until, u).execute(shell, params).await,
        }
    }
}

#[async_trait::async_trait]
impl Execute for ast::ForClauseCommand {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let mut result = ExecutionResult::success();

        // If we were given explicit words to iterate over, expand them all,
        // with splitting enabled; otherwise use the positional parameters.
        let mut expanded_values = vec![];
        if let Some(unexpanded_values) = &self.values {
            for value in unexpanded_values {
                let mut expanded =
                    expansion::full_expand_and_split_word(shell, params, value).await?;
                expanded_values.append(&mut expanded);
            }
        } else {
            expanded_values.extend_from_slice(&shell.positional_parameters);
        }

        for value in expanded_values {
            if shell.options.print_commands_and_arguments {
                if let Some(unexpanded_values) = &self.values {
                    shell.trace_command(
                        params,
                        std::format!(
                            "for {} in {}",
                            self.variable_name,
                            unexpanded_values.iter().join(" ")
                        ),
                    )?;
                } else {
                    shell.trace_command(params, std::format!("for {}", self.variable_name))?;
                }
            }

            // Update the iteration variable.
            expansion::assign_to_named_variable(shell, &self.variable_name, value)?;

            result = self.body.0.execute(shell, params).await?;
            if result.exit_shell || result.return_from_function_or_script {
                break;
            }

            if let Some(continue_count) = &result.continue_loop {
                if *continue_count == 0 {
                    result.continue_loop = None;
                } else {
                    result.continue_loop = Some(*continue_count - 1);
                    break;
                }
            }
            if let Some(break_count) = &result.break_loop {
                if *break_count == 0 {
                    result.break_loop = None;
                } else {
                    result.break_loop = Some(*break_count - 1);
                }
                break;
            }
        }

        shell.last_exit_status = result.exit_code;
        Ok(result)
    }
}

#[async_trait::async_trait]
impl Execute for ast::CaseClauseCommand {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        if shell.options.print_commands_and_arguments {
            shell.trace_command(params, std::format!("case {} in", &self.value))?;
        }

        let expanded_value = expansion::basic_expand_word(shell, params, &self.value).await?;
        let mut result: ExecutionResult = ExecutionResult::success();

        for case in &self.cases {
            let mut matches = false;
            for pattern in &case.patterns {
                let expanded_pattern =
                    expansion::basic_expand_pattern(shell, params, pattern).await?;

                if expanded_pattern.exactly_matches(expanded_value.as_str())? {
                    matches = true;
                    break;
                }
            }

            if !matches {
                continue;
            }

            result = if let Some(case_cmd) = &case.cmd {
                case_cmd.execute(shell, params).await?
            } else {
                ExecutionResult::success()
            };

            // First matching item wins.
            break;
        }

        shell.last_exit_status = result.exit_code;

        Ok(result)
    }
}

#[async_trait::async_trait]
impl Execute for ast::IfClauseCommand {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        // Condition failures are "tested" and never trigger errexit.
        shell.errexit_suppression_count += 1;
        let condition = self.condition.execute(shell, params).await;
        shell.errexit_suppression_count -= 1;
        let condition = condition?;

        if condition.is_success() {
            return self.then.execute(shell, params).await;
        }

        if let Some(elses) = &self.elses {
            for else_clause in elses {
                match &else_clause.condition {
                    Some(else_condition) => {
                        shell.errexit_suppression_count += 1;
                        let else_condition_result = else_condition.execute(shell, params).await;
                        shell.errexit_suppression_count -= 1;
                        let else_condition_result = else_condition_result?;
                        if else_condition_result.is_success() {
                            return else_clause.body.execute(shell, params).await;
                        }
                    }
                    None => {
                        return else_clause.body.execute(shell, params).await;
                    }
                }
            }
        }

        let result = ExecutionResult::success();
        shell.last_exit_status = result.exit_code;

        Ok(result)
    }
}

#[async_trait::async_trait]
impl Execute for (WhileOrUntil, &ast::WhileOrUntilClauseCommand) {
    async fn execute(
        &self,
        shell: &mut Shell,
        params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        let is_while = matches!(self.0, WhileOrUntil::While);
        let test_condition = &self.1 .0;
        let body = &self.1 .1;

        let mut result = ExecutionResult::success();

        loop {
            shell.errexit_suppression_count += 1;
            let condition_result = test_condition.execute(shell, params).await;
            shell.errexit_suppression_count -= 1;
            let condition_result = condition_result?;

            if condition_result.exit_shell || condition_result.return_from_function_or_script {
                result.exit_code = condition_result.exit_code;
                result.exit_shell = condition_result.exit_shell;
                result.return_from_function_or_script =
                    condition_result.return_from_function_or_script;
                break;
            }

            if condition_result.is_success() != is_while {
                break;
            }

            result = body.0.execute(shell, params).await?;
            if result.exit_shell || result.return_from_function_or_script {
                break;
            }

            if let Some(continue_count) = &result.continue_loop {
                if *continue_count == 0 {
                    result.continue_loop = None;
                } else {
                    result.continue_loop = Some(*continue_count - 1);
                    break;
                }
            }
            if let Some(break_count) = &result.break_loop {
                if *break_count == 0 {
                    result.break_loop = None;
                } else {
                    result.break_loop = Some(*break_count - 1);
                }
                break;
            }
        }

        Ok(result)
    }
}

#[async_trait::async_trait]
impl Execute for ast::FunctionDefinition {
    async fn execute(
        &self,
        shell: &mut Shell,
        _params: &ExecutionParameters,
    ) -> Result<ExecutionResult, error::Error> {
        // The registry takes shared ownership of the definition; the program
        // tree this node came from stays intact.
        shell.funcs.update(
            self.fname.clone(),
            functions::FunctionRegistration::from(self.clone()),
        );

        let result = ExecutionResult::success();
        shell.last_exit_status = result.exit_code;

        Ok(result)
    }
}

#[async_trait::async_trait]
impl ExecuteInPipeline for ast::SimpleCommand {
    async fn execute_in_pipeline(
        &self,
        context: &mut PipelineExecutionContext<'_>,
        mut params: ExecutionParameters,
    ) -> Result<CommandSpawnResult, error::Error> {
        let prefix_iter = self.prefix.as_ref().map(|s| s.0.iter()).unwrap_or_default();
        let suffix_iter = self.suffix.as_ref().map(|s| s.0.iter()).unwrap_or_default();
        let cmd_name_items = self
            .word_or_name
            .as_ref()
            .map(|won| ast::CommandPrefixOrSuffixItem::Word(won.clone()));

        // Set up pipelining.
        setup_pipeline_redirection(&mut params.open_files, context)?;

        let mut assignments = vec![];
        let mut args: Vec<String> = vec![];

        for item in prefix_iter.chain(cmd_name_items.iter()).chain(suffix_iter) {
            match item {
                ast::CommandPrefixOrSuffixItem::IoRedirect(redirect) => {
                    if let Err(e) = setup_redirect(context.shell, &mut params, redirect).await {
                        writeln!(params.stderr(), "nacre: {e}")?;
                        return Ok(CommandSpawnResult::ImmediateExit(1));
                    }
                }
                ast::CommandPrefixOrSuffixItem::AssignmentWord(assignment, word) => {
                    if args.is_empty() {
                        // We haven't yet seen the command word, so this is a
                        // proper scoped assignment.
                        assignments.push(assignment);
                    } else {
                        // It *looks* like an assignment, but it's an ordinary
                        // argument to the command.
                        let mut next_args =
                            expansion::full_expand_and_split_word(context.shell, &params, word)
                                .await?;
                        args.append(&mut next_args);
                    }
                }
                ast::CommandPrefixOrSuffixItem::Word(arg) => {
                    let mut next_args =
                        expansion::full_expand_and_split_word(context.shell, &params, arg).await?;

                    if args.is_empty() {
                        if let Some(cmd_name) = next_args.first() {
                            if let Some(alias_value) = context.shell.aliases.get(cmd_name.as_str())
                            {
                                // Substitute the alias text for the command
                                // word. Alias processing belongs earlier in
                                // the pipeline; this covers the common cases.
                                let mut alias_pieces: Vec<_> = alias_value
                                    .split_ascii_whitespace()
                                    .map(|i| i.to_owned())
                                    .collect();

                                next_args.remove(0);
                                alias_pieces.append(&mut next_args);

                                next_args = alias_pieces;
                            }
                        }
                    }

                    args.append(&mut next_args);
                }
            }
        }

        // If we have a command, then execute it.
        if let Some(cmd_name) = args.first().cloned() {
            execute_command(context, params, cmd_name, assignments, args).await
        } else {
            // Reset last status.
            context.shell.last_exit_status = 0;

            // No command to run; assignments apply to this shell.
            for assignment in assignments {
                apply_assignment(
                    assignment,
                    context.shell,
                    &params,
                    false,
                    EnvironmentScope::Global,
                )
                .await?;
            }

            // Return the last exit status we have; an expansion (notably a
            // command substitution) may have stored a non-zero status there.
            Ok(CommandSpawnResult::ImmediateExit(
                context.shell.last_exit_status,
            ))
        }
    }
}

async fn execute_command(
    context: &mut PipelineExecutionContext<'_>,
    params: ExecutionParameters,
    cmd_name: String,
    assignments: Vec<&ast::Assignment>,
    args: Vec<String>,
) -> Result<CommandSpawnResult, error::Error> {
    // Push an ephemeral environment scope for the duration of the command;
    // assignment prefixes land there, tagged as exported, and are reverted
    // when the scope pops.
    context.shell.env.push_scope(EnvironmentScope::Command);
    for assignment in &assignments {
        apply_assignment(
            assignment,
            context.shell,
            &params,
            true,
            EnvironmentScope::Command,
        )
        .await?;
    }

    if context.shell.options.print_commands_and_arguments {
        let formatted = args
            .iter()
            .map(|arg| crate::escape::quote_if_needed(arg))
            .join(" ");
        context.shell.trace_command(&params, formatted)?;
    }

    // Keep `$_` pointing at the last argument of the command being launched.
    let last_arg = args.last().map_or(cmd_name.as_str(), |a| a.as_str());
    let mut underscore_var = ShellVariable::new(last_arg);
    underscore_var.export();
    let _ = context
        .shell
        .env
        .add("_", underscore_var, EnvironmentScope::Global);

    let cmd_context = commands::ExecutionContext {
        shell: &mut *context.shell,
        command_name: cmd_name,
        params,
    };

    let mut process_group_id = context.process_group_id;

    // Execute.
    let execution_result = commands::execute(
        cmd_context,
        &mut process_group_id,
        args,
        true, /* use functions? */
    )
    .await;

    context.process_group_id = process_group_id;

    // Pop off that ephemeral environment scope.
    context.shell.env.pop_scope(EnvironmentScope::Command)?;

    execution_result
}

async fn apply_assignment(
    assignment: &ast::Assignment,
    shell: &mut Shell,
    params: &ExecutionParameters,
    export: bool,
    creation_scope: EnvironmentScope,
) -> Result<(), error::Error> {
    // Expand the value.
    let value = expansion::basic_expand_word(shell, params, &assignment.value).await?;

    if shell.options.print_commands_and_arguments {
        shell.trace_command(params, std::format!("{}={value}", assignment.name))?;
    }

    if matches!(creation_scope, EnvironmentScope::Command) {
        // Overlay assignments always shadow in the command scope and are
        // exported to the command's environment.
        let mut var = ShellVariable::new(value);
        var.export();
        shell.env.add(assignment.name.clone(), var, creation_scope)?;
    } else {
        shell
            .env
            .update_or_add(assignment.name.as_str(), value, creation_scope)?;

        if export || shell.options.export_variables_on_modification {
            if let Some((_, var)) = shell.env.get_mut(assignment.name.as_str()) {
                var.export();
            }
        }
    }

    Ok(())
}

fn setup_pipeline_redirection(
    open_files: &mut OpenFiles,
    context: &mut PipelineExecutionContext<'_>,
) -> Result<(), error::Error> {
    if context.current_pipeline_index > 0 {
        // Find the stdout from the preceding process.
        if let Some(preceding_output_reader) = context.output_pipes.pop() {
            // Set up stdin of this process to take stdout of the preceding process.
            open_files.set(
                OpenFiles::STDIN_FD,
                OpenFile::PipeReader(preceding_output_reader),
            );
        } else {
            open_files.set(OpenFiles::STDIN_FD, openfiles::null()?);
        }
    }

    // If this is a non-last command in a multi-command pipeline, then we need
    // to arrange to redirect output to a pipe that we can read later.
    if context.pipeline_len > 1 && context.current_pipeline_index < context.pipeline_len - 1 {
        // Set up stdout of this process to go to stdin of the succeeding process.
        let (reader, writer) = openfiles::pipe()?;
        context.output_pipes.push(reader);
        open_files.set(OpenFiles::STDOUT_FD, writer.into());
    }

    Ok(())
}

/// Applies a single redirection to the given execution parameters.
///
/// # Arguments
///
/// * `shell` - The shell in which the redirection is being applied.
/// * `params` - The execution parameters owning the fd table to mutate.
/// * `redirect` - The redirection to apply.
pub(crate) async fn setup_redirect(
    shell: &mut Shell,
    params: &'_ mut ExecutionParameters,
    redirect: &ast::IoRedirect,
) -> Result<(), error::Error> {
    match redirect {
        ast::IoRedirect::File(specified_fd_num, kind, target) => {
            match target {
                ast::IoFileRedirectTarget::Filename(f) => {
                    let mut options = std::fs::File::options();

                    // A redirection target must expand to exactly one field.
                    let mut expanded_fields =
                        expansion::full_expand_and_split_word(shell, params, f).await?;

                    if expanded_fields.len() != 1 {
                        return Err(error::Error::InvalidRedirection);
                    }

                    let expanded_file_path =
                        shell.get_absolute_path(expanded_fields.remove(0).as_str());

                    let default_fd_if_unspecified = get_default_fd_for_redirect_kind(kind);
                    match kind {
                        ast::IoFileRedirectKind::Read => {
                            options.read(true);
                        }
                        ast::IoFileRedirectKind::Write => {
                            if shell
                                .options
                                .disallow_overwriting_regular_files_via_output_redirection
                            {
                                // noclobber applies only when the target is an
                                // existing regular file.
                                if expanded_file_path.is_file() {
                                    options.create_new(true);
                                } else {
                                    options.create(true);
                                    options.truncate(true);
                                }
                                options.write(true);
                            } else {
                                options.create(true);
                                options.write(true);
                                options.truncate(true);
                            }
                        }
                        ast::IoFileRedirectKind::Append => {
                            options.create(true);
                            options.append(true);
                        }
                        ast::IoFileRedirectKind::ReadAndWrite => {
                            options.create(true);
                            options.read(true);
                            options.write(true);
                        }
                        ast::IoFileRedirectKind::Clobber => {
                            options.create(true);
                            options.write(true);
                            options.truncate(true);
                        }
                        ast::IoFileRedirectKind::DuplicateInput => {
                            options.read(true);
                        }
                        ast::IoFileRedirectKind::DuplicateOutput => {
                            options.create(true);
                            options.write(true);
                        }
                    }

                    let fd_num = specified_fd_num.unwrap_or(default_fd_if_unspecified);

                    let opened_file =
                        options.open(expanded_file_path.as_path()).map_err(|err| {
                            error::Error::RedirectionFailure(
                                expanded_file_path.to_string_lossy().to_string(),
                                err,
                            )
                        })?;

                    params.open_files.set(fd_num, OpenFile::File(opened_file));
                }

                ast::IoFileRedirectTarget::Duplicate(word) => {
                    let default_fd_if_unspecified = match kind {
                        ast::IoFileRedirectKind::DuplicateInput => 0,
                        ast::IoFileRedirectKind::DuplicateOutput => 1,
                        _ => {
                            return Err(error::Error::InvalidRedirection);
                        }
                    };

                    let fd_num = specified_fd_num.unwrap_or(default_fd_if_unspecified);

                    let mut expanded_fields =
                        expansion::full_expand_and_split_word(shell, params, word).await?;

                    if expanded_fields.len() != 1 {
                        return Err(error::Error::InvalidRedirection);
                    }

                    let mut expanded = expanded_fields.remove(0);

                    // A trailing '-' means "close after duplicating"; alone it
                    // means "close the target fd".
                    let dash = if expanded.ends_with('-') {
                        expanded.pop();
                        true
                    } else {
                        false
                    };

                    if expanded.is_empty() {
                        // Nothing to duplicate.
                    } else if expanded.chars().all(|c: char| c.is_ascii_digit()) {
                        let source_fd_num = expanded
                            .parse::<u32>()
                            .map_err(|_| error::Error::InvalidRedirection)?;

                        // Duplicate the fd.
                        let target_file = if let Some(f) = params.open_files.get(source_fd_num) {
                            f.try_dup()?
                        } else {
                            return Err(error::Error::BadFileDescriptor(source_fd_num));
                        };

                        params.open_files.set(fd_num, target_file);
                    } else {
                        return Err(error::Error::InvalidRedirection);
                    }

                    if dash {
                        // Close the specified fd. Ignore it if it's not open.
                        params.open_files.remove(fd_num);
                    }
                }
            }
        }

        ast::IoRedirect::HereDocument(fd_num, io_here) => {
            // If not specified, default to stdin (fd 0).
            let fd_num = fd_num.unwrap_or(0);

            // Expand if required.
            let io_here_doc = if io_here.requires_expansion {
                expansion::basic_expand_word(shell, params, &io_here.doc).await?
            } else {
                io_here.doc.flatten()
            };

            let f = setup_open_file_with_contents(io_here_doc.as_str())?;

            params.open_files.set(fd_num, f);
        }
    }

    Ok(())
}

const fn get_default_fd_for_redirect_kind(kind: &ast::IoFileRedirectKind) -> u32 {
    match kind {
        ast::IoFileRedirectKind::Read => 0,
        ast::IoFileRedirectKind::Write => 1,
        ast::IoFileRedirectKind::Append => 1,
        ast::IoFileRedirectKind::ReadAndWrite => 0,
        ast::IoFileRedirectKind::Clobber => 1,
        ast::IoFileRedirectKind::DuplicateInput => 0,
        ast::IoFileRedirectKind::DuplicateOutput => 1,
    }
}

#[allow(unused_variables)]
fn setup_open_file_with_contents(contents: &str) -> Result<OpenFile, error::Error> {
    let (reader, mut writer) = sys::pipes::pipe()?;

    let bytes = contents.as_bytes();

    // Grow the pipe to fit the full contents so the write below can't block
    // waiting on a reader.
    #[cfg(target_os = "linux")]
    {
        let len = i32::try_from(bytes.len())?;
        nix::fcntl::fcntl(reader.as_fd(), nix::fcntl::FcntlArg::F_SETPIPE_SZ(len))?;
    }

    writer.write_all(bytes)?;
    drop(writer);

    Ok(OpenFile::PipeReader(openfiles::OpenPipeReader::from(
        reader,
    )))
}

/// Runs the configured handler for the given trapped signal.
///
/// # Arguments
///
/// * `shell` - The shell to run the handler in.
/// * `params` - Execution parameters in effect.
/// * `signal` - The trapped signal whose handler should run.
pub(crate) async fn run_trap_handler(
    shell: &mut Shell,
    params: &ExecutionParameters,
    signal: traps::TrapSignal,
) -> Result<(), error::Error> {
    let Some(handler_command) = shell.traps.get_handler(signal).map(|s| s.to_owned()) else {
        return Ok(());
    };

    // The handler must not perturb `$?` for the surrounding command sequence.
    let saved_status = shell.last_exit_status;

    shell.traps.handler_depth += 1;
    let result = shell.run_string(handler_command, params).await;
    shell.traps.handler_depth -= 1;

    shell.last_exit_status = saved_status;

    result.map(|_| ())
}
