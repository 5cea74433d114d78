//! Facilities for implementing and managing builtins.

use std::collections::HashMap;
use std::io::Write;

use futures::future::BoxFuture;

use crate::{commands, error};

mod alias_;
mod break_;
mod cd;
mod colon;
mod continue_;
mod dot;
mod eval;
mod exit;
mod export;
mod false_;
mod pwd;
mod readonly;
mod return_;
mod set;
mod shift;
mod trap;
mod true_;
mod umask;
mod unalias;
mod unset;
mod wait;

/// Type of a function implementing a built-in command.
///
/// # Arguments
///
/// * The context in which the command is being executed.
/// * The arguments to the command.
pub type CommandExecuteFunc = fn(
    commands::ExecutionContext<'_>,
    Vec<String>,
) -> BoxFuture<'_, Result<BuiltinResult, error::Error>>;

/// The result of executing a built-in command.
pub struct BuiltinResult {
    /// The exit code from the command.
    pub exit_code: ExitCode,
}

/// An exit code from a built-in command; may carry control flow.
pub enum ExitCode {
    /// The command succeeded.
    Success,
    /// The command was misused.
    InvalidUsage,
    /// A custom numerical exit code.
    Custom(u8),
    /// The shell should exit with the given code.
    ExitShell(u8),
    /// The shell should return from the current function or script.
    ReturnFromFunctionOrScript(u8),
    /// The shell should break out of the given number of enclosing loops.
    BreakLoop(u8),
    /// The shell should continue the loop at the given enclosing depth.
    ContinueLoop(u8),
}

/// Trait implemented by built-in shell commands.
pub trait Command: clap::Parser {
    /// Instantiates the built-in command with the given arguments.
    ///
    /// # Arguments
    ///
    /// * `args` - The arguments to the command, including the command name.
    fn new<I>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = String>,
    {
        Self::try_parse_from(args)
    }

    /// Executes the built-in command in the provided context.
    ///
    /// # Arguments
    ///
    /// * `context` - The context in which the command is being executed.
    // NOTE: we use desugared async here because we need a Send marker.
    fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
    ) -> impl std::future::Future<Output = Result<ExitCode, error::Error>> + std::marker::Send;
}

/// Trait implemented by built-ins that interpret their arguments themselves
/// instead of going through an argument parser.
pub trait RawCommand {
    /// Executes the built-in command in the provided context.
    ///
    /// # Arguments
    ///
    /// * `context` - The context in which the command is being executed.
    /// * `args` - The arguments to the command, not including the command name.
    fn execute(
        &self,
        context: commands::ExecutionContext<'_>,
        args: Vec<String>,
    ) -> impl std::future::Future<Output = Result<ExitCode, error::Error>> + std::marker::Send;

    /// Instantiates the command.
    fn new() -> Self;
}

/// Encapsulates a registration for a built-in command.
#[derive(Clone)]
pub struct Registration {
    /// Function to execute the builtin.
    pub execute_func: CommandExecuteFunc,
    /// Whether the builtin is a POSIX special builtin, found before functions.
    pub special_builtin: bool,
}

impl Registration {
    /// Marks the registration as a special builtin.
    #[must_use]
    pub const fn special(mut self) -> Self {
        self.special_builtin = true;
        self
    }
}

fn exec_builtin<T: Command + Send + Sync>(
    context: commands::ExecutionContext<'_>,
    args: Vec<String>,
) -> BoxFuture<'_, Result<BuiltinResult, error::Error>> {
    Box::pin(async move {
        let command = match T::new(args) {
            Ok(command) => command,
            Err(e) => {
                let mut stderr = context.stderr();
                let _ = write!(stderr, "{e}");
                let _ = stderr.flush();
                return Ok(BuiltinResult {
                    exit_code: ExitCode::InvalidUsage,
                });
            }
        };

        let exit_code = command.execute(context).await?;
        Ok(BuiltinResult { exit_code })
    })
}

fn exec_raw_builtin<T: RawCommand + Send + Sync>(
    context: commands::ExecutionContext<'_>,
    args: Vec<String>,
) -> BoxFuture<'_, Result<BuiltinResult, error::Error>> {
    Box::pin(async move {
        let command = T::new();
        let args = args.into_iter().skip(1).collect();
        let exit_code = command.execute(context, args).await?;
        Ok(BuiltinResult { exit_code })
    })
}

/// Returns a registration for the given argument-parsing builtin.
pub fn builtin<T: Command + Send + Sync>() -> Registration {
    Registration {
        execute_func: exec_builtin::<T>,
        special_builtin: false,
    }
}

/// Returns a registration for the given raw-argument builtin.
pub fn raw_builtin<T: RawCommand + Send + Sync>() -> Registration {
    Registration {
        execute_func: exec_raw_builtin::<T>,
        special_builtin: false,
    }
}

/// Returns the default set of built-in commands.
pub fn default_builtins() -> HashMap<String, Registration> {
    let mut m = HashMap::<String, Registration>::new();

    //
    // POSIX special builtins
    //
    m.insert(":".into(), raw_builtin::<colon::ColonCommand>().special());
    m.insert(".".into(), builtin::<dot::DotCommand>().special());
    m.insert("break".into(), builtin::<break_::BreakCommand>().special());
    m.insert(
        "continue".into(),
        builtin::<continue_::ContinueCommand>().special(),
    );
    m.insert("eval".into(), raw_builtin::<eval::EvalCommand>().special());
    m.insert("exit".into(), builtin::<exit::ExitCommand>().special());
    m.insert(
        "export".into(),
        builtin::<export::ExportCommand>().special(),
    );
    m.insert(
        "readonly".into(),
        builtin::<readonly::ReadonlyCommand>().special(),
    );
    m.insert(
        "return".into(),
        builtin::<return_::ReturnCommand>().special(),
    );
    m.insert("set".into(), raw_builtin::<set::SetCommand>().special());
    m.insert("shift".into(), builtin::<shift::ShiftCommand>().special());
    m.insert("trap".into(), raw_builtin::<trap::TrapCommand>().special());
    m.insert("unset".into(), builtin::<unset::UnsetCommand>().special());

    //
    // Other builtins
    //
    m.insert("alias".into(), builtin::<alias_::AliasCommand>());
    m.insert("cd".into(), builtin::<cd::CdCommand>());
    m.insert("false".into(), raw_builtin::<false_::FalseCommand>());
    m.insert("pwd".into(), builtin::<pwd::PwdCommand>());
    m.insert("true".into(), raw_builtin::<true_::TrueCommand>());
    m.insert("umask".into(), builtin::<umask::UmaskCommand>());
    m.insert("unalias".into(), builtin::<unalias::UnaliasCommand>());
    m.insert("wait".into(), builtin::<wait::WaitCommand>());

    m
}
