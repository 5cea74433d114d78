//! Core implementation of a POSIX shell: state, word expansion, redirection,
//! process and pipeline management, and an AST-directed interpreter.

pub mod builtins;
mod callstack;
mod commands;
mod env;
mod error;
mod escape;
mod expansion;
mod functions;
mod interp;
mod jobs;
mod openfiles;
mod options;
mod pathsearch;
mod patterns;
mod processes;
mod shell;
mod sys;
mod traps;
mod variables;

pub use callstack::{CallFrame, CallStack, FrameKind};
pub use commands::ExecutionContext;
pub use env::{valid_variable_name, EnvironmentScope, ShellEnvironment};
pub use error::Error;
pub use functions::{FunctionEnv, FunctionRegistration};
pub use interp::{Execute, ExecutionParameters, ExecutionResult, ProcessGroupPolicy};
pub use jobs::{Job, JobManager, JobState};
pub use openfiles::{OpenFile, OpenFiles, OpenPipeReader, OpenPipeWriter};
pub use options::RuntimeOptions;
pub use patterns::Pattern;
pub use shell::{CreateOptions, Shell};
pub use traps::{TrapHandlerConfig, TrapSignal};
pub use variables::ShellVariable;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn test_shell() -> Result<Shell> {
        let options = CreateOptions {
            shell_name: Some("nacre".into()),
            ..CreateOptions::default()
        };
        Ok(Shell::new(&options)?)
    }

    async fn run(shell: &mut Shell, command: &str) -> Result<u8> {
        let params = shell.default_exec_params();
        let result = shell.run_string(command, &params).await?;
        Ok(result.exit_code)
    }

    async fn run_capturing(shell: &mut Shell, command: &str) -> Result<(u8, String)> {
        use std::io::Read;

        let (reader, writer) = openfiles::pipe()?;
        let mut params = shell.default_exec_params();
        params
            .open_files
            .set(OpenFiles::STDOUT_FD, writer.into());

        let result = shell.run_string(command, &params).await?;
        drop(params);

        let mut reader: OpenFile = reader.into();
        let mut output = String::new();
        reader.read_to_string(&mut output)?;

        Ok((result.exit_code, output))
    }

    #[tokio::test]
    async fn executes_simple_command() -> Result<()> {
        let mut shell = test_shell()?;
        let (status, output) = run_capturing(&mut shell, "echo hello").await?;
        assert_eq!(status, 0);
        assert_eq!(output, "hello\n");
        assert_eq!(shell.last_exit_status, 0);
        Ok(())
    }

    #[tokio::test]
    async fn and_or_list_short_circuits() -> Result<()> {
        let mut shell = test_shell()?;
        let (status, output) = run_capturing(&mut shell, "false && echo x || echo y").await?;
        assert_eq!(status, 0);
        assert_eq!(output, "y\n");
        Ok(())
    }

    #[tokio::test]
    async fn pipeline_reports_last_command_status() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "false | true").await?;
        assert_eq!(status, 0);
        assert_eq!(shell.last_pipeline_statuses, [1, 0]);

        let status = run(&mut shell, "true | false").await?;
        assert_eq!(status, 1);
        Ok(())
    }

    #[tokio::test]
    async fn pipefail_reports_rightmost_failure() -> Result<()> {
        let mut shell = test_shell()?;
        shell.options.return_last_failure_from_pipeline = true;
        let status = run(&mut shell, "false | true").await?;
        assert_eq!(status, 1);
        Ok(())
    }

    #[tokio::test]
    async fn bang_inverts_pipeline_status() -> Result<()> {
        let mut shell = test_shell()?;
        assert_eq!(run(&mut shell, "! false").await?, 0);
        assert_eq!(run(&mut shell, "! true").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn pipeline_moves_data_between_stages() -> Result<()> {
        let mut shell = test_shell()?;
        let (status, output) = run_capturing(&mut shell, "echo hello | cat").await?;
        assert_eq!(status, 0);
        assert_eq!(output, "hello\n");
        Ok(())
    }

    #[tokio::test]
    async fn variable_assignment_and_expansion() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(&mut shell, "GREETING=hi; echo $GREETING").await?;
        assert_eq!(output, "hi\n");
        assert_eq!(shell.env.get_str("GREETING"), Some("hi"));
        Ok(())
    }

    #[tokio::test]
    async fn assignment_prefix_does_not_leak() -> Result<()> {
        let mut shell = test_shell()?;

        // The overlay is visible to the command's environment...
        let (_, output) = run_capturing(&mut shell, "A=1 sh -c 'echo $A'").await?;
        assert_eq!(output, "1\n");

        // ...but not to the parent shell afterwards.
        assert_eq!(shell.env.get_str("A"), None);

        // An existing value is unaffected as well.
        run(&mut shell, "B=original").await?;
        run(&mut shell, "B=override true").await?;
        assert_eq!(shell.env.get_str("B"), Some("original"));

        Ok(())
    }

    #[tokio::test]
    async fn assignment_without_command_sets_current_frame() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "X=value").await?;
        assert_eq!(status, 0);
        assert_eq!(shell.env.get_str("X"), Some("value"));

        let exported = shell
            .env
            .iter_exported()
            .any(|(name, _)| name.as_str() == "X");
        assert!(!exported);
        Ok(())
    }

    #[tokio::test]
    async fn command_substitution_expands() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(&mut shell, "echo $(echo nested)").await?;
        assert_eq!(output, "nested\n");

        // Empty substitution expands to nothing; status of the assignment is 0.
        let status = run(&mut shell, "RESULT=$(true)").await?;
        assert_eq!(status, 0);
        assert_eq!(shell.env.get_str("RESULT"), Some(""));
        Ok(())
    }

    #[tokio::test]
    async fn command_substitution_status_flows_to_bare_assignment() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "RESULT=$(false)").await?;
        assert_eq!(status, 1);
        assert_eq!(shell.last_exit_status, 1);
        Ok(())
    }

    #[tokio::test]
    async fn if_clause_selects_branches() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) =
            run_capturing(&mut shell, "if true; then echo yes; else echo no; fi").await?;
        assert_eq!(output, "yes\n");

        let (_, output) = run_capturing(
            &mut shell,
            "if false; then echo a; elif true; then echo b; else echo c; fi",
        )
        .await?;
        assert_eq!(output, "b\n");

        // Absent branch yields success.
        let status = run(&mut shell, "if false; then echo a; fi").await?;
        assert_eq!(status, 0);
        Ok(())
    }

    #[tokio::test]
    async fn for_loop_iterates_and_binds() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(&mut shell, "for i in a b c; do echo $i; done").await?;
        assert_eq!(output, "a\nb\nc\n");
        assert_eq!(shell.env.get_str("i"), Some("c"));
        Ok(())
    }

    #[tokio::test]
    async fn for_loop_defaults_to_positional_parameters() -> Result<()> {
        let mut shell = test_shell()?;
        shell.positional_parameters = vec!["p1".into(), "p2".into()];
        let (_, output) = run_capturing(&mut shell, "for arg; do echo $arg; done").await?;
        assert_eq!(output, "p1\np2\n");
        Ok(())
    }

    #[tokio::test]
    async fn while_loop_with_break_and_continue() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(
            &mut shell,
            "I=x; while true; do I=$I.; case $I in x...) break;; x..) continue;; esac; echo $I; done",
        )
        .await?;
        assert_eq!(output, "x.\n");
        Ok(())
    }

    #[tokio::test]
    async fn until_loop_runs_until_success() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(
            &mut shell,
            "until true; do echo never; done; echo done",
        )
        .await?;
        assert_eq!(output, "done\n");
        Ok(())
    }

    #[tokio::test]
    async fn case_clause_selects_first_match() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(
            &mut shell,
            "case hello in h*) echo glob;; hello) echo exact;; esac",
        )
        .await?;
        assert_eq!(output, "glob\n");

        let status = run(&mut shell, "case zzz in a) echo a;; esac").await?;
        assert_eq!(status, 0);
        Ok(())
    }

    #[tokio::test]
    async fn subshell_mutations_are_confined() -> Result<()> {
        let mut shell = test_shell()?;
        run(&mut shell, "OUTER=1").await?;
        run(&mut shell, "( OUTER=2; INNER=3; cd / )").await?;

        assert_eq!(shell.env.get_str("OUTER"), Some("1"));
        assert_eq!(shell.env.get_str("INNER"), None);

        // The working directory is also unaffected.
        let expected = shell.working_dir.clone();
        let (_, output) = run_capturing(&mut shell, "pwd").await?;
        assert_eq!(output.trim_end(), expected.to_string_lossy());
        Ok(())
    }

    #[tokio::test]
    async fn subshell_exit_does_not_exit_parent() -> Result<()> {
        let mut shell = test_shell()?;
        let (status, output) = run_capturing(&mut shell, "( exit 3 ); echo after").await?;
        assert_eq!(status, 0);
        assert_eq!(output, "after\n");
        Ok(())
    }

    #[tokio::test]
    async fn functions_define_and_invoke() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(
            &mut shell,
            "greet() { echo hello $1; }; greet world",
        )
        .await?;
        assert_eq!(output, "hello world\n");

        // Redefinition replaces.
        let (_, output) = run_capturing(
            &mut shell,
            "greet() { echo replaced; }; greet",
        )
        .await?;
        assert_eq!(output, "replaced\n");
        Ok(())
    }

    #[tokio::test]
    async fn function_positional_parameters_are_scoped() -> Result<()> {
        let mut shell = test_shell()?;
        shell.positional_parameters = vec!["outer".into()];
        let (_, output) = run_capturing(&mut shell, "f() { echo $1; }; f inner; echo $1").await?;
        assert_eq!(output, "inner\nouter\n");
        Ok(())
    }

    #[tokio::test]
    async fn return_exits_function_only() -> Result<()> {
        let mut shell = test_shell()?;
        let (status, output) =
            run_capturing(&mut shell, "f() { return 7; echo not reached; }; f; echo $?").await?;
        assert_eq!(status, 0);
        assert_eq!(output, "7\n");
        Ok(())
    }

    #[tokio::test]
    async fn redirection_to_file_and_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = dir.path().join("out.txt");
        let file_str = file_path.to_string_lossy().to_string();

        let mut shell = test_shell()?;
        run(&mut shell, &std::format!("echo first > {file_str}")).await?;
        run(&mut shell, &std::format!("echo second >> {file_str}")).await?;
        assert_eq!(std::fs::read_to_string(&file_path)?, "first\nsecond\n");

        let (_, output) = run_capturing(&mut shell, &std::format!("cat < {file_str}")).await?;
        assert_eq!(output, "first\nsecond\n");
        Ok(())
    }

    #[tokio::test]
    async fn redirection_failure_yields_status_one() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "echo hi > /nonexistent-dir-nacre/out").await?;
        assert_eq!(status, 1);
        Ok(())
    }

    #[tokio::test]
    async fn noclobber_prevents_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = dir.path().join("guarded.txt");
        std::fs::write(&file_path, "original")?;
        let file_str = file_path.to_string_lossy().to_string();

        let mut shell = test_shell()?;
        shell
            .options
            .disallow_overwriting_regular_files_via_output_redirection = true;

        let status = run(&mut shell, &std::format!("echo new > {file_str}")).await?;
        assert_eq!(status, 1);
        assert_eq!(std::fs::read_to_string(&file_path)?, "original");

        // `>|` overrides noclobber.
        let status = run(&mut shell, &std::format!("echo new >| {file_str}")).await?;
        assert_eq!(status, 0);
        assert_eq!(std::fs::read_to_string(&file_path)?, "new\n");
        Ok(())
    }

    #[tokio::test]
    async fn fd_duplication_redirects_stderr() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) =
            run_capturing(&mut shell, "sh -c 'echo to-stderr >&2' 2>&1").await?;
        assert_eq!(output, "to-stderr\n");
        Ok(())
    }

    #[tokio::test]
    async fn high_numbered_fd_redirection() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_path = dir.path().join("high-fd.txt");
        let file_str = file_path.to_string_lossy().to_string();

        let mut shell = test_shell()?;
        let status = run(
            &mut shell,
            &std::format!("sh -c 'echo high >&12' 12> {file_str}"),
        )
        .await?;
        assert_eq!(status, 0);
        assert_eq!(std::fs::read_to_string(&file_path)?, "high\n");
        Ok(())
    }

    #[tokio::test]
    async fn here_document_feeds_stdin() -> Result<()> {
        let mut shell = test_shell()?;
        run(&mut shell, "USER_NAME=tester").await?;
        let (_, output) = run_capturing(
            &mut shell,
            "cat <<EOF\nhello $USER_NAME\nEOF\n",
        )
        .await?;
        assert_eq!(output, "hello tester\n");

        // A quoted delimiter suppresses expansion.
        let (_, output) = run_capturing(
            &mut shell,
            "cat <<'EOF'\nhello $USER_NAME\nEOF\n",
        )
        .await?;
        assert_eq!(output, "hello $USER_NAME\n");
        Ok(())
    }

    #[tokio::test]
    async fn special_parameters_track_state() -> Result<()> {
        let mut shell = test_shell()?;

        let (_, output) = run_capturing(&mut shell, "false; echo $?").await?;
        assert_eq!(output, "1\n");

        let (_, output) = run_capturing(&mut shell, "echo $$").await?;
        assert_eq!(output.trim_end(), shell.process_id.to_string());

        shell.positional_parameters = vec!["a".into(), "b".into()];
        let (_, output) = run_capturing(&mut shell, "echo $#").await?;
        assert_eq!(output, "2\n");
        Ok(())
    }

    #[tokio::test]
    async fn unquoted_at_with_no_positionals_produces_no_command() -> Result<()> {
        let mut shell = test_shell()?;
        shell.positional_parameters = vec![];
        let status = run(&mut shell, "$@").await?;
        assert_eq!(status, 0);
        Ok(())
    }

    #[tokio::test]
    async fn empty_command_list_is_success() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "").await?;
        assert_eq!(status, 0);
        let status = run(&mut shell, "# nothing but a comment").await?;
        assert_eq!(status, 0);
        Ok(())
    }

    #[tokio::test]
    async fn errexit_stops_after_untested_failure() -> Result<()> {
        let mut shell = test_shell()?;
        shell.options.exit_on_nonzero_command_exit = true;
        let (status, output) = run_capturing(&mut shell, "echo one; false; echo two").await?;
        assert_eq!(status, 1);
        assert_eq!(output, "one\n");
        Ok(())
    }

    #[tokio::test]
    async fn errexit_ignores_tested_failures() -> Result<()> {
        let mut shell = test_shell()?;
        shell.options.exit_on_nonzero_command_exit = true;
        let (status, output) = run_capturing(
            &mut shell,
            "if false; then echo a; fi; false || echo tested; echo still here",
        )
        .await?;
        assert_eq!(status, 0);
        assert_eq!(output, "tested\nstill here\n");
        Ok(())
    }

    #[tokio::test]
    async fn noexec_skips_commands() -> Result<()> {
        let mut shell = test_shell()?;
        shell.options.do_not_execute_commands = true;
        let (status, output) = run_capturing(&mut shell, "echo should not appear").await?;
        assert_eq!(status, 0);
        assert_eq!(output, "");
        Ok(())
    }

    #[tokio::test]
    async fn exit_status_mapping_for_missing_commands() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "definitely-not-a-command-nacre").await?;
        assert_eq!(status, 127);
        Ok(())
    }

    #[tokio::test]
    async fn signal_termination_maps_to_128_plus_signo() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "sh -c 'kill -TERM $$'").await?;
        assert_eq!(status, 128 + 15);
        Ok(())
    }

    #[tokio::test]
    async fn background_job_is_tracked_and_reaped() -> Result<()> {
        let mut shell = test_shell()?;
        let status = run(&mut shell, "sleep 0.05 &").await?;
        assert_eq!(status, 0);
        assert_eq!(shell.jobs.jobs.len(), 1);

        let completed = shell.jobs.wait_all().await?;
        assert_eq!(completed.len(), 1);
        assert!(matches!(completed[0].state, JobState::Done));
        assert!(shell.jobs.jobs.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn word_splitting_honors_ifs() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(
            &mut shell,
            "VALUE='a:b:c'; IFS=:; set -- $VALUE; echo $#",
        )
        .await?;
        assert_eq!(output, "3\n");
        Ok(())
    }

    #[tokio::test]
    async fn quoting_preserves_fields() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(
            &mut shell,
            "X='one two'; set -- \"$X\"; echo $#; set -- $X; echo $#",
        )
        .await?;
        assert_eq!(output, "1\n2\n");
        Ok(())
    }

    #[tokio::test]
    async fn parameter_default_operators() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(&mut shell, "echo ${UNSET_VAR:-fallback}").await?;
        assert_eq!(output, "fallback\n");

        let (_, output) = run_capturing(&mut shell, "echo ${ASSIGNED:=value}; echo $ASSIGNED").await?;
        assert_eq!(output, "value\nvalue\n");

        let (_, output) = run_capturing(&mut shell, "SET=x; echo ${SET:+alternate}").await?;
        assert_eq!(output, "alternate\n");
        Ok(())
    }

    #[tokio::test]
    async fn parameter_pattern_removal() -> Result<()> {
        let mut shell = test_shell()?;
        let (_, output) = run_capturing(
            &mut shell,
            "F=/a/b/c.txt; echo ${F##*/}; echo ${F%.txt}",
        )
        .await?;
        assert_eq!(output, "c.txt\n/a/b/c\n");
        Ok(())
    }

    #[tokio::test]
    async fn unset_variable_with_nounset_is_an_error() -> Result<()> {
        let mut shell = test_shell()?;
        shell.options.treat_unset_variables_as_error = true;
        let params = shell.default_exec_params();
        let result = shell.run_string("echo $DEFINITELY_UNSET", &params).await;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn run_stream_handles_multi_line_input() -> Result<()> {
        let mut shell = test_shell()?;

        let input = "echo one &&\necho two\n";
        let params = shell.default_exec_params();
        let result = shell.run_stream(input.as_bytes(), &params).await?;
        assert_eq!(result.exit_code, 0);

        // A syntax error stops the stream with status 2.
        let result = shell
            .run_stream("echo fine\n)bad syntax(\necho unreached\n".as_bytes(), &params)
            .await?;
        assert_eq!(result.exit_code, 2);
        Ok(())
    }

    #[tokio::test]
    async fn pathname_expansion_matches_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.nacre"), "")?;
        std::fs::write(dir.path().join("b.nacre"), "")?;

        let options = CreateOptions {
            shell_name: Some("nacre".into()),
            working_dir: Some(dir.path().to_path_buf()),
            ..CreateOptions::default()
        };
        let mut shell = Shell::new(&options)?;

        let (_, output) = run_capturing(&mut shell, "echo *.nacre").await?;
        assert_eq!(output, "a.nacre b.nacre\n");

        // A pattern with no matches stays literal.
        let (_, output) = run_capturing(&mut shell, "echo *.missing").await?;
        assert_eq!(output, "*.missing\n");

        // noglob suppresses expansion entirely.
        shell.options.disable_filename_globbing = true;
        let (_, output) = run_capturing(&mut shell, "echo *.nacre").await?;
        assert_eq!(output, "*.nacre\n");
        Ok(())
    }

    #[tokio::test]
    async fn tilde_expansion_uses_home() -> Result<()> {
        let mut shell = test_shell()?;
        run(&mut shell, "HOME=/tmp/test-home").await?;
        let (_, output) = run_capturing(&mut shell, "echo ~/docs").await?;
        assert_eq!(output, "/tmp/test-home/docs\n");
        Ok(())
    }

    #[tokio::test]
    async fn exit_trap_runs_on_shutdown() -> Result<()> {
        let mut shell = test_shell()?;
        let dir = tempfile::tempdir()?;
        let marker = dir.path().join("trap-ran");
        let marker_str = marker.to_string_lossy().to_string();

        run(
            &mut shell,
            &std::format!("trap 'echo bye > {marker_str}' EXIT"),
        )
        .await?;

        let params = shell.default_exec_params();
        shell.on_exit(&params).await?;

        assert_eq!(std::fs::read_to_string(&marker)?, "bye\n");
        Ok(())
    }
}
