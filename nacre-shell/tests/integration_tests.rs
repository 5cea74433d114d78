//! End-to-end tests driving the built shell binary.

#![cfg(unix)]
#![allow(clippy::panic_in_result_fn)]

use std::process::{Command, Output};

use anyhow::Result;

fn run_shell(args: &[&str]) -> Result<Output> {
    let shell_path = assert_cmd::cargo::cargo_bin("nacre");
    Ok(Command::new(shell_path).args(args).output()?)
}

fn run_command(script: &str) -> Result<Output> {
    run_shell(&["-c", script])
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn simple_command_writes_stdout() -> Result<()> {
    let output = run_command("echo hello")?;
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "hello\n");
    Ok(())
}

#[test]
fn and_or_list_short_circuits() -> Result<()> {
    let output = run_command("false && echo x || echo y")?;
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "y\n");
    Ok(())
}

#[test]
fn assignment_prefix_feeds_child_environment() -> Result<()> {
    let output = run_command("A=1 B=2 env | grep ^A=")?;
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "A=1\n");

    // The parent's A/B remain unset afterwards.
    let output = run_command("A=1 env >/dev/null; echo \"${A:-unset}\"")?;
    assert_eq!(stdout_of(&output), "unset\n");
    Ok(())
}

#[test]
fn subshell_directory_change_is_confined() -> Result<()> {
    let output = run_command("cd /; ( cd /tmp; pwd ); pwd")?;
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "/tmp\n/\n");
    Ok(())
}

#[test]
fn for_loop_iterates() -> Result<()> {
    let output = run_command("for i in a b c; do echo $i; done; echo last=$i")?;
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "a\nb\nc\nlast=c\n");
    Ok(())
}

#[test]
fn heredoc_expands_parameters() -> Result<()> {
    let output = run_command("GREETED=you; cat <<EOF\nhello $GREETED\nEOF")?;
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "hello you\n");
    Ok(())
}

#[test]
fn exit_status_propagates_to_caller() -> Result<()> {
    let output = run_command("exit 42")?;
    assert_eq!(output.status.code(), Some(42));

    let output = run_command("this-command-does-not-exist-anywhere")?;
    assert_eq!(output.status.code(), Some(127));
    Ok(())
}

#[test]
fn positional_parameters_from_command_line() -> Result<()> {
    let output = run_shell(&["-c", "echo $0 $1 $2 $#", "myshell", "first", "second"])?;
    assert_eq!(stdout_of(&output), "myshell first second 2\n");
    Ok(())
}

#[test]
fn script_file_execution() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let script_path = dir.path().join("script.sh");
    std::fs::write(&script_path, "echo script running as $0 with $1\nexit 7\n")?;

    let script_str = script_path.to_string_lossy();
    let output = run_shell(&[script_str.as_ref(), "arg1"])?;
    assert_eq!(output.status.code(), Some(7));
    assert_eq!(
        stdout_of(&output),
        format!("script running as {script_str} with arg1\n")
    );
    Ok(())
}

#[test]
fn errexit_flag_stops_execution() -> Result<()> {
    let output = run_shell(&["-e", "-c", "echo one; false; echo two"])?;
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_of(&output), "one\n");
    Ok(())
}

#[test]
fn xtrace_flag_traces_commands() -> Result<()> {
    let output = run_shell(&["-x", "-c", "echo traced"])?;
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stdout_of(&output), "traced\n");
    assert!(stderr.contains("+ echo traced"));
    Ok(())
}

#[test]
fn pipeline_exit_status_comes_from_last_command() -> Result<()> {
    let output = run_command("false | true")?;
    assert_eq!(output.status.code(), Some(0));

    let output = run_shell(&["-o", "pipefail", "-c", "false | true"])?;
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

#[test]
fn functions_work_end_to_end() -> Result<()> {
    let output = run_command("greet() { echo hi $1; }; greet there")?;
    assert_eq!(stdout_of(&output), "hi there\n");
    Ok(())
}

#[test]
fn case_patterns_match() -> Result<()> {
    let output = run_command("case $(echo abc) in a*) echo starts-with-a;; *) echo other;; esac")?;
    assert_eq!(stdout_of(&output), "starts-with-a\n");
    Ok(())
}

#[test]
fn exit_trap_runs_at_shutdown() -> Result<()> {
    let output = run_command("trap 'echo trapped' EXIT; echo body")?;
    assert_eq!(stdout_of(&output), "body\ntrapped\n");
    Ok(())
}

#[test]
fn signal_termination_status_mapping() -> Result<()> {
    let output = run_command("sh -c 'kill -9 $$'")?;
    assert_eq!(output.status.code(), Some(128 + 9));
    Ok(())
}
