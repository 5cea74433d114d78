//! Tests for stdin input handling.
//!
//! These verify that the shell correctly handles multi-line input when
//! reading from stdin (non-interactive mode).

#![cfg(unix)]
#![allow(clippy::panic_in_result_fn)]

use anyhow::Context;
use std::io::Write;
use std::process::{Command, Stdio};

fn spawn_shell_with_stdin(input: &str) -> anyhow::Result<std::process::Output> {
    let shell_path = assert_cmd::cargo::cargo_bin("nacre");

    let mut child = Command::new(&shell_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn nacre")?;

    let stdin = child.stdin.as_mut().context("failed to open stdin")?;
    stdin.write_all(input.as_bytes())?;
    drop(child.stdin.take());

    Ok(child.wait_with_output()?)
}

/// A trailing `&&` requires a continuation line; the stream loop must wait
/// for it instead of reporting a syntax error.
#[test]
fn multiline_continuation_via_stdin() -> anyhow::Result<()> {
    let output = spawn_shell_with_stdin("echo one &&\necho two\n")?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        output.status.success(),
        "nacre should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        stdout.contains("one") && stdout.contains("two"),
        "expected 'one' and 'two' in output, got: {stdout}"
    );

    Ok(())
}

/// A here-document whose body arrives on later lines must also be treated as
/// incomplete input until the end tag shows up.
#[test]
fn heredoc_via_stdin() -> anyhow::Result<()> {
    let output = spawn_shell_with_stdin("cat <<EOF\nhello there\nEOF\n")?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout, "hello there\n");

    Ok(())
}

/// Multi-line control-flow constructs arrive one line at a time.
#[test]
fn multiline_for_loop_via_stdin() -> anyhow::Result<()> {
    let output = spawn_shell_with_stdin("for i in a b c\ndo\necho $i\ndone\n")?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout, "a\nb\nc\n");

    Ok(())
}

/// A syntax error in the stream stops execution with status 2.
#[test]
fn syntax_error_stops_stream() -> anyhow::Result<()> {
    let output = spawn_shell_with_stdin("echo before\n)oops\necho after\n")?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout.contains("before"));
    assert!(!stdout.contains("after"));

    Ok(())
}

/// Blank lines and comments are consumed without affecting `$?`.
#[test]
fn blank_and_comment_lines_are_skipped() -> anyhow::Result<()> {
    let output = spawn_shell_with_stdin("\n# a comment\n\necho ok\n")?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout, "ok\n");

    Ok(())
}
