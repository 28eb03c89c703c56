use std::io::{Read, Write};
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn jsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

/// Runs raw bytes (no implicit trailing newline, no implicit `exit`) and
/// waits for the child's own EOF handling to end the process. Used for the
/// Ctrl-C/Ctrl-D byte-level scenarios.
fn run_shell_raw(bytes: &[u8]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn jsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin.write_all(bytes).expect("write bytes");
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn echo_prints_its_arguments() {
    let output = run_shell(&["echo hello world"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello world"), "stdout was: {stdout}");
}

#[test]
fn double_quotes_keep_internal_spacing_but_words_still_split_on_whitespace() {
    let output = run_shell(&[r#"echo "a b"  c"#]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("a b c"), "stdout was: {stdout}");
}

#[test]
fn truncating_redirect_overwrites_on_each_run() {
    let path = std::env::temp_dir().join(format!("jsh-it-truncate-{}", std::process::id()));
    let cmd = format!("echo foo > {}", path.display());
    let _ = run_shell(&[&cmd]);
    let _ = run_shell(&[&cmd]);

    let contents = std::fs::read_to_string(&path).expect("read redirected file");
    assert_eq!(contents, "foo\n");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn appending_redirect_accumulates_across_runs() {
    let path = std::env::temp_dir().join(format!("jsh-it-append-{}", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let cmd = format!("echo foo >> {}", path.display());
    let _ = run_shell(&[&cmd]);
    let _ = run_shell(&[&cmd]);

    let contents = std::fs::read_to_string(&path).expect("read redirected file");
    assert_eq!(contents, "foo\nfoo\n");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn stderr_only_redirect_leaves_stdout_untouched_and_file_empty() {
    let path = std::env::temp_dir().join(format!("jsh-it-stderr-{}", std::process::id()));
    let cmd = format!("echo a 2> {}", path.display());
    let output = run_shell(&[&cmd]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains('a'), "stdout was: {stdout}");
    let contents = std::fs::read_to_string(&path).expect("read redirected file");
    assert!(contents.is_empty(), "stderr file contents: {contents:?}");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn bare_and_explicit_fd_one_redirect_are_equivalent() {
    let path_bare = std::env::temp_dir().join(format!("jsh-it-bare-{}", std::process::id()));
    let path_fd1 = std::env::temp_dir().join(format!("jsh-it-fd1-{}", std::process::id()));

    let _ = run_shell(&[&format!("echo x > {}", path_bare.display())]);
    let _ = run_shell(&[&format!("echo x 1> {}", path_fd1.display())]);

    let bare = std::fs::read_to_string(&path_bare).expect("read bare redirect file");
    let fd1 = std::fs::read_to_string(&path_fd1).expect("read fd1 redirect file");
    assert_eq!(bare, fd1);
    let _ = std::fs::remove_file(&path_bare);
    let _ = std::fs::remove_file(&path_fd1);
}

#[test]
fn unknown_command_reports_not_found_on_stderr() {
    let output = run_shell(&["definitely-not-a-real-command-xyz"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("definitely-not-a-real-command-xyz: command not found"),
        "stderr was: {stderr}"
    );
}

#[test]
fn unterminated_double_quote_is_reported_as_a_syntax_error() {
    let output = run_shell(&["echo \"unterminated"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("syntax error"), "stderr was: {stderr}");
}

#[test]
fn cd_with_too_many_arguments_is_rejected() {
    let output = run_shell(&["cd one two"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cd: too many arguments"),
        "stderr was: {stderr}"
    );
}

#[test]
fn exit_out_of_range_is_rejected_and_shell_keeps_running() {
    let output = run_shell(&["exit 256", "echo still-alive"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stderr.contains("exit code must be 0-255"),
        "stderr was: {stderr}"
    );
    assert!(stdout.contains("still-alive"), "stdout was: {stdout}");
}

#[cfg(unix)]
#[test]
fn ctrl_d_closes_a_spawned_childs_stdin_and_it_exits_cleanly() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn jsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin.write_all(b"cat\n").expect("write cat");
        // Ctrl-D as the very first byte the supervisor relays closes the
        // child's stdin; `cat` then exits 0 on its own EOF.
        stdin.write_all(&[0x04]).expect("write ctrl-d");
    }

    let output = child.wait_with_output().expect("wait output");
    assert!(output.status.success(), "status was: {:?}", output.status);
}

#[cfg(unix)]
#[test]
fn ctrl_c_discards_the_in_progress_line_without_running_it() {
    // `echo` only appears if the aborted line were (wrongly) dispatched.
    let output = run_shell_raw(b"echo should-not-run\x03\nexit\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        !stdout.contains("should-not-run\n"),
        "stdout was: {stdout}"
    );
}

#[test]
fn help_lists_all_six_builtins() {
    let output = run_shell(&["help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["help", "exit", "echo", "type", "pwd", "cd"] {
        assert!(stdout.contains(name), "stdout missing {name}: {stdout}");
    }
}

#[test]
fn type_reports_a_builtin_and_an_external_command_differently() {
    let output = run_shell(&["type echo", "type sh"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("echo is a shell builtin"), "stdout was: {stdout}");
    assert!(stdout.contains("sh is "), "stdout was: {stdout}");
}

#[test]
fn no_arguments_are_accepted_on_invocation() {
    let output = Command::new(env!("CARGO_BIN_EXE_jsh"))
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("spawn jsh --help");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no arguments supported"),
        "stderr was: {stderr}"
    );
}

#[cfg(unix)]
#[test]
fn external_command_runs_to_completion_and_its_output_is_relayed() {
    let output = run_shell(&["sh -c 'echo from-child'"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("from-child"), "stdout was: {stdout}");
}

#[test]
fn eof_on_stdin_with_no_trailing_exit_still_terminates_the_shell() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn jsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "echo last-line").expect("write line");
    }
    // Dropping `child.stdin` (end of scope above) closes the pipe, which is
    // the only EOF signal this test sends.

    let mut stdout = String::new();
    child
        .stdout
        .take()
        .expect("stdout")
        .read_to_string(&mut stdout)
        .expect("read stdout");
    let status = child.wait().expect("wait");

    assert!(status.success(), "status was: {status:?}");
    assert!(stdout.contains("last-line"), "stdout was: {stdout}");
}
