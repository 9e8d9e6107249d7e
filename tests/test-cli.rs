use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::tempdir;

fn linemerge() -> Command {
    Command::new(env!("CARGO_BIN_EXE_linemerge"))
}

#[test]
pub fn test_cli_merges_files_with_stdin_closed() {
    let logdir = tempdir().unwrap();
    let path_a = logdir.path().join("a.log");
    let path_b = logdir.path().join("b.log");
    std::fs::write(&path_a, "x\ny\n").unwrap();
    std::fs::write(&path_b, "p\nq\n").unwrap();

    let output = linemerge()
        .arg(&path_a)
        .arg(&path_b)
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert!(output.status.success());

    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 4);

    // Each line exactly once, interleaved rather than a.log then b.log.
    assert!(lines[..2].contains(&"x"));
    assert!(lines[..2].contains(&"p"));

    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec!["p", "q", "x", "y"]);
}

#[test]
pub fn test_cli_stdin_only() {
    let mut child = linemerge()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"1\n2\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, b"1\n2\n");
}

#[test]
pub fn test_cli_no_input_at_all() {
    let output = linemerge().stdin(Stdio::null()).output().unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
pub fn test_cli_drops_trailing_fragment() {
    let mut child = linemerge()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"a\nb\nc")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout, b"a\nb\n");
}

#[test]
pub fn test_cli_open_failure_exits_nonzero() {
    let logdir = tempdir().unwrap();
    let missing = logdir.path().join("missing.log");

    let output = linemerge()
        .arg(&missing)
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("linemerge:"));
    assert!(stderr.contains("failed to open"));
}
