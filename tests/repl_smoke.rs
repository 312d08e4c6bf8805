use std::io::Write;
use std::process::{Command, Stdio};

/// Feed lines to the REPL over stdin and collect stdout.
fn repl(input: &str) -> String {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tarn"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn tarn");
    child
        .stdin
        .as_mut()
        .expect("stdin piped")
        .write_all(input.as_bytes())
        .expect("write to repl");
    let out = child.wait_with_output().expect("repl exited");
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn evaluates_a_line() {
    let out = repl("1 + 2;\n");
    assert!(out.contains("3"), "got: {}", out);
}

#[test]
fn bindings_persist_across_lines() {
    let out = repl("let x = 5;\nx + 3;\n");
    assert!(out.contains("8"), "got: {}", out);
}

#[test]
fn functions_persist_across_lines() {
    let out = repl("let double = fn(x) { x * 2 };\ndouble(4);\n");
    assert!(out.contains("8"), "got: {}", out);
}

#[test]
fn quit_command_exits_cleanly() {
    let out = repl(":quit\nnever evaluated\n");
    assert!(!out.contains("never"), "got: {}", out);
}

#[test]
fn bytecode_toggle_dumps_disassembly() {
    let out = repl(":bytecode\n1 + 2;\n");
    assert!(out.contains("bytecode dump on"), "got: {}", out);
    assert!(out.contains("OpConstant"), "got: {}", out);
    assert!(out.contains("OpAdd"), "got: {}", out);
}

#[test]
fn an_error_does_not_kill_the_session() {
    let out = repl("ghost;\n40 + 2;\n");
    assert!(out.contains("42"), "got: {}", out);
}
