//! End-to-end tests for the `hulkc` binary.
//!
//! Each test writes a JSON AST (and optionally its source text) to a temp
//! directory, runs `hulkc check`, and asserts on exit status and output.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use hulk_ast::{Ast, AstBuilder, BinaryOp, Param};

fn hulkc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hulkc"))
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write fixture");
    path
}

fn run_check(ast: &Ast, source: Option<&str>, extra: &[&str]) -> Output {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let ast_path = write(temp_dir.path(), "main.json", &ast.to_json());
    let mut cmd = hulkc();
    cmd.arg("check").arg(&ast_path).arg("--no-color");
    if let Some(source) = source {
        let source_path = write(temp_dir.path(), "main.hulk", source);
        cmd.arg("--source").arg(source_path);
    }
    cmd.args(extra).output().expect("failed to invoke hulkc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// 1: function f(a) => a + 1;
/// 2: let x = f(2) in x
fn well_typed() -> Ast {
    let mut b = AstBuilder::new();
    b.at(1);
    let a = b.var("a");
    let one = b.number(1.0);
    let sum = b.binary(BinaryOp::Add, a, one);
    let f = b.function("f", vec![Param::new("a")], None, sum);
    b.at(2);
    let two = b.number(2.0);
    let call = b.call("f", vec![two]);
    let decl = b.var_decl("x", None, call);
    let x = b.var("x");
    let body = b.let_in(vec![decl], x);
    b.finish(vec![f, body])
}

const ILL_TYPED_SOURCE: &str = "function f(a) => a + 1;\nf(\"x\");\n";

/// 1: function f(a) => a + 1;
/// 2: f("x");
fn ill_typed() -> Ast {
    let mut b = AstBuilder::new();
    b.at(1);
    let a = b.var("a");
    let one = b.number(1.0);
    let sum = b.binary(BinaryOp::Add, a, one);
    let f = b.function("f", vec![Param::new("a")], None, sum);
    b.at(2);
    let x = b.string("x");
    let call = b.call("f", vec![x]);
    b.finish(vec![f, call])
}

#[test]
fn well_typed_program_succeeds() {
    let output = run_check(&well_typed(), None, &["--types"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("a: number"), "stdout: {}", out);
    assert!(out.contains("x: number"), "stdout: {}", out);
    assert!(out.contains("ok: program has type number"), "stdout: {}", out);
}

#[test]
fn type_errors_fail_with_diagnostics() {
    let output = run_check(&ill_typed(), Some(ILL_TYPED_SOURCE), &[]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("E0004"), "stderr: {}", err);
    assert!(
        err.contains("function 'f' receives 'number', not 'string' as argument 1"),
        "stderr: {}",
        err
    );
    assert!(err.contains("f(\"x\");"), "stderr: {}", err);
    assert!(err.contains("1 error(s) found"), "stderr: {}", err);
}

#[test]
fn json_diagnostics_are_one_object_per_line() {
    let output = run_check(&ill_typed(), None, &["--json"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    let lines: Vec<&str> = err.lines().collect();
    assert_eq!(lines.len(), 1, "stderr: {}", err);
    let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("valid JSON");
    assert_eq!(parsed["code"], "E0004");
    assert_eq!(parsed["line"], 2);
}

#[test]
fn malformed_ast_is_rejected() {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let ast_path = write(temp_dir.path(), "broken.json", r#"{ "nodes": [], "root": 3 }"#);
    let output = hulkc()
        .arg("check")
        .arg(&ast_path)
        .output()
        .expect("failed to invoke hulkc");
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("root #3 is outside the node arena"), "stderr: {}", err);
}
