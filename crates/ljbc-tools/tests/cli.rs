//! End-to-end runs of the `ljbc-dump` binary.

use std::process::{Command, Output};

use camino::Utf8PathBuf;
use ljbc_format::prelude::*;
use ljbc_format::DebugInfo;

fn sample_bytes() -> Vec<u8> {
    let mut script = Script::new();
    script.flags.remove(ScriptFlags::STRIP_DEBUG);
    script.chunk_name = "@sample.lua".into();
    let mut ret = Instruction::with_table(LuaJitOpcodes::opcode("RET0").unwrap(), &LuaJitOpcodes);
    ret.set_d(1).unwrap();
    script.root.code.push(ret);
    script.root.constants.push(GenericConstant::str("hello"));
    script.root.debug = Some(DebugInfo {
        first_line: 3,
        line_count: 1,
        lines: vec![0],
        upvalue_names: Vec::new(),
        locals: Vec::new(),
    });
    script.to_bytes().unwrap()
}

fn dump(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ljbc-dump")).args(args).arg("--color").arg("never").output().unwrap()
}

fn fixture(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> Utf8PathBuf {
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let file = root.join(name);
    std::fs::write(&file, bytes).unwrap();
    file
}

#[test]
fn disasm_summary_and_verify() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "sample.ljbc", &sample_bytes());

    let out = dump(&[file.as_str(), "--disasm", "--summary", "--verify"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stdout.contains("== @sample.lua =="), "{stdout}");
    assert!(stdout.contains("0000 |    3 | RET0"), "{stdout}");
    assert!(stdout.contains("const[0000] = \"hello\""), "{stdout}");
    assert!(stderr.contains("instructions : 1"), "{stderr}");
    assert!(stderr.contains("verify round-trip OK"), "{stderr}");
}

#[test]
fn json_view_carries_script_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "sample.ljbc", &sample_bytes());

    let out = dump(&[file.as_str(), "--json"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["summary"]["prototypes"], 1);
    assert_eq!(v["summary"]["chunk_name"], "@sample.lua");
    assert_eq!(v["script"]["chunk_name"].as_array().map(Vec::len), Some("@sample.lua".len()));
}

#[test]
fn strip_writes_a_smaller_dump_without_debug() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = sample_bytes();
    let file = fixture(&dir, "sample.ljbc", &bytes);
    let out_file = file.with_file_name("stripped.ljbc");

    let out = dump(&[file.as_str(), "--strip", "--out", out_file.as_str()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stripped = std::fs::read(&out_file).unwrap();
    assert!(stripped.len() < bytes.len());
    let script = Script::from_bytes(&stripped).unwrap();
    assert!(!script.has_debug());
    assert!(script.root.debug.is_none());
    assert_eq!(script.root.constants, vec![GenericConstant::str("hello")]);
}

#[test]
fn malformed_input_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let file = fixture(&dir, "bad.ljbc", b"\x1BLX\x02");

    let out = dump(&[file.as_str(), "--summary"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    assert!(stderr.contains("bad.ljbc"), "{stderr}");
}

#[test]
fn no_input_is_an_error() {
    let out = dump(&[]);
    assert!(!out.status.success());
}
