//! End-to-end CLI tests against directory-backed module sets.

use assert_cmd::Command;
use predicates::prelude::*;
use retroport_types::{
    decode_module, encode_module, Instr, MethodDescriptor, MethodFlags, MethodSignature,
    ModuleDescriptor,
};
use std::fs;
use std::path::Path;

fn write_module(root: &Path, module: &ModuleDescriptor) {
    let path = root.join(format!("{}.module.json", module.name));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, encode_module(module).unwrap()).unwrap();
}

fn greeter_input(root: &Path) {
    write_module(
        root,
        &ModuleDescriptor::interface("com/example/Greeter").with_method(MethodDescriptor::new(
            "greet",
            "()Ljava/lang/String;",
            MethodFlags::public_instance(),
            Some(vec![Instr::Opaque(1), Instr::Return]),
        )),
    );
    write_module(
        root,
        &ModuleDescriptor::class("com/example/Quiet").with_interface("com/example/Greeter"),
    );
    fs::create_dir_all(root.join("META-INF")).unwrap();
    fs::write(root.join("META-INF/app.properties"), b"key=value").unwrap();
}

fn read_module(root: &Path, name: &str) -> ModuleDescriptor {
    let bytes = fs::read(root.join(format!("{name}.module.json"))).unwrap();
    decode_module(&bytes).unwrap()
}

#[test]
fn test_backports_a_directory() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    greeter_input(input.path());

    Command::cargo_bin("retroport")
        .unwrap()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--out-dir")
        .arg(output.path())
        .assert()
        .success();

    let companion = read_module(output.path(), "com/example/Greeter$");
    assert!(companion.has_method(&MethodSignature::new(
        "greet",
        "(Lcom/example/Greeter;)Ljava/lang/String;"
    )));
    let quiet = read_module(output.path(), "com/example/Quiet");
    assert!(quiet.has_method(&MethodSignature::new("greet", "()Ljava/lang/String;")));
    assert_eq!(
        fs::read(output.path().join("META-INF/app.properties")).unwrap(),
        b"key=value"
    );
}

#[test]
fn test_modern_target_needs_no_companion() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    greeter_input(input.path());

    Command::cargo_bin("retroport")
        .unwrap()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--out-dir")
        .arg(output.path())
        .args(["--target", "v8"])
        .assert()
        .success();

    assert!(!output
        .path()
        .join("com/example/Greeter$.module.json")
        .exists());
}

#[test]
fn test_summary_json_on_stdout() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    greeter_input(input.path());

    Command::cargo_bin("retroport")
        .unwrap()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--out-dir")
        .arg(output.path())
        .args(["--summary-json", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"modules_in\": 2"))
        .stdout(predicate::str::contains("\"companions_emitted\": 1"));
}

#[test]
fn test_no_default_backport_warns() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    greeter_input(input.path());

    Command::cargo_bin("retroport")
        .unwrap()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--out-dir")
        .arg(output.path())
        .arg("--no-default-backport")
        .assert()
        .success()
        .stderr(predicate::str::contains("backporting disabled"));

    assert!(!output
        .path()
        .join("com/example/Greeter$.module.json")
        .exists());
}

#[test]
fn test_missing_input_dir_fails() {
    let output = tempfile::tempdir().unwrap();

    Command::cargo_bin("retroport")
        .unwrap()
        .args(["--input-dir", "/nonexistent/input"])
        .arg("--out-dir")
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("read input directory"));
}

#[test]
fn test_malformed_module_fails_with_offender_named() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("Broken.module.json"), b"{ not json").unwrap();

    Command::cargo_bin("retroport")
        .unwrap()
        .arg("--input-dir")
        .arg(input.path())
        .arg("--out-dir")
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Broken.module.json"));
}
