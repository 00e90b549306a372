mod common;

use common::pki;
use std::process::{Command, Output};

fn run(bin: &str, args: &[&str]) -> Output {
    run_with_log(bin, args, "info")
}

fn run_with_log(bin: &str, args: &[&str], filter: &str) -> Output {
    Command::new(bin)
        .args(args)
        .env("RUST_LOG", filter)
        .output()
        .expect("spawn binary")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_exits_zero() {
    let output = run(env!("CARGO_BIN_EXE_advserver"), &["-help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--certopt"));
    assert!(stdout.contains("require certificate and verify it's authorized"));
}

#[test]
fn test_advserver_missing_flags() {
    let output = run(env!("CARGO_BIN_EXE_advserver"), &["-host", "localhost"]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("one or more required flags missing: -srvcert, -cacert, -srvkey"));
    assert!(err.contains("Usage:"));
}

#[test]
fn test_simpleserver_missing_flags() {
    let output = run(env!("CARGO_BIN_EXE_simpleserver"), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("-host, -srvcert, -srvkey"));
}

#[test]
fn test_client_missing_cacert() {
    let output = run(env!("CARGO_BIN_EXE_client"), &["-srvhost", "localhost:1"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("-cacert"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_invalid_certopt() {
    let output = run(
        env!("CARGO_BIN_EXE_advserver"),
        &[
            "-host", "localhost", "-srvcert", "s.crt", "-srvkey", "s.key", "-cacert", "ca.crt",
            "-certopt", "7",
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("invalid value 7"));
}

#[test]
fn test_unreadable_ca_stops_startup() {
    let (_dir, files) = pki("cli-badca");
    let output = run(
        env!("CARGO_BIN_EXE_advserver"),
        &[
            "-host",
            "localhost",
            "-port",
            "0",
            "-srvcert",
            files.server_cert.to_str().unwrap(),
            "-srvkey",
            files.server_key.to_str().unwrap(),
            "-cacert",
            "does/not/exist.crt",
            "-certopt",
            "4",
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to load CA certificate"));
}

#[test]
fn test_fatal_error_survives_silenced_logging() {
    let output = run_with_log(env!("CARGO_BIN_EXE_simpleserver"), &[], "off");
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("one or more required flags missing: -host, -srvcert, -srvkey"));
    assert!(err.contains("Usage:"));
}

#[test]
fn test_gen_certs_accepts_single_dash_flags() {
    let dir = tempfile::tempdir().expect("scratch dir");
    let out_dir = dir.path().join("pki");
    let output = run(
        env!("CARGO_BIN_EXE_gen_certs"),
        &["-out-dir", out_dir.to_str().unwrap(), "-host", "foo.test"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    for name in ["ca.crt", "server.crt", "server.key", "client.crt", "client.key"] {
        assert!(out_dir.join(name).is_file(), "{} missing", name);
    }
}
