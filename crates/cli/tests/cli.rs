//! Binary-level checks: argument parsing, first-run setup, missing key.

use std::process::{Command, Output};

use tempfile::TempDir;

fn codeclaw(home: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_codeclaw"))
        .args(args)
        .env("HOME", home.path())
        .env("USERPROFILE", home.path())
        .env_remove("CODECLAW_API_KEY")
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("CODECLAW_MODEL")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run codeclaw")
}

#[test]
fn help_lists_flags() {
    let home = TempDir::new().unwrap();
    let out = codeclaw(&home, &["--help"]);
    assert!(out.status.success());
    let help = String::from_utf8_lossy(&out.stdout);
    for flag in ["--message", "--model", "--no-persist", "--init", "--verbose"] {
        assert!(help.contains(flag), "{flag} missing from help");
    }
}

#[test]
fn init_writes_a_loadable_config_once() {
    let home = TempDir::new().unwrap();
    let out = codeclaw(&home, &["--init"]);
    assert!(out.status.success());

    let path = home.path().join(".codeclaw/config.toml");
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("default_model"));

    std::fs::write(&path, "# edited\n").unwrap();
    let out = codeclaw(&home, &["--init"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
}

#[test]
fn missing_api_key_fails_with_instructions() {
    let home = TempDir::new().unwrap();
    let out = codeclaw(&home, &["-m", "hello"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("No API key configured"));
    assert!(stderr.contains("OPENROUTER_API_KEY"));
}
