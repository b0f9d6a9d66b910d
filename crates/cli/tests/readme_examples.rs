//! Validates that README.md examples still work.
//!
//! This test extracts shell commands from the `bash` blocks of README.md and
//! verifies:
//! 1. Commands succeed
//! 2. Every line following a command appears in its output
//!
//! Run with: cargo test -p filefinder-cli --test readme_examples

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// A README command with the output lines expected from it.
struct Example {
    command: String,
    expected: Vec<String>,
}

/// Extract filefinder commands from README.md
fn extract_examples() -> Vec<Example> {
    let readme = include_str!("../../../README.md");
    let mut examples: Vec<Example> = Vec::new();
    let mut in_code_block = false;

    for line in readme.lines() {
        if line.starts_with("```") {
            in_code_block = !in_code_block && (line.starts_with("```bash") || line.starts_with("```shell"));
            continue;
        }
        if !in_code_block {
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.starts_with("filefinder ") || trimmed.starts_with("$ filefinder ") {
            let command = trimmed.strip_prefix("$ ").unwrap_or(trimmed).to_string();
            examples.push(Example {
                command,
                expected: Vec::new(),
            });
        } else if let Some(example) = examples.last_mut() {
            example.expected.push(trimmed.to_string());
        }
    }

    examples
}

/// Parse a filefinder command into args, handling quotes
fn parse_command(cmd: &str) -> Option<Vec<String>> {
    let args_str = cmd.strip_prefix("filefinder ")?;

    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for c in args_str.chars() {
        match c {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ' ' if !in_single_quote && !in_double_quote => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    Some(args)
}

/// Run the binary without colors and without a user config file.
fn run<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let home = tempfile::tempdir().unwrap();
    Command::new(env!("CARGO_BIN_EXE_filefinder"))
        .args(args)
        .env("NO_COLOR", "1")
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("APPDATA", home.path())
        .env_remove("FILEFINDER_USE_REGEX")
        .env_remove("FILEFINDER_LIMIT")
        .env_remove("FILEFINDER_DEFAULT_DATE")
        .output()
        .expect("Failed to run filefinder")
}

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

#[test]
fn test_readme_examples_parse() {
    let examples = extract_examples();

    assert!(
        examples.len() >= 5,
        "Expected at least 5 filefinder examples in README, found {}",
        examples.len()
    );
    assert!(examples.iter().all(|e| !e.expected.is_empty()));
}

#[test]
fn test_readme_examples_run() {
    let examples = extract_examples();
    let mut failed = Vec::new();

    for example in &examples {
        let Some(args) = parse_command(&example.command) else {
            failed.push(format!("{}: failed to parse", example.command));
            continue;
        };

        let output = run(&args);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            failed.push(format!(
                "{}: exit code {:?}\n{}",
                example.command,
                output.status.code(),
                stderr
            ));
            continue;
        }
        for line in &example.expected {
            if !stdout.contains(line.as_str()) {
                failed.push(format!(
                    "{}: expected '{}' in output:\n{}",
                    example.command, line, stdout
                ));
            }
        }
    }

    println!("\nREADME examples: {} tested", examples.len());

    if !failed.is_empty() {
        eprintln!("\nFailed examples:");
        for f in &failed {
            eprintln!("  - {}", f);
        }
        panic!("{} README examples failed", failed.len());
    }
}

#[test]
fn test_find_on_tree() {
    let dir = tempfile::tempdir().unwrap();
    for day in 1..=5 {
        touch(dir.path(), &format!("2012/sst_201203{day:02}.nc"));
    }
    touch(dir.path(), "2013/sst_20130101.nc");
    touch(dir.path(), "2012/notes.txt");
    let root = dir.path().to_str().unwrap();

    let output = run(["find", root, "%(Y)/sst_%(x).nc"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 6);
    assert_eq!(stdout.lines().next(), Some("2012/sst_20120301.nc"));

    let output = run(["find", root, "%(Y)/sst_%(x).nc", "--fix", "Y=2013", "--date"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "2013-01-01 00:00:00  2013/sst_20130101.nc");

    let output = run([
        "find",
        root,
        "%(Y)/sst_%(x).nc",
        "--after",
        "2012-03-02",
        "--before",
        "2012-03-04",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 3);

    let output = run(["find", root, "%(Y)/sst_%(x).nc", "--min", "x=20130000", "--json"]);
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc.as_array().unwrap().len(), 1);
    assert_eq!(doc[0]["groups"][1]["value"], 20130101);

    let output = run(["find", root, "%(Y)/sst_%(x).nc", "-l", "2"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("4 more files"));
}

#[test]
fn test_errors_exit_nonzero() {
    let cases: [&[&str]; 4] = [
        &["match", "%(Y)_%(m)", "not_a_date"],
        &["regex", "%(Y"],
        &["make", "%(Y)_%(m)", "-f", "Y=2000"],
        &["regex", "%(Y)", "-f", "Y=abcd"],
    ];
    for args in cases {
        let output = run(args);
        assert!(!output.status.success(), "{args:?} should fail");
        assert!(String::from_utf8_lossy(&output.stderr).contains("error"));
    }
}
