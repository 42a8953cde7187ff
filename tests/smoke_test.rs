/// Smoke tests to verify the binary runs without panicking
use std::process::{Command, Output};

fn threatmap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_threatmap"))
        .args(args)
        // Keep a developer's own settings file out of the picture
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("threatmap-smoke"))
        .output()
        .expect("Failed to execute threatmap")
}

#[test]
fn binary_shows_help() {
    let output = threatmap(&["--help"]);

    assert!(
        output.status.success(),
        "Binary failed to run --help: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("threatmap"), "Help output should mention threatmap");
    for command in ["live", "stats", "locate"] {
        assert!(stdout.contains(command), "Help output should list {}", command);
    }
}

#[test]
fn binary_shows_version() {
    let output = threatmap(&["--version"]);

    assert!(
        output.status.success(),
        "Binary failed to run --version: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn invalid_subcommand_fails_gracefully() {
    let output = threatmap(&["nonexistent-command"]);

    // Should fail with error, not panic
    assert!(
        !output.status.success(),
        "Invalid subcommand should return error status"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    // Should show helpful error, not a panic backtrace
    assert!(
        !stderr.contains("panicked at"),
        "Invalid subcommand should not cause panic"
    );
}

#[test]
fn locate_projects_known_city() {
    let output = threatmap(&["locate", "--city", "Paris", "--country", "France"]);

    assert!(
        output.status.success(),
        "locate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Paris, France"), "unexpected output: {}", stdout);
    // 2.35°E, 48.86°N on a 360×180 box
    assert!(stdout.contains("x=182.35"), "unexpected output: {}", stdout);
    assert!(stdout.contains("y=41.14"), "unexpected output: {}", stdout);
    assert!(stdout.contains("City"), "unexpected output: {}", stdout);
}

#[test]
fn locate_accepts_negative_coordinates() {
    let output = threatmap(&["locate", "--lat", "-33.87", "--lon", "151.21"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("x=331.21"), "unexpected output: {}", stdout);
    assert!(stdout.contains("Explicit"), "unexpected output: {}", stdout);
}

#[test]
fn locate_unknown_place_is_an_error() {
    let output = threatmap(&["locate", "--city", "Nowhere", "--country", "Atlantis"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no location known"), "unexpected stderr: {}", stderr);
    assert!(!stderr.contains("panicked at"));
}
