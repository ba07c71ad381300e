//! # CLI Integration Tests
//!
//! Argument parsing, settings resolution and end-to-end command runs
//! against snapshot files on disk.

use clap::Parser;
use entigraph::cli::{Cli, Commands, Settings, execute, load_state};
use entigraph::config::AppConfig;
use entigraph_core::{
    Argument, MethodCall, OperationInvoker, import_canonical, states_equivalent,
};
use std::path::{Path, PathBuf};

const ACME: &str = r#"{
    "root": "acme",
    "entities": {
        "acme": { "type": "Company", "fields": { "name": "Acme", "employees": ["ada", "bob", "cy"] } },
        "ada":  { "type": "Employee", "fields": { "name": "Ada", "salary": 120, "level": "Senior" } },
        "bob":  { "type": "Employee", "fields": { "name": "Bob", "salary": 90, "manager": "ada" } },
        "cy":   { "type": "Contractor", "fields": { "name": "Cy", "agency": "Temps", "manager": "ada" } }
    }
}"#;

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write");
    path
}

// =============================================================================
// PARSING
// =============================================================================

#[test]
fn parses_invoke_with_trailing_arguments() {
    let cli = Cli::try_parse_from([
        "entigraph", "invoke", "-s", "acme.json", "-o", "Company.updateSalary", "--on", "e1",
        "e3", "150",
    ])
    .expect("parse");

    assert!(matches!(
        cli.command,
        Commands::Invoke { ref operation, ref on, ref args, .. }
            if operation == "Company.updateSalary" && on == "e1" && args == &["e3", "150"]
    ));
}

#[test]
fn flags_override_config() {
    let config = AppConfig::from_toml("[output]\njson = false\n").expect("config");
    let cli = Cli::try_parse_from(["entigraph", "--json-mode", "--unordered", "schema"])
        .expect("parse");
    assert_eq!(
        Settings::resolve(&cli, &config),
        Settings {
            deterministic: false,
            json_mode: true
        }
    );
}

#[test]
fn rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["entigraph", "ingest"]).is_err());
}

// =============================================================================
// END TO END
// =============================================================================

#[test]
fn export_then_import() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot = write(dir.path(), "acme.json", ACME);
    let output = dir.path().join("acme.egtx");

    let cli = Cli::try_parse_from([
        "entigraph",
        "export",
        "-s",
        snapshot.to_str().expect("utf8"),
        "-o",
        output.to_str().expect("utf8"),
    ])
    .expect("parse");
    execute(cli, &AppConfig::default()).expect("export");

    let canonical = import_canonical(&std::fs::read(&output).expect("read")).expect("import");
    assert_eq!(canonical.root.as_str(), "e1");
    assert_eq!(canonical.next_id, 5);
}

#[test]
fn snapshot_and_its_executed_copy_diverge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshot = write(dir.path(), "acme.json", ACME);
    let settings = Settings {
        deterministic: true,
        json_mode: false,
    };
    let state = load_state(settings, &snapshot).expect("state");

    let op = state
        .schema()
        .operation_by_friendly_id("Company.updateSalary")
        .expect("operation")
        .id
        .clone();
    let call = MethodCall::new(op, "e1", vec![Argument::entity("e3"), Argument::value(95i64)]);
    let next = OperationInvoker::try_apply(&call, &state)
        .expect("apply")
        .into_state()
        .expect("applied");

    assert!(!states_equivalent(&state, &next).expect("compare"));
    let reloaded = load_state(settings, &snapshot).expect("state");
    assert!(states_equivalent(&state, &reloaded).expect("compare"));
}

#[test]
fn equivalent_snapshots_with_different_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let left = write(dir.path(), "left.json", ACME);
    let renamed = ACME.replace("\"ada\"", "\"a\"").replace("\"bob\"", "\"b\"");
    let right = write(dir.path(), "right.json", &renamed);
    let settings = Settings {
        deterministic: true,
        json_mode: true,
    };

    let a = load_state(settings, &left).expect("left");
    let b = load_state(settings, &right).expect("right");
    assert!(states_equivalent(&a, &b).expect("compare"));
}
