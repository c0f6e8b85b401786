use orgtree::config::OrgTreeConfig;
use orgtree::error::{ApiError, PathError};
use orgtree::tooling::cli::{CliContext, Commands};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_batches(temp: &TempDir) -> Vec<PathBuf> {
    let first = temp.path().join("01-sites.json");
    fs::write(
        &first,
        r#"[
            { "key": "site-c", "name": "Site C", "parentSiteKey": "sub" },
            { "key": "lost", "parentOrganizationKey": "gone" }
        ]"#,
    )
    .unwrap();

    let second = temp.path().join("02-orgs.json");
    fs::write(
        &second,
        r#"{
            "organization": { "key": "kalki", "displayName": "Kalkitech" },
            "childOrganizations": [
                { "key": "sub", "displayName": "Kalkitech Sub", "parentOrganizationKey": "kalki" }
            ]
        }"#,
    )
    .unwrap();

    vec![first, second]
}

fn context() -> CliContext {
    CliContext::from_config(OrgTreeConfig::default())
}

#[test]
fn path_command_resolves_across_files() {
    let temp = TempDir::new().unwrap();
    let files = write_batches(&temp);

    let output = context()
        .execute(&Commands::Path {
            key: "site-c".to_string(),
            files,
        })
        .unwrap();
    assert_eq!(output, "kalki / sub / site-c");
}

#[test]
fn path_command_reports_orphans() {
    let temp = TempDir::new().unwrap();
    let files = write_batches(&temp);

    let err = context()
        .execute(&Commands::Path {
            key: "lost".to_string(),
            files,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Path(PathError::Orphan { ref missing_parent, .. }) if missing_parent == "gone"
    ));
}

#[test]
fn apply_json_lists_one_report_per_file() {
    let temp = TempDir::new().unwrap();
    let files = write_batches(&temp);

    let output = context()
        .execute(&Commands::Apply {
            files,
            format: "json".to_string(),
        })
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    let reports = parsed.as_array().unwrap();
    assert_eq!(reports.len(), 2);

    let first = &reports[0]["report"];
    assert_eq!(first["attached"].as_array().unwrap().len(), 0);
    assert_eq!(first["orphaned"], serde_json::json!(["lost", "site-c"]));

    let second = &reports[1]["report"];
    assert_eq!(
        second["attached"],
        serde_json::json!(["kalki", "sub", "site-c"])
    );
    assert_eq!(second["changes"]["site-c"], "attached");
}

#[test]
fn tree_json_contains_rows_and_orphans() {
    let temp = TempDir::new().unwrap();
    let files = write_batches(&temp);

    let output = context()
        .execute(&Commands::Tree {
            files,
            format: "json".to_string(),
        })
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

    let keys: Vec<&str> = parsed["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["kalki", "sub", "site-c"]);
    assert_eq!(parsed["rows"][0]["label"], "Kalkitech");
    assert_eq!(parsed["orphans"][0]["key"], "lost");
    assert_eq!(parsed["orphans"][0]["missing_parent"], "gone");
}

#[test]
fn tree_text_renders_labels() {
    let temp = TempDir::new().unwrap();
    let files = write_batches(&temp);

    let output = context()
        .execute(&Commands::Tree {
            files,
            format: "text".to_string(),
        })
        .unwrap();
    assert!(output.contains("Kalkitech  (1)"));
    assert!(output.contains("Site C"));
    assert!(output.contains("lost (waiting for gone)"));
}

#[test]
fn missing_file_is_an_io_error() {
    let temp = TempDir::new().unwrap();
    let err = context()
        .execute(&Commands::Tree {
            files: vec![temp.path().join("absent.json")],
            format: "text".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::Io(_)));
}

#[test]
fn config_command_prints_toml() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orgtree.toml");
    fs::write(&path, "[queue]\ncapacity = 5\n").unwrap();

    let context = CliContext::new(Some(path)).unwrap();
    let output = context.execute(&Commands::Config).unwrap();
    assert!(output.contains("capacity = 5"));
    assert!(output.contains("[logging]"));
}
