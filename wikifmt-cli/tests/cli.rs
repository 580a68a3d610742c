use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

const HELLO: &str = r#"<p>Hello <ac:structured-macro ac:name="mermaid"><ac:parameter ac:name="code"><![CDATA[graph TD;A-->B]]></ac:parameter></ac:structured-macro> world</p>"#;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("wikifmt-babel")
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn check_reports_counts() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("check").arg(fixture_path("kitchensink.xml"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ok:").and(predicate::str::contains("2 diagrams")));
}

#[test]
fn check_rejects_malformed_input() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.xml");
    fs::write(&path, "<p>x</p><ac:structured-macro ac:name=\"code\"><ac:plain-text-body><![CDATA[open").unwrap();

    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("check").arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:").and(predicate::str::contains("malformed")));
}

#[test]
fn parse_prints_segments() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hello.xml");
    fs::write(&path, HELLO).unwrap();

    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("parse").arg(&path);
    let output = cmd.assert().success().get_output().stdout.clone();
    let segments: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(segments.as_array().unwrap().len(), 3);
    assert_eq!(segments[0]["kind"], "markup");
    assert_eq!(segments[1]["kind"], "macro");
    assert_eq!(segments[1]["macro_type"], "diagram");
}

#[test]
fn diagrams_lists_registry() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("diagrams").arg(fixture_path("kitchensink.xml"));
    cmd.assert().success().stdout(
        predicate::str::contains("\"diagram-0\"")
            .and(predicate::str::contains("\"diagram-1\""))
            .and(predicate::str::contains("graph TD;A-->B")),
    );
}

#[test]
fn set_diagram_touches_only_the_target() {
    let original = fs::read_to_string(fixture_path("kitchensink.xml")).unwrap();
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("set-diagram")
        .arg(fixture_path("kitchensink.xml"))
        .arg("diagram-1")
        .arg("graph TD;X-->Y");
    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();

    let expected = original.replace(
        r#"ac:macro-id="m-2"><ac:parameter ac:name="code"><![CDATA[graph TD;A-->B]]>"#,
        r#"ac:macro-id="m-2"><ac:parameter ac:name="code"><![CDATA[graph TD;X-->Y]]>"#,
    );
    assert_eq!(stdout, expected);
}

#[test]
fn set_diagram_unknown_id_fails() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("set-diagram")
        .arg(fixture_path("kitchensink.xml"))
        .arg("diagram-7")
        .arg("graph TD;X");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error:").and(predicate::str::contains("diagram-7")));
}

#[test]
fn convert_to_plain_text() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("convert")
        .arg(fixture_path("kitchensink.xml"))
        .arg("--to")
        .arg("plain-text");
    cmd.assert().success().stdout(
        predicate::str::contains("# Deployment Runbook")
            .and(predicate::str::contains("wf-diagram diagram-0"))
            .and(predicate::str::contains("xml wf-macro toc"))
            .and(predicate::str::contains("ac:structured-macro ac:name=\"mermaid\"").not()),
    );
}

#[test]
fn convert_rich_text_edit_back_to_storage() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("page.xml");
    fs::write(&base, HELLO).unwrap();

    let html_path = dir.path().join("page.html");
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("convert")
        .arg(&base)
        .arg("--to")
        .arg("rich-text")
        .arg("-o")
        .arg(&html_path);
    cmd.assert().success();

    let html = fs::read_to_string(&html_path).unwrap();
    assert!(html.contains("wf-diagram"));
    fs::write(&html_path, html.replace("Hello", "Howdy")).unwrap();

    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("convert").arg(&html_path).arg("--base").arg(&base);
    cmd.assert()
        .success()
        .stdout(HELLO.replace("Hello", "Howdy"));
}

#[test]
fn convert_back_requires_base() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("convert").arg(fixture_path("kitchensink.xml"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--base"));
}

#[test]
fn snapshot_prints_json() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("snapshot")
        .arg(fixture_path("kitchensink.xml"))
        .arg("--title")
        .arg("Runbook");
    let output = cmd.assert().success().get_output().stdout.clone();
    let snapshot: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(snapshot["title"], "Runbook");
    assert!(snapshot["storageText"]
        .as_str()
        .unwrap()
        .starts_with("<h1>Deployment Runbook</h1>"));
    assert!(snapshot["timestamp"].as_u64().unwrap() > 0);
}

#[test]
fn list_surfaces() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("list-surfaces");
    cmd.assert().success().stdout(
        predicate::str::contains("plain-text")
            .and(predicate::str::contains("rich-text"))
            .and(predicate::str::contains("(read-only)")),
    );
}

#[test]
fn missing_input_is_an_error() {
    let mut cmd = cargo_bin_cmd!("wikifmt");
    cmd.arg("check").arg("/nonexistent/page.xml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: reading file"));
}
