//! CLI binary integration tests using assert_cmd

mod common;

use assert_cmd::prelude::*;
use common::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Binary isolated from the user's config directory
fn shpidx(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shpidx"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_build_single_file() {
    let home = TempDir::new().unwrap();
    let source = write_points(home.path(), "wells.shp", &sample_points(50));

    shpidx(home.path())
        .args(["build", "-s"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[Done] wells.idx index with 50 records build complete.",
        ));

    assert!(home.path().join("wells.idx").exists());
    assert!(home.path().join("wells.ids").exists());
}

#[test]
fn test_cli_build_skips_existing() {
    let home = TempDir::new().unwrap();
    let source = write_points(home.path(), "a.shp", &sample_points(5));

    shpidx(home.path()).args(["build", "-s"]).arg(&source).assert().success();
    shpidx(home.path())
        .args(["build", "-s"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[Skip] Output exists and overwrite not enabled, skip building index.",
        ));

    shpidx(home.path())
        .args(["build", "--overwrite", "-s"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("[Done]"));
}

#[test]
fn test_cli_missing_source_fails() {
    let home = TempDir::new().unwrap();

    shpidx(home.path())
        .args(["build", "-s"])
        .arg(home.path().join("nope.shp"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("[Error] Source file not exists."));
}

#[test]
fn test_cli_build_directory() {
    let home = TempDir::new().unwrap();
    let src = home.path().join("data");
    let out = home.path().join("indexes");
    fs::create_dir(&src).unwrap();
    fs::create_dir(&out).unwrap();
    write_points(&src, "a.shp", &sample_points(3));
    write_boxes(&src, "b.shp", &sample_boxes(4));

    shpidx(home.path())
        .args(["build", "-s"])
        .arg(&src)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("[1/2] Building index for file"))
        .stdout(predicate::str::contains("[2/2] Built index for file"))
        .stdout(predicate::str::contains("Building index completed."));

    assert_eq!(list_files(&out), vec!["a.idx", "a.ids", "b.idx", "b.ids"]);
}

#[test]
fn test_cli_failed_job_sets_exit_status() {
    let home = TempDir::new().unwrap();
    let source = home.path().join("broken.shp");
    fs::write(&source, b"definitely not a shapefile").unwrap();

    shpidx(home.path())
        .args(["build", "-s"])
        .arg(&source)
        .assert()
        .failure()
        .stdout(predicate::str::contains("[Error]"));

    assert!(!home.path().join("broken.idx").exists());
}

#[test]
fn test_cli_plain_progress_lines_from_config() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join(".config").join("shpidx");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.json"), r#"{"progress": false}"#).unwrap();
    let source = write_points(home.path(), "p.shp", &sample_points(70));

    shpidx(home.path())
        .args(["build", "-s"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("[Building] - 32/70"))
        .stdout(predicate::str::contains("[Building] - 64/70"));
}

#[test]
fn test_cli_progress_lines_when_piped() {
    let home = TempDir::new().unwrap();
    let source = write_points(home.path(), "p.shp", &sample_points(70));

    // Default config asks for a bar, which cannot draw without a terminal
    shpidx(home.path())
        .args(["build", "-s"])
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("[Building] - 32/70"))
        .stdout(predicate::str::contains("[Building] - 64/70"))
        .stdout(predicate::str::contains("[Done] p.idx index with 70 records"));
}

#[test]
fn test_cli_explicit_output_keeps_its_name() {
    let home = TempDir::new().unwrap();
    let source = write_points(home.path(), "roads.shp", &sample_points(4));

    shpidx(home.path())
        .args(["build", "-s"])
        .arg(&source)
        .arg("-o")
        .arg(home.path().join("roads.v2"))
        .assert()
        .success()
        .stdout(predicate::str::contains("[Done] roads.v2.idx index with 4 records"));

    assert!(home.path().join("roads.v2.idx").exists());
    assert!(home.path().join("roads.v2.ids").exists());
    assert!(!home.path().join("roads.idx").exists());
}

#[test]
fn test_cli_info_json() {
    let home = TempDir::new().unwrap();
    let source = write_boxes(home.path(), "zones.shp", &sample_boxes(12));
    shpidx(home.path()).args(["build", "-s"]).arg(&source).assert().success();

    let output = shpidx(home.path())
        .args(["info", "--json"])
        .arg(home.path().join("zones.idx"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["count"], 12);
    assert_eq!(stats["record_kind"], "Rectangle");
    assert_eq!(stats["page_size"], 512);
}

#[test]
fn test_cli_info_text() {
    let home = TempDir::new().unwrap();
    let source = write_points(home.path(), "pts.shp", &sample_points(8));
    shpidx(home.path()).args(["build", "-s"]).arg(&source).assert().success();

    shpidx(home.path())
        .arg("info")
        .arg(home.path().join("pts.idx"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Record kind:      point"))
        .stdout(predicate::str::contains("Record count:     8"));
}

#[test]
fn test_cli_remove() {
    let home = TempDir::new().unwrap();
    let source = write_points(home.path(), "gone.shp", &sample_points(2));
    shpidx(home.path()).args(["build", "-s"]).arg(&source).assert().success();

    shpidx(home.path())
        .arg("remove")
        .arg(home.path().join("gone.idx"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed:"));

    assert!(!home.path().join("gone.idx").exists());
    assert!(!home.path().join("gone.ids").exists());
    assert!(source.exists());
}

#[test]
fn test_cli_help_flag() {
    let home = TempDir::new().unwrap();
    shpidx(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("remove"));
}
