//! End-to-end tests for the `tpu` binary
//!
//! These tests validate:
//! - Fatal exits for unreadable configuration and empty watch folders
//! - The legacy `-conf=<path>` flag
//! - Java-style properties syntax in the configuration file
//! - A fully-automated run against a mock service, including the final message

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to write a properties file
fn write_conf(dir: &TempDir, lines: &[String]) -> PathBuf {
    let conf = dir.path().join("config.properties");
    fs::write(&conf, lines.join("\n")).expect("Failed to write config");
    conf
}

fn tpu() -> Command {
    let mut cmd = Command::cargo_bin("tpu").expect("binary builds");
    cmd.env_remove("LOG_LEVEL").env_remove("TPU_CONF");
    cmd
}

fn watch_folder(dir: &TempDir, files: &[&str]) -> PathBuf {
    let watch = dir.path().join("in");
    fs::create_dir_all(&watch).unwrap();
    for file in files {
        fs::write(watch.join(file), "<record/>").unwrap();
    }
    watch
}

fn prop(key: &str, value: impl AsRef<Path>) -> String {
    format!("{}={}", key, value.as_ref().display())
}

#[test]
fn test_missing_config_file_is_fatal() {
    tpu()
        .arg("-conf=/definitely/not/here.properties")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not read"));
}

#[test]
fn test_empty_watch_folder_is_fatal() {
    let dir = TempDir::new().unwrap();
    let watch = watch_folder(&dir, &[]);
    let conf = write_conf(
        &dir,
        &[
            "engine.dswarm.api=http://127.0.0.1:9/dmp/".to_string(),
            prop("resource.watchfolder", &watch),
        ],
    );

    tpu()
        .arg(format!("-conf={}", conf.display()))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains(
            "could not determine files from watchfolder; there are no files in folder",
        ));
}

#[test]
fn test_java_style_properties_are_accepted() {
    let dir = TempDir::new().unwrap();
    let watch = watch_folder(&dir, &[]);
    let conf = write_conf(
        &dir,
        &[
            "! nightly pipeline".to_string(),
            "service.name: tpu nightly".to_string(),
            "project.name=Nightly Run $HOME".to_string(),
            "engine.dswarm.api=http://127.0.0.1:9/dmp/".to_string(),
            prop("resource.watchfolder", &watch),
        ],
    );

    // Gets past configuration loading and stops at the empty folder
    tpu()
        .arg(format!("-conf={}", conf.display()))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not read").not())
        .stdout(predicate::str::contains("there are no files in folder"));
}

#[test]
fn test_invalid_thread_count_is_fatal() {
    let dir = TempDir::new().unwrap();
    let watch = watch_folder(&dir, &["a.xml"]);
    let conf = write_conf(
        &dir,
        &[
            "engine.threads=0".to_string(),
            "engine.dswarm.api=http://127.0.0.1:9/dmp/".to_string(),
            prop("resource.watchfolder", &watch),
        ],
    );

    tpu()
        .arg("--conf")
        .arg(&conf)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("engine.threads"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fully_automated_run_writes_artifact() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watch = watch_folder(&dir, &["a.xml"]);
    let results = dir.path().join("out");
    let template = dir.path().join("configuration.json");
    fs::write(&template, r#"{"parameters":{"storage_type":"xml"}}"#).unwrap();

    let created = [
        ("/dmp/resources", serde_json::json!({"uuid": "res-1"})),
        ("/dmp/configurations", serde_json::json!({"uuid": "conf-1"})),
        ("/dmp/datamodels", serde_json::json!({"uuid": "dm-1"})),
    ];
    for (endpoint, body) in created {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(201).set_body_json(body))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/dmp/maintain/schemaindices"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dmp/projects/p-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"uuid": "p-1", "mappings": []})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dmp/datamodels/dm-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"uuid": "dm-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/dmp/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<records/>"))
        .expect(1)
        .mount(&server)
        .await;

    let conf = write_conf(
        &dir,
        &[
            format!("engine.dswarm.api={}/dmp", server.uri()),
            prop("resource.watchfolder", &watch),
            prop("configuration.name", &template),
            prop("results.folder", &results),
            "results.persistInFolder=true".to_string(),
            "init.do=true".to_string(),
            "init.multiple_data_models=true".to_string(),
            "transform.do=true".to_string(),
            "task.do_ingest_on_the_fly=true".to_string(),
            "task.do_export_on_the_fly=true".to_string(),
            "prototype.projectIDs=p-1".to_string(),
        ],
    );

    // The binary blocks; keep it off the runtime serving the mock
    let assert = tokio::task::spawn_blocking(move || {
        tpu().arg(format!("-conf={}", conf.display())).assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("fully-automated run finished"));

    assert_eq!(
        fs::read_to_string(results.join("export-of-dm-1.xml")).unwrap(),
        "<records/>"
    );
}
