//! Shared helpers for the integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tpu_cli::api::{EntityKind, RemoteServiceClient, ServiceResult, TaskResponse};
use tpu_cli::{PipelineConfig, ServiceError};
use tpu_common::Properties;

/// One remote call as seen by [`RecordingClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SchemaIndices,
    CreateResource(String),
    UpdateResource { resource_id: String, file: String },
    CreateConfiguration,
    CreateDataModel { do_ingest: bool },
    GetDataModel(String),
    GetSchema(String),
    GetProject(String),
    Reingest(String),
    ExecuteTask { accept: Option<String> },
    Export(String),
    Delete(EntityKind, String),
}

/// In-memory remote service that records every call
#[derive(Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Call>>,
    counter: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    latency: Option<Duration>,
    failing_resources: HashSet<String>,
    failing_updates: HashSet<String>,
    failing_deletes: HashSet<EntityKind>,
    fail_data_model: bool,
    fail_task: bool,
    export_payload: Option<Vec<u8>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource creation fails for this file name
    pub fn failing_resource(mut self, file: &str) -> Self {
        self.failing_resources.insert(file.to_string());
        self
    }

    /// Resource update (Ingest) fails for this file name
    pub fn failing_update(mut self, file: &str) -> Self {
        self.failing_updates.insert(file.to_string());
        self
    }

    pub fn failing_delete(mut self, kind: EntityKind) -> Self {
        self.failing_deletes.insert(kind);
        self
    }

    pub fn failing_data_model(mut self) -> Self {
        self.fail_data_model = true;
        self
    }

    pub fn failing_task(mut self) -> Self {
        self.fail_task = true;
        self
    }

    pub fn export_payload(mut self, payload: &str) -> Self {
        self.export_payload = Some(payload.as_bytes().to_vec());
        self
    }

    /// Every resource creation takes this long
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn deletes(&self) -> Vec<(EntityKind, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(kind, id) => Some((kind, id)),
                _ => None,
            })
            .collect()
    }

    /// Highest number of concurrent resource creations seen
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

fn failure(what: &str) -> ServiceError {
    ServiceError::status("POST", format!("mock://{}", what), 500, format!("{} failed", what))
}

#[async_trait]
impl RemoteServiceClient for RecordingClient {
    async fn prepare_schema_indices(&self) -> ServiceResult<()> {
        self.record(Call::SchemaIndices);
        Ok(())
    }

    async fn create_resource(
        &self,
        file: &Path,
        name: &str,
        description: &str,
    ) -> ServiceResult<Value> {
        let file = file_name(file);
        self.record(Call::CreateResource(file.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_resources.contains(&file) {
            return Err(failure("resources"));
        }

        Ok(json!({
            "uuid": self.next_id("resource"),
            "name": name,
            "description": description,
            "file": file,
        }))
    }

    async fn update_resource(
        &self,
        resource_id: &str,
        file: &Path,
        _name: &str,
        _description: &str,
    ) -> ServiceResult<Value> {
        let file = file_name(file);
        self.record(Call::UpdateResource {
            resource_id: resource_id.to_string(),
            file: file.clone(),
        });

        if self.failing_updates.contains(&file) {
            return Err(failure("resources update"));
        }

        Ok(json!({ "uuid": resource_id }))
    }

    async fn create_configuration(&self, template: &Value) -> ServiceResult<Value> {
        self.record(Call::CreateConfiguration);
        let mut configuration = template.clone();
        configuration["uuid"] = json!(self.next_id("configuration"));
        Ok(configuration)
    }

    async fn create_data_model(&self, body: &Value, do_ingest: bool) -> ServiceResult<Value> {
        self.record(Call::CreateDataModel { do_ingest });

        if self.fail_data_model {
            return Err(failure("datamodels"));
        }

        // Deterministic ids: a.xml -> model-a
        let file = body["data_resource"]["file"].as_str().unwrap_or("unknown");
        let stem = file.split('.').next().unwrap_or(file);
        let mut model = body.clone();
        model["uuid"] = json!(format!("model-{}", stem));
        Ok(model)
    }

    async fn get_data_model(&self, id: &str) -> ServiceResult<Value> {
        self.record(Call::GetDataModel(id.to_string()));
        Ok(json!({ "uuid": id }))
    }

    async fn get_schema(&self, id: &str) -> ServiceResult<Value> {
        self.record(Call::GetSchema(id.to_string()));
        Ok(json!({ "uuid": id }))
    }

    async fn get_project(&self, id: &str) -> ServiceResult<Value> {
        self.record(Call::GetProject(id.to_string()));
        Ok(json!({ "uuid": id, "mappings": [{ "uuid": format!("{}-mapping", id) }] }))
    }

    async fn reingest_data_model(&self, id: &str) -> ServiceResult<()> {
        self.record(Call::Reingest(id.to_string()));
        Ok(())
    }

    async fn execute_task(
        &self,
        task: &Value,
        accept: Option<&str>,
    ) -> ServiceResult<TaskResponse> {
        self.record(Call::ExecuteTask {
            accept: accept.map(str::to_string),
        });

        if self.fail_task {
            return Err(ServiceError::Envelope(
                r#"{"error":{"message":"mapping could not be applied"}}"#.to_string(),
            ));
        }

        match accept {
            Some(_) => {
                let input = task["task"]["input_data_model"]["uuid"].as_str().unwrap_or("");
                Ok(TaskResponse {
                    status: 200,
                    body: format!("<records model=\"{}\"/>", input).into_bytes(),
                })
            }
            None => Ok(TaskResponse {
                status: 204,
                body: Vec::new(),
            }),
        }
    }

    async fn export_data_model(&self, id: &str, _mime_type: &str) -> ServiceResult<Vec<u8>> {
        self.record(Call::Export(id.to_string()));
        Ok(self
            .export_payload
            .clone()
            .unwrap_or_else(|| b"<export/>".to_vec()))
    }

    async fn delete_entity(&self, kind: EntityKind, id: &str) -> ServiceResult<()> {
        self.record(Call::Delete(kind, id.to_string()));

        if self.failing_deletes.contains(&kind) {
            return Err(failure(kind.endpoint()));
        }

        Ok(())
    }
}

/// Watch folder, results folder and configuration template of one test
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("in")).unwrap();
        for file in files {
            std::fs::write(dir.path().join("in").join(file), "<record/>").unwrap();
        }
        std::fs::write(
            dir.path().join("configuration.json"),
            r#"{"name":"xml configuration","parameters":{"storage_type":"xml"}}"#,
        )
        .unwrap();
        Self { dir }
    }

    pub fn watch_folder(&self) -> std::path::PathBuf {
        self.dir.path().join("in")
    }

    pub fn results_folder(&self) -> std::path::PathBuf {
        self.dir.path().join("out")
    }

    /// Config with the workspace paths plus the given properties
    pub fn config(&self, extra: &[(&str, &str)]) -> Arc<PipelineConfig> {
        let mut props = Properties::from_pairs([
            ("service.name", "tpu-test"),
            ("engine.dswarm.api", "http://localhost:8087/dmp/"),
            ("prototype.projectIDs", "project-1"),
            ("results.persistInFolder", "true"),
        ]);
        props.set("resource.watchfolder", self.watch_folder().to_str().unwrap());
        props.set("results.folder", self.results_folder().to_str().unwrap());
        props.set(
            "configuration.name",
            self.dir.path().join("configuration.json").to_str().unwrap(),
        );
        for (key, value) in extra {
            props.set(*key, *value);
        }

        Arc::new(PipelineConfig::from_properties(&props).unwrap())
    }
}

/// Switches of the fully-automated strategy
pub const FULLY_AUTOMATED: &[(&str, &str)] = &[
    ("init.do", "true"),
    ("init.multiple_data_models", "true"),
    ("transform.do", "true"),
    ("task.do_ingest_on_the_fly", "true"),
    ("task.do_export_on_the_fly", "true"),
];
