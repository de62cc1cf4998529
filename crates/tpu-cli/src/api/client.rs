//! Client for the remote metadata-management service
//!
//! [`RemoteServiceClient`] is the seam between the pipeline and the network;
//! tests replace it with in-memory implementations. [`HttpServiceClient`]
//! talks to the real REST API and opens a fresh HTTP client for every call.

use crate::api::endpoints;
use crate::api::types::{EntityKind, TaskResponse};
use crate::config::PipelineConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::path::Path;

/// Result type alias for single remote calls
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Operations the pipeline needs from the remote service
#[async_trait]
pub trait RemoteServiceClient: Send + Sync {
    /// Idempotent index preparation, issued once before Init
    async fn prepare_schema_indices(&self) -> ServiceResult<()>;

    /// Upload a file as a new resource; returns the resource document
    async fn create_resource(
        &self,
        file: &Path,
        name: &str,
        description: &str,
    ) -> ServiceResult<Value>;

    /// Replace the file content of an existing resource
    async fn update_resource(
        &self,
        resource_id: &str,
        file: &Path,
        name: &str,
        description: &str,
    ) -> ServiceResult<Value>;

    async fn create_configuration(&self, template: &Value) -> ServiceResult<Value>;

    async fn create_data_model(&self, body: &Value, do_ingest: bool) -> ServiceResult<Value>;

    async fn get_data_model(&self, id: &str) -> ServiceResult<Value>;

    async fn get_schema(&self, id: &str) -> ServiceResult<Value>;

    async fn get_project(&self, id: &str) -> ServiceResult<Value>;

    /// Delta re-ingest of the data model's resource, without versioning
    async fn reingest_data_model(&self, id: &str) -> ServiceResult<()>;

    /// Submit a task; `accept` asks for an export payload in that format
    async fn execute_task(&self, task: &Value, accept: Option<&str>)
        -> ServiceResult<TaskResponse>;

    async fn export_data_model(&self, id: &str, mime_type: &str) -> ServiceResult<Vec<u8>>;

    async fn delete_entity(&self, kind: EntityKind, id: &str) -> ServiceResult<()>;
}

/// REST implementation of [`RemoteServiceClient`]
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    base_url: String,
    graph_base_url: String,
}

impl HttpServiceClient {
    /// Create a client; both base URLs must end in `/`
    pub fn new(base_url: impl Into<String>, graph_base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            graph_base_url: graph_base_url.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.api_base.clone(), config.graph_api_base.clone())
    }

    // One client (and connection) per remote call
    fn http(&self, url: &str) -> ServiceResult<Client> {
        Client::builder()
            .build()
            .map_err(|e| ServiceError::transport(url, e))
    }

    async fn send(&self, method: &str, url: &str, request: RequestBuilder) -> ServiceResult<Response> {
        tracing::debug!(method, url, "Request");

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::transport(url, e))?;

        let status = response.status();
        tracing::debug!(method, url, status = status.as_u16(), "Response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::status(method, url, status.as_u16(), body))
    }

    async fn read_json(url: &str, response: Response) -> ServiceResult<Value> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(url, e))?;

        serde_json::from_slice(&bytes).map_err(|source| ServiceError::Malformed {
            url: url.to_string(),
            source,
        })
    }

    async fn get_json(&self, url: String) -> ServiceResult<Value> {
        let request = self.http(&url)?.get(&url);
        let response = self.send("GET", &url, request).await?;
        Self::read_json(&url, response).await
    }

    async fn post_json(&self, url: String, body: &Value) -> ServiceResult<Value> {
        let request = self.http(&url)?.post(&url).json(body);
        let response = self.send("POST", &url, request).await?;
        Self::read_json(&url, response).await
    }

    async fn resource_form(file: &Path, name: &str, description: &str) -> ServiceResult<Form> {
        let content = tokio::fs::read(file)
            .await
            .map_err(|e| ServiceError::io(file, e))?;

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        Ok(Form::new()
            .text("name", name.to_string())
            .text("description", description.to_string())
            .part("file", Part::bytes(content).file_name(file_name)))
    }
}

#[async_trait]
impl RemoteServiceClient for HttpServiceClient {
    async fn prepare_schema_indices(&self) -> ServiceResult<()> {
        let url = endpoints::schema_indices_url(&self.graph_base_url);
        let request = self
            .http(&url)?
            .post(&url)
            .header(CONTENT_TYPE, "text/plain")
            .body("");

        let response = self.send("POST", &url, request).await?;
        let body = response.text().await.unwrap_or_default();
        tracing::info!(response = %body, "Schema indices prepared");
        Ok(())
    }

    async fn create_resource(
        &self,
        file: &Path,
        name: &str,
        description: &str,
    ) -> ServiceResult<Value> {
        let url = endpoints::resources_url(&self.base_url);
        let form = Self::resource_form(file, name, description).await?;
        let request = self.http(&url)?.post(&url).multipart(form);

        let response = self.send("POST", &url, request).await?;
        Self::read_json(&url, response).await
    }

    async fn update_resource(
        &self,
        resource_id: &str,
        file: &Path,
        name: &str,
        description: &str,
    ) -> ServiceResult<Value> {
        let url = endpoints::resource_url(&self.base_url, resource_id);
        let form = Self::resource_form(file, name, description).await?;
        let request = self.http(&url)?.put(&url).multipart(form);

        let response = self.send("PUT", &url, request).await?;
        Self::read_json(&url, response).await
    }

    async fn create_configuration(&self, template: &Value) -> ServiceResult<Value> {
        self.post_json(endpoints::configurations_url(&self.base_url), template)
            .await
    }

    async fn create_data_model(&self, body: &Value, do_ingest: bool) -> ServiceResult<Value> {
        self.post_json(
            endpoints::create_data_model_url(&self.base_url, do_ingest),
            body,
        )
        .await
    }

    async fn get_data_model(&self, id: &str) -> ServiceResult<Value> {
        self.get_json(endpoints::data_model_url(&self.base_url, id))
            .await
    }

    async fn get_schema(&self, id: &str) -> ServiceResult<Value> {
        self.get_json(endpoints::schema_url(&self.base_url, id)).await
    }

    async fn get_project(&self, id: &str) -> ServiceResult<Value> {
        self.get_json(endpoints::project_url(&self.base_url, id)).await
    }

    async fn reingest_data_model(&self, id: &str) -> ServiceResult<()> {
        let url = endpoints::reingest_url(&self.base_url, id);
        let request = self.http(&url)?.post(&url);
        self.send("POST", &url, request).await?;
        Ok(())
    }

    async fn execute_task(
        &self,
        task: &Value,
        accept: Option<&str>,
    ) -> ServiceResult<TaskResponse> {
        let url = endpoints::tasks_url(&self.base_url);
        let mut request = self.http(&url)?.post(&url).json(task);
        if let Some(mime_type) = accept {
            request = request.header(ACCEPT, mime_type);
        }

        let response = self.send("POST", &url, request).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(&url, e))?
            .to_vec();

        Ok(TaskResponse { status, body })
    }

    async fn export_data_model(&self, id: &str, mime_type: &str) -> ServiceResult<Vec<u8>> {
        let url = endpoints::export_url(&self.base_url, id, mime_type);
        let request = self.http(&url)?.get(&url).header(ACCEPT, mime_type);

        let response = self.send("GET", &url, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(&url, e))?;

        Ok(bytes.to_vec())
    }

    async fn delete_entity(&self, kind: EntityKind, id: &str) -> ServiceResult<()> {
        let url = endpoints::entity_url(&self.base_url, kind, id);
        let request = self.http(&url)?.delete(&url);
        self.send("DELETE", &url, request).await?;
        Ok(())
    }
}
