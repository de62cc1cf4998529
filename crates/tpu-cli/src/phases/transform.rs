//! Transform: run the mapping task of the configured projects over a data model
//!
//! The task document embeds the mappings of every source project plus the
//! input and output data model documents. Depending on the flags the remote
//! service ingests and/or exports on the fly; an on-the-fly export comes back
//! as the response body.

use super::{persist_payload, ExportArtifact, Phase, PhaseContext};
use crate::api::{check_error_envelope, endpoints, TaskResponse};
use crate::error::{PipelineError, Result, ServiceError};
use crate::summary::PhaseName;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, info_span};
use uuid::Uuid;

/// What a successful task run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformResult {
    /// 204, nothing returned
    Completed,
    /// Task accepted with a response body but no export requested
    Accepted(String),
    /// On-the-fly export payload
    Exported(ExportArtifact),
}

pub struct TransformPhase {
    pub input_data_model_id: String,
    pub output_data_model_id: String,
    pub ingest_on_the_fly: bool,
    pub export_on_the_fly: bool,
}

impl TransformPhase {
    pub fn new(
        input_data_model_id: impl Into<String>,
        output_data_model_id: impl Into<String>,
        ingest_on_the_fly: bool,
        export_on_the_fly: bool,
    ) -> Self {
        Self {
            input_data_model_id: input_data_model_id.into(),
            output_data_model_id: output_data_model_id.into(),
            ingest_on_the_fly,
            export_on_the_fly,
        }
    }

    async fn collect_mappings(&self, ctx: &PhaseContext) -> std::result::Result<Vec<Value>, ServiceError> {
        let mut mappings = Vec::new();

        for project_id in &ctx.config.prototype.project_ids {
            let project = ctx.client.get_project(project_id).await?;
            let project_mappings = project
                .get("mappings")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    ServiceError::missing_field(
                        endpoints::project_url(&ctx.config.api_base, project_id),
                        "mappings",
                    )
                })?;

            debug!(project_id = %project_id, mappings = project_mappings.len(), "Fetched project mappings");
            mappings.extend(project_mappings.iter().cloned());
        }

        Ok(mappings)
    }

    /// Task document sent to the task endpoint
    pub fn task_document(
        &self,
        ctx: &PhaseContext,
        mappings: Vec<Value>,
        input_data_model: Value,
        output_data_model: Value,
    ) -> Value {
        let config = &ctx.config;
        json!({
            "task": {
                "name": format!("Task batch process '{}'", config.project_name),
                "description": format!(
                    "Task batch process '{}' for input data model '{}'",
                    config.project_name, self.input_data_model_id
                ),
                "job": {
                    "mappings": mappings,
                    "uuid": Uuid::new_v4().to_string(),
                },
                "input_data_model": input_data_model,
                "output_data_model": output_data_model,
            },
            "persist": config.results.persist_in_dmp,
            "do_ingest_on_the_fly": self.ingest_on_the_fly,
            "do_export_on_the_fly": self.export_on_the_fly,
            "do_versioning_on_result": false,
            "do_not_return_data": !self.export_on_the_fly,
            "utilise_existing_input_schema": config.prototype.input_schema_id.is_some(),
        })
    }

    async fn transform(&self, ctx: &PhaseContext) -> std::result::Result<TransformResult, ServiceError> {
        let mappings = self.collect_mappings(ctx).await?;
        let input = ctx.client.get_data_model(&self.input_data_model_id).await?;
        let output = ctx.client.get_data_model(&self.output_data_model_id).await?;

        let task = self.task_document(ctx, mappings, input, output);
        let accept = self
            .export_on_the_fly
            .then_some(ctx.config.results.mime_type.as_str());

        let response = ctx.client.execute_task(&task, accept).await?;
        self.interpret(ctx, response).await
    }

    async fn interpret(
        &self,
        ctx: &PhaseContext,
        response: TaskResponse,
    ) -> std::result::Result<TransformResult, ServiceError> {
        if response.status == 204 {
            return Ok(TransformResult::Completed);
        }

        if self.export_on_the_fly && response.status == 200 {
            let artifact =
                persist_payload(&ctx.config, &self.input_data_model_id, &response.body).await?;
            return Ok(TransformResult::Exported(artifact));
        }

        check_error_envelope(&response.body)?;
        Ok(TransformResult::Accepted(response.body_text()))
    }
}

#[async_trait]
impl Phase for TransformPhase {
    type Output = TransformResult;

    fn name(&self) -> PhaseName {
        PhaseName::Transform
    }

    fn span(&self, ctx: &PhaseContext) -> tracing::Span {
        info_span!(
            "transform",
            service = %ctx.service(),
            input = %self.input_data_model_id,
            output = %self.output_data_model_id
        )
    }

    async fn execute(&self, ctx: &PhaseContext) -> Result<TransformResult> {
        info!(
            ingest_on_the_fly = self.ingest_on_the_fly,
            export_on_the_fly = self.export_on_the_fly,
            "Starting transform"
        );

        let result = self.transform(ctx).await.map_err(|source| {
            PipelineError::transform(&self.input_data_model_id, &self.output_data_model_id, source)
        })?;

        info!(result = ?result, "Transform finished");
        Ok(result)
    }
}
