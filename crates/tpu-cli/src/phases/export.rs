//! Export: render a data model and persist the payload

use super::{persist_payload, ExportArtifact, Phase, PhaseContext};
use crate::error::{PipelineError, Result};
use crate::summary::PhaseName;
use async_trait::async_trait;
use tracing::{info, info_span};

pub struct ExportPhase {
    pub data_model_id: String,
}

impl ExportPhase {
    pub fn new(data_model_id: impl Into<String>) -> Self {
        Self {
            data_model_id: data_model_id.into(),
        }
    }
}

#[async_trait]
impl Phase for ExportPhase {
    type Output = ExportArtifact;

    fn name(&self) -> PhaseName {
        PhaseName::Export
    }

    fn span(&self, ctx: &PhaseContext) -> tracing::Span {
        info_span!("export", service = %ctx.service(), data_model_id = %self.data_model_id)
    }

    async fn execute(&self, ctx: &PhaseContext) -> Result<ExportArtifact> {
        let mime_type = &ctx.config.results.mime_type;
        info!(mime_type = %mime_type, "Starting export");

        let payload = ctx
            .client
            .export_data_model(&self.data_model_id, mime_type)
            .await
            .map_err(|e| PipelineError::export(&self.data_model_id, e))?;

        persist_payload(&ctx.config, &self.data_model_id, &payload)
            .await
            .map_err(|e| PipelineError::export(&self.data_model_id, e))
    }
}
