//! Ingest: push one more file into an existing data model

use super::{Phase, PhaseContext, ProvisionedModelHandle};
use crate::error::{PipelineError, Result, ServiceError};
use crate::summary::PhaseName;
use crate::watch_folder::WorkItem;
use async_trait::async_trait;
use tracing::{info, info_span};

pub struct IngestPhase {
    pub item: WorkItem,
    pub handle: ProvisionedModelHandle,
}

impl IngestPhase {
    pub fn new(item: WorkItem, handle: ProvisionedModelHandle) -> Self {
        Self { item, handle }
    }

    async fn ingest(&self, ctx: &PhaseContext) -> std::result::Result<(), ServiceError> {
        let resource_id = self
            .handle
            .resource_id
            .as_deref()
            .ok_or_else(|| ServiceError::missing_field("data model handle", "resource_id"))?;
        let data_model_id = self
            .handle
            .data_model_id
            .as_deref()
            .ok_or_else(|| ServiceError::missing_field("data model handle", "data_model_id"))?;

        let name = format!("resource for project '{}'", self.item.path.display());
        let description = format!("'{}' - case {}", ctx.config.project_name, self.item.sequence);

        ctx.client
            .update_resource(resource_id, &self.item.path, &name, &description)
            .await?;
        info!(resource_id, "Resource content replaced");

        ctx.client.reingest_data_model(data_model_id).await?;
        info!(data_model_id, "Data model re-ingested");

        Ok(())
    }
}

#[async_trait]
impl Phase for IngestPhase {
    type Output = ();

    fn name(&self) -> PhaseName {
        PhaseName::Ingest
    }

    fn span(&self, ctx: &PhaseContext) -> tracing::Span {
        info_span!("ingest", service = %ctx.service(), item = self.item.sequence)
    }

    async fn execute(&self, ctx: &PhaseContext) -> Result<()> {
        info!(file = %self.item.path.display(), "Starting ingest");

        self.ingest(ctx)
            .await
            .map_err(|source| PipelineError::ingest(self.item.path.display().to_string(), source))
    }
}
