//! Init: provision resource, configuration and data model for one file

use super::{Phase, PhaseContext};
use crate::api::{endpoints, uuid_of, EntityKind};
use crate::cleanup;
use crate::config::{PipelineConfig, CONFIGURATION_NAME};
use crate::error::{PipelineError, Result, ServiceError};
use crate::summary::PhaseName;
use crate::watch_folder::WorkItem;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, info_span, warn};

/// Identifiers of the server-side entities behind one data model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionedModelHandle {
    pub data_model_id: Option<String>,
    pub resource_id: Option<String>,
    pub configuration_id: Option<String>,
    /// Created by this run, hence released at cleanup
    pub owned: bool,
    /// File the handle was provisioned from
    pub item: Option<WorkItem>,
}

impl ProvisionedModelHandle {
    /// Handle built from externally supplied identifiers; never cleaned up
    pub fn external(config: &PipelineConfig) -> Self {
        Self {
            data_model_id: config.prototype.data_model_id.clone(),
            resource_id: config.prototype.resource_id.clone(),
            configuration_id: None,
            owned: false,
            item: None,
        }
    }

    pub fn id_of(&self, kind: EntityKind) -> Option<&str> {
        match kind {
            EntityKind::DataModel => self.data_model_id.as_deref(),
            EntityKind::Resource => self.resource_id.as_deref(),
            EntityKind::Configuration => self.configuration_id.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data_model_id.is_none() && self.resource_id.is_none() && self.configuration_id.is_none()
    }
}

pub struct InitPhase {
    pub item: WorkItem,
}

impl InitPhase {
    pub fn new(item: WorkItem) -> Self {
        Self { item }
    }

    async fn provision(
        &self,
        ctx: &PhaseContext,
        handle: &mut ProvisionedModelHandle,
    ) -> std::result::Result<(), ServiceError> {
        let config = &ctx.config;
        let seq = self.item.sequence;

        // Resource
        let name = format!("resource for project '{}'", self.item.path.display());
        let description = format!("'resource does not belong to a project' - case {}", seq);
        let resource = ctx
            .client
            .create_resource(&self.item.path, &name, &description)
            .await?;
        let resource_id = uuid_of(&resource, &endpoints::resources_url(&config.api_base))?;
        info!(service = %ctx.service(), item = seq, resource_id = %resource_id, "Input resource created");
        handle.resource_id = Some(resource_id);

        // Configuration
        let template = read_template(config).await?;
        let configuration = ctx.client.create_configuration(&template).await?;
        let configuration_id =
            uuid_of(&configuration, &endpoints::configurations_url(&config.api_base))?;
        info!(service = %ctx.service(), item = seq, configuration_id = %configuration_id, "Configuration created");
        handle.configuration_id = Some(configuration_id);

        // Data model
        let mut body = json!({
            "name": format!("data model {}", seq),
            "description": format!("data model description {}", seq),
            "configuration": configuration,
            "data_resource": resource,
        });
        if let Some(ref schema_id) = config.prototype.input_schema_id {
            let schema = ctx.client.get_schema(schema_id).await?;
            body["schema"] = schema;
        }

        let do_ingest = config.switches.init_data_model_ingest;
        let data_model = ctx.client.create_data_model(&body, do_ingest).await?;
        let data_model_id = uuid_of(
            &data_model,
            &endpoints::create_data_model_url(&config.api_base, do_ingest),
        )?;
        info!(
            service = %ctx.service(),
            item = seq,
            data_model_id = %data_model_id,
            do_ingest,
            "Data model created"
        );
        handle.data_model_id = Some(data_model_id);

        Ok(())
    }
}

async fn read_template(config: &PipelineConfig) -> std::result::Result<Value, ServiceError> {
    let path = config
        .configuration_template
        .as_ref()
        .ok_or_else(|| ServiceError::missing_field("configuration template", CONFIGURATION_NAME))?;

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ServiceError::io(path, e))?;

    serde_json::from_str(&content).map_err(|source| ServiceError::Malformed {
        url: path.display().to_string(),
        source,
    })
}

#[async_trait]
impl Phase for InitPhase {
    type Output = ProvisionedModelHandle;

    fn name(&self) -> PhaseName {
        PhaseName::Init
    }

    fn span(&self, ctx: &PhaseContext) -> tracing::Span {
        info_span!("init", service = %ctx.service(), item = self.item.sequence)
    }

    async fn execute(&self, ctx: &PhaseContext) -> Result<ProvisionedModelHandle> {
        info!(file = %self.item.path.display(), "Starting init");

        let mut handle = ProvisionedModelHandle {
            owned: true,
            item: Some(self.item.clone()),
            ..Default::default()
        };

        match self.provision(ctx, &mut handle).await {
            Ok(()) => Ok(handle),
            Err(source) => {
                if !handle.is_empty() {
                    warn!(
                        item = self.item.sequence,
                        "Init failed after partial provisioning; releasing created entities"
                    );
                    cleanup::release(ctx.client.as_ref(), &handle).await;
                }
                Err(PipelineError::provisioning(
                    self.item.path.display().to_string(),
                    source,
                ))
            }
        }
    }
}
