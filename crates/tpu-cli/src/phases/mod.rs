//! Phase executors
//!
//! Each phase wraps one unit of remote work and can run on its own. The
//! orchestrator decides which phases run, in which order and how often.

pub mod export;
pub mod ingest;
pub mod init;
pub mod transform;

pub use export::ExportPhase;
pub use ingest::IngestPhase;
pub use init::{InitPhase, ProvisionedModelHandle};
pub use transform::{TransformPhase, TransformResult};

use crate::api::{check_error_envelope, RemoteServiceClient};
use crate::config::PipelineConfig;
use crate::error::{Result, ServiceError};
use crate::summary::PhaseName;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// What every phase gets to work with
#[derive(Clone)]
pub struct PhaseContext {
    pub config: Arc<PipelineConfig>,
    pub client: Arc<dyn RemoteServiceClient>,
}

impl PhaseContext {
    pub fn new(config: Arc<PipelineConfig>, client: Arc<dyn RemoteServiceClient>) -> Self {
        Self { config, client }
    }

    pub fn service(&self) -> &str {
        &self.config.service_name
    }
}

/// One unit of remote work
#[async_trait]
pub trait Phase: Send + Sync {
    type Output: Send;

    fn name(&self) -> PhaseName;

    /// Span the unit runs in
    fn span(&self, ctx: &PhaseContext) -> tracing::Span;

    async fn execute(&self, ctx: &PhaseContext) -> Result<Self::Output>;

    /// Execute inside the phase's span
    async fn run(&self, ctx: &PhaseContext) -> Result<Self::Output> {
        let span = self.span(ctx);
        let phase = self.name();
        let result = self.execute(ctx).instrument(span).await;
        if let Err(ref e) = result {
            tracing::debug!(%phase, error = %e, "Phase unit failed");
        }
        result
    }
}

/// An export payload received from the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub data_model_id: String,
    /// Where the payload was written, if results go to a folder
    pub path: Option<PathBuf>,
    pub bytes: usize,
}

/// Write a payload to its artifact file (when configured) and reject error envelopes
pub(crate) async fn persist_payload(
    config: &PipelineConfig,
    data_model_id: &str,
    payload: &[u8],
) -> std::result::Result<ExportArtifact, ServiceError> {
    let path = config.artifact_path(data_model_id);

    if let Some(ref path) = path {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::io(parent, e))?;
        }

        tokio::fs::write(path, payload)
            .await
            .map_err(|e| ServiceError::io(path, e))?;

        tracing::info!(
            data_model_id,
            path = %path.display(),
            bytes = payload.len(),
            "Export payload written"
        );
    }

    check_error_envelope(payload)?;

    Ok(ExportArtifact {
        data_model_id: data_model_id.to_string(),
        path,
        bytes: payload.len(),
    })
}
