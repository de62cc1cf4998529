//! Pipeline orchestration
//!
//! Picks the execution strategy, sequences the phases through the worker
//! pool and releases the entities the run created.
//!
//! Two strategies exist:
//!
//! - **Fully automated**: every file becomes an independent Init + Transform
//!   task; all tasks run as one pool batch and failures stay per file.
//! - **Phased**: global Init, Ingest, Transform and Export phases, each a
//!   barrier. Init, Transform and Export failures are fatal, Ingest failures
//!   are per file. Cleanup runs in every case.

use crate::api::{HttpServiceClient, RemoteServiceClient};
use crate::cleanup::{self, CleanupWarning};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::phases::{
    ExportPhase, IngestPhase, InitPhase, Phase, PhaseContext, ProvisionedModelHandle,
    TransformPhase, TransformResult,
};
use crate::pool::WorkerPool;
use crate::summary::{PhaseName, PhaseOutcome, RunState, Strategy, Summary};
use crate::watch_folder::{self, WorkItem};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Handles of a run, keyed by data model id
type HandleMap = BTreeMap<String, ProvisionedModelHandle>;

/// Run the pipeline against the configured remote service
pub async fn run(config: PipelineConfig) -> Result<Summary> {
    let client = HttpServiceClient::from_config(&config);
    Orchestrator::new(Arc::new(config), Arc::new(client))
        .run()
        .await
}

pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    client: Arc<dyn RemoteServiceClient>,
}

/// Everything one fully-automated file task produced
struct FileTaskReport {
    handle: Option<ProvisionedModelHandle>,
    outcome: Result<TransformResult>,
    cleanup_warnings: Vec<CleanupWarning>,
}

impl Orchestrator {
    pub fn new(config: Arc<PipelineConfig>, client: Arc<dyn RemoteServiceClient>) -> Self {
        Self { config, client }
    }

    fn context(&self) -> PhaseContext {
        PhaseContext::new(Arc::clone(&self.config), Arc::clone(&self.client))
    }

    /// Execute one complete run
    pub async fn run(&self) -> Result<Summary> {
        let started = Instant::now();
        let strategy = self.config.strategy();

        // Nothing remote happens before the input is known
        let items = watch_folder::scan(&self.config.watch_folder)?;

        info!(
            service = %self.config.service_name,
            strategy = %strategy,
            files = items.len(),
            threads = self.config.threads,
            "Starting pipeline run"
        );

        let mut summary = Summary::new(strategy);
        summary.states.push(RunState::Idle);

        if self.config.needs_schema_indices() {
            self.client.prepare_schema_indices().await.map_err(|e| {
                PipelineError::aborted(
                    PhaseName::Init.to_string(),
                    PipelineError::provisioning("schema indices", e),
                )
            })?;
        }

        let pool = WorkerPool::new(self.config.threads);
        let result = match strategy {
            Strategy::FullyAutomated => self.run_fully_automated(&pool, items, &mut summary).await,
            Strategy::Phased => self.run_phased(&pool, items, &mut summary).await,
        };
        pool.shutdown();

        summary.elapsed = started.elapsed();
        result?;

        info!(
            service = %self.config.service_name,
            units = summary.outcomes.len(),
            failed = summary.failures().len(),
            artifacts = summary.artifacts.len(),
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Pipeline run complete"
        );

        Ok(summary)
    }

    // ------------------------------------------------------------------------
    // Fully automated
    // ------------------------------------------------------------------------

    async fn run_fully_automated(
        &self,
        pool: &WorkerPool,
        items: Vec<WorkItem>,
        summary: &mut Summary,
    ) -> Result<()> {
        let total = items.len();
        info!(
            "Processing {} files as independent tasks (threads={})",
            total, self.config.threads
        );

        let tasks: Vec<_> = items
            .iter()
            .cloned()
            .map(|item| {
                let ctx = self.context();
                async move { Ok::<_, PipelineError>(file_task(ctx, item).await) }
            })
            .collect();

        let results = pool.submit_all(tasks).await?;

        for (item, result) in items.into_iter().zip(results) {
            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    error!("✗ Task {} / {} ({}) crashed: {}", item.sequence, total, item.file_name(), e);
                    summary
                        .outcomes
                        .push(PhaseOutcome::failed(PhaseName::Task, Some(item), &e));
                    continue;
                }
            };

            if report.handle.is_some() {
                summary.handles_created += 1;
            }
            summary.cleanup_warnings.extend(report.cleanup_warnings);

            match report.outcome {
                Ok(result) => {
                    info!("✓ Task {} / {} ({})", item.sequence, total, item.file_name());
                    if let TransformResult::Exported(artifact) = result {
                        summary.artifacts.push(artifact);
                    }
                    summary
                        .outcomes
                        .push(PhaseOutcome::succeeded(PhaseName::Task, Some(item)));
                }
                Err(e) => {
                    error!("✗ Task {} / {} ({}) failed: {}", item.sequence, total, item.file_name(), e);
                    summary
                        .outcomes
                        .push(PhaseOutcome::failed(PhaseName::Task, Some(item), &e));
                }
            }
        }

        summary.states.push(RunState::Done);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Phased
    // ------------------------------------------------------------------------

    async fn run_phased(
        &self,
        pool: &WorkerPool,
        items: Vec<WorkItem>,
        summary: &mut Summary,
    ) -> Result<()> {
        let mut handles = HandleMap::new();

        let outcome = self
            .run_phases(pool, items, &mut handles, summary)
            .await;

        enter(summary, RunState::CleaningUp);
        let warnings = cleanup::release_owned(self.client.as_ref(), handles.values()).await;
        summary.cleanup_warnings.extend(warnings);

        match outcome {
            Ok(()) => {
                enter(summary, RunState::Done);
                Ok(())
            }
            Err((phase, e)) => {
                error!(phase = %phase, error = %e, "Pipeline aborted");
                Err(PipelineError::aborted(phase.to_string(), e))
            }
        }
    }

    /// Init through Export; a fatal failure comes back with its phase
    async fn run_phases(
        &self,
        pool: &WorkerPool,
        items: Vec<WorkItem>,
        handles: &mut HandleMap,
        summary: &mut Summary,
    ) -> std::result::Result<(), (PhaseName, PipelineError)> {
        let switches = self.config.switches;

        enter(summary, RunState::Initing);
        let remaining = if switches.do_init {
            self.init_phase(pool, items, handles, summary)
                .await
                .map_err(|e| (PhaseName::Init, e))?
        } else {
            skipped(PhaseName::Init);
            let handle = ProvisionedModelHandle::external(&self.config);
            handles.insert(handle.data_model_id.clone().unwrap_or_default(), handle);
            items
        };

        enter(summary, RunState::Ingesting);
        if switches.do_ingest && !switches.allow_multiple_data_models {
            self.ingest_phase(pool, remaining, handles, summary)
                .await
                .map_err(|e| (PhaseName::Ingest, e))?;
        } else {
            skipped(PhaseName::Ingest);
        }

        enter(summary, RunState::Transforming);
        if switches.do_transform {
            self.transform_phase(pool, handles, summary)
                .await
                .map_err(|e| (PhaseName::Transform, e))?;
        } else {
            skipped(PhaseName::Transform);
        }

        enter(summary, RunState::Exporting);
        if switches.do_export && !switches.allow_multiple_data_models {
            self.export_phase(pool, handles, summary)
                .await
                .map_err(|e| (PhaseName::Export, e))?;
        } else {
            skipped(PhaseName::Export);
        }

        Ok(())
    }

    /// Returns the files left for Ingest
    async fn init_phase(
        &self,
        pool: &WorkerPool,
        items: Vec<WorkItem>,
        handles: &mut HandleMap,
        summary: &mut Summary,
    ) -> Result<Vec<WorkItem>> {
        let switches = self.config.switches;

        let init_items: Vec<WorkItem> = if switches.allow_multiple_data_models {
            items.clone()
        } else {
            items.iter().take(1).cloned().collect()
        };

        let tasks: Vec<_> = init_items
            .iter()
            .cloned()
            .map(|item| {
                let ctx = self.context();
                async move { InitPhase::new(item).run(&ctx).await }
            })
            .collect();

        let results = pool.submit_all(tasks).await?;

        for (item, result) in init_items.iter().zip(&results) {
            match result {
                Ok(handle) => {
                    info!(
                        item = item.sequence,
                        data_model_id = handle.data_model_id.as_deref().unwrap_or_default(),
                        "✓ Init"
                    );
                    summary.handles_created += 1;
                    summary
                        .outcomes
                        .push(PhaseOutcome::succeeded(PhaseName::Init, Some(item.clone())));
                    handles.insert(
                        handle.data_model_id.clone().unwrap_or_default(),
                        handle.clone(),
                    );
                }
                Err(e) => {
                    error!(item = item.sequence, error = %e, "✗ Init");
                    summary
                        .outcomes
                        .push(PhaseOutcome::failed(PhaseName::Init, Some(item.clone()), e));
                }
            }
        }

        if let Some(e) = WorkerPool::first_failure(results) {
            return Err(e);
        }

        // A file only counts as consumed when its content went into the new model
        if switches.init_data_model_ingest {
            Ok(items
                .into_iter()
                .filter(|item| !init_items.contains(item))
                .collect())
        } else {
            Ok(items)
        }
    }

    async fn ingest_phase(
        &self,
        pool: &WorkerPool,
        items: Vec<WorkItem>,
        handles: &HandleMap,
        summary: &mut Summary,
    ) -> Result<()> {
        let Some(handle) = handles.values().next() else {
            return Err(PipelineError::config("no data model available for ingest"));
        };

        if items.is_empty() {
            info!("No files left for ingest");
            return Ok(());
        }

        let total = items.len();
        let tasks: Vec<_> = items
            .iter()
            .cloned()
            .map(|item| {
                let ctx = self.context();
                let phase = IngestPhase::new(item, handle.clone());
                async move { phase.run(&ctx).await }
            })
            .collect();

        let results = pool.submit_all(tasks).await?;

        let mut ingested = 0;
        for (item, result) in items.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    ingested += 1;
                    info!("✓ Ingest {} / {} ({})", item.sequence, total, item.file_name());
                    summary
                        .outcomes
                        .push(PhaseOutcome::succeeded(PhaseName::Ingest, Some(item)));
                }
                Err(e) => {
                    error!("✗ Ingest {} / {} ({}): {}", item.sequence, total, item.file_name(), e);
                    summary
                        .outcomes
                        .push(PhaseOutcome::failed(PhaseName::Ingest, Some(item), &e));
                }
            }
        }

        info!("Ingest complete: {} / {} files successful", ingested, total);
        Ok(())
    }

    async fn transform_phase(
        &self,
        pool: &WorkerPool,
        handles: &HandleMap,
        summary: &mut Summary,
    ) -> Result<()> {
        let switches = self.config.switches;

        let mut phases = Vec::new();
        for handle in handles.values() {
            let input = handle
                .data_model_id
                .clone()
                .ok_or_else(|| PipelineError::config("no input data model for transform"))?;
            let output = output_for(&self.config, &input);
            phases.push((
                handle.item.clone(),
                TransformPhase::new(
                    input,
                    output,
                    switches.do_ingest_on_the_fly,
                    switches.do_export_on_the_fly,
                ),
            ));
        }

        let tasks: Vec<_> = phases
            .into_iter()
            .map(|(item, phase)| {
                let ctx = self.context();
                async move { phase.run(&ctx).await.map(|result| (item, result)) }
            })
            .collect();

        let results = pool.submit_all(tasks).await?;

        for result in &results {
            match result {
                Ok((item, result)) => {
                    if let TransformResult::Exported(artifact) = result {
                        summary.artifacts.push(artifact.clone());
                    }
                    summary
                        .outcomes
                        .push(PhaseOutcome::succeeded(PhaseName::Transform, item.clone()));
                }
                Err(e) => {
                    summary
                        .outcomes
                        .push(PhaseOutcome::failed(PhaseName::Transform, None, e));
                }
            }
        }

        match WorkerPool::first_failure(results) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn export_phase(
        &self,
        pool: &WorkerPool,
        handles: &HandleMap,
        summary: &mut Summary,
    ) -> Result<()> {
        let data_model_id = self
            .config
            .prototype
            .output_data_model_id
            .clone()
            .or_else(|| handles.values().find_map(|h| h.data_model_id.clone()))
            .ok_or_else(|| PipelineError::config("no data model to export"))?;

        let ctx = self.context();
        let phase = ExportPhase::new(data_model_id);
        let results = pool
            .submit_all(vec![async move { phase.run(&ctx).await }])
            .await?;

        for result in results {
            match result {
                Ok(artifact) => {
                    summary.artifacts.push(artifact);
                    summary
                        .outcomes
                        .push(PhaseOutcome::succeeded(PhaseName::Export, None));
                }
                Err(e) => {
                    summary
                        .outcomes
                        .push(PhaseOutcome::failed(PhaseName::Export, None, &e));
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

/// Configured output model, or the input model itself
fn output_for(config: &PipelineConfig, input: &str) -> String {
    match config.prototype.output_data_model_id {
        Some(ref output) => output.clone(),
        None => {
            warn!(
                input_data_model_id = input,
                "No output data model configured; writing into the input data model"
            );
            input.to_string()
        }
    }
}

/// One fully-automated file: Init, then Transform with on-the-fly ingest and export
async fn file_task(ctx: PhaseContext, item: WorkItem) -> FileTaskReport {
    let seq = item.sequence;

    let handle = match InitPhase::new(item).run(&ctx).await {
        Ok(handle) => handle,
        Err(e) => {
            return FileTaskReport {
                handle: None,
                outcome: Err(PipelineError::task(seq, e)),
                cleanup_warnings: Vec::new(),
            }
        }
    };

    let input = handle.data_model_id.clone().unwrap_or_default();
    let output = output_for(&ctx.config, &input);

    let outcome = TransformPhase::new(input, output, true, true)
        .run(&ctx)
        .await
        .map_err(|e| PipelineError::task(seq, e));

    let cleanup_warnings = if ctx.config.switches.cleanup_after_transform {
        cleanup::release(ctx.client.as_ref(), &handle).await
    } else {
        Vec::new()
    };

    FileTaskReport {
        handle: Some(handle),
        outcome,
        cleanup_warnings,
    }
}

fn enter(summary: &mut Summary, state: RunState) {
    info!(state = %state, "Entering state");
    summary.states.push(state);
}

fn skipped(phase: PhaseName) {
    info!(phase = %phase, "Phase skipped");
}
