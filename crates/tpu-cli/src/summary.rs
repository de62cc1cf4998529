//! Run bookkeeping: strategy, state sequence and per-unit outcomes

use crate::cleanup::CleanupWarning;
use crate::config::Switches;
use crate::error::PipelineError;
use crate::phases::ExportArtifact;
use crate::watch_folder::WorkItem;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// How the orchestrator schedules the phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One independent Init + Transform task per file
    FullyAutomated,
    /// Global Init, Ingest, Transform and Export phases in order
    Phased,
}

impl Strategy {
    /// Fully automated only when all five switches hold
    pub fn select(switches: &Switches) -> Self {
        if switches.do_init
            && switches.allow_multiple_data_models
            && switches.do_transform
            && switches.do_ingest_on_the_fly
            && switches.do_export_on_the_fly
        {
            Strategy::FullyAutomated
        } else {
            Strategy::Phased
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::FullyAutomated => f.write_str("fully-automated"),
            Strategy::Phased => f.write_str("phased"),
        }
    }
}

/// Kind of unit of remote work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseName {
    Init,
    Ingest,
    Transform,
    Export,
    /// A fully-automated per-file task (Init followed by Transform)
    Task,
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseName::Init => "init",
            PhaseName::Ingest => "ingest",
            PhaseName::Transform => "transform",
            PhaseName::Export => "export",
            PhaseName::Task => "task",
        };
        f.write_str(name)
    }
}

/// States of the phased run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Initing,
    Ingesting,
    Transforming,
    Exporting,
    CleaningUp,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure details of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseFailure {
    pub message: String,
    /// Message of the deepest cause, usually the remote payload
    pub root_cause: String,
}

impl From<&PipelineError> for PhaseFailure {
    fn from(err: &PipelineError) -> Self {
        Self {
            message: err.to_string(),
            root_cause: err.root_cause(),
        }
    }
}

/// Result of one unit of work
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase: PhaseName,
    pub item: Option<WorkItem>,
    pub failure: Option<PhaseFailure>,
}

impl PhaseOutcome {
    pub fn succeeded(phase: PhaseName, item: Option<WorkItem>) -> Self {
        Self {
            phase,
            item,
            failure: None,
        }
    }

    pub fn failed(phase: PhaseName, item: Option<WorkItem>, err: &PipelineError) -> Self {
        Self {
            phase,
            item,
            failure: Some(PhaseFailure::from(err)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Aggregate result of a finished run
#[derive(Debug, Clone)]
pub struct Summary {
    pub strategy: Strategy,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// States in the order they were entered
    pub states: Vec<RunState>,
    pub outcomes: Vec<PhaseOutcome>,
    pub handles_created: usize,
    pub artifacts: Vec<ExportArtifact>,
    pub cleanup_warnings: Vec<CleanupWarning>,
}

impl Summary {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            states: Vec::new(),
            outcomes: Vec::new(),
            handles_created: 0,
            artifacts: Vec::new(),
            cleanup_warnings: Vec::new(),
        }
    }

    pub fn failures(&self) -> Vec<&PhaseOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(PhaseOutcome::is_success)
    }

    /// Outcomes of one phase kind
    pub fn outcomes_of(&self, phase: PhaseName) -> impl Iterator<Item = &PhaseOutcome> {
        self.outcomes.iter().filter(move |o| o.phase == phase)
    }

    /// One-line description for the final run message
    pub fn headline(&self) -> String {
        let failed = self.failures().len();
        format!(
            "{} run finished in {:.1}s (started {}): {} unit(s), {} failed, {} artifact(s), {} cleanup warning(s)",
            self.strategy,
            self.elapsed.as_secs_f64(),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.outcomes.len(),
            failed,
            self.artifacts.len(),
            self.cleanup_warnings.len()
        )
    }
}
