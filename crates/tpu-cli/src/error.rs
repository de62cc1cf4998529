//! Error types for the Task Processing Unit
//!
//! Two layers:
//!
//! - [`ServiceError`]: a single remote call (or the local file I/O around it)
//!   went wrong. Always the leaf of a cause chain.
//! - [`PipelineError`]: what the orchestrator reports, tagged with the phase
//!   and the work item the failure belongs to.
//!
//! The remote service reports some failures inside nominally successful
//! responses, so the original payload has to survive all wrapping.
//! [`PipelineError::root_cause`] digs it back out.

use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;
use tpu_common::CommonError;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure of one remote call
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Server answered with an unexpected status code
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Request never produced a response
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body lacks an expected field
    #[error("Response from {url} has no '{field}'")]
    MissingField { url: String, field: String },

    /// Response body is not the JSON we expected
    #[error("Malformed response from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Error envelope returned inside a successful response; displays the raw payload
    #[error("{0}")]
    Envelope(String),

    /// Local file could not be read or written
    #[error("File operation on '{}' failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    pub fn status(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::Status {
            method: method.into(),
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn missing_field(url: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            url: url.into(),
            field: field.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Comprehensive error type for a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration is missing or invalid; raised before any phase runs
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file system failure outside of a phase
    #[error("File operation on '{}' failed: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Init could not create resource, configuration or data model
    #[error("Provisioning for '{file}' failed")]
    Provisioning {
        file: String,
        #[source]
        source: ServiceError,
    },

    /// Ingest of a file into an existing data model failed
    #[error("Ingest of '{file}' failed")]
    Ingest {
        file: String,
        #[source]
        source: ServiceError,
    },

    /// Task execution failed
    #[error("Transformation of data model '{input}' into '{output}' failed")]
    Transform {
        input: String,
        output: String,
        #[source]
        source: ServiceError,
    },

    /// Export of a data model failed
    #[error("Export of data model '{data_model}' failed")]
    Export {
        data_model: String,
        #[source]
        source: ServiceError,
    },

    /// One fully-automated per-file task failed
    #[error("Task for work item {item} failed")]
    Task {
        item: usize,
        #[source]
        source: Box<PipelineError>,
    },

    /// A fatal failure that stopped the run after cleanup
    #[error("Pipeline aborted in phase {phase}")]
    Aborted {
        phase: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// A worker task panicked or was torn down
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Work was submitted to a pool that was already shut down
    #[error("Worker pool is shut down")]
    PoolClosed,
}

impl PipelineError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn provisioning(file: impl Into<String>, source: ServiceError) -> Self {
        Self::Provisioning {
            file: file.into(),
            source,
        }
    }

    pub fn ingest(file: impl Into<String>, source: ServiceError) -> Self {
        Self::Ingest {
            file: file.into(),
            source,
        }
    }

    pub fn transform(
        input: impl Into<String>,
        output: impl Into<String>,
        source: ServiceError,
    ) -> Self {
        Self::Transform {
            input: input.into(),
            output: output.into(),
            source,
        }
    }

    pub fn export(data_model: impl Into<String>, source: ServiceError) -> Self {
        Self::Export {
            data_model: data_model.into(),
            source,
        }
    }

    pub fn task(item: usize, source: PipelineError) -> Self {
        Self::Task {
            item,
            source: Box::new(source),
        }
    }

    pub fn aborted(phase: impl Into<String>, source: PipelineError) -> Self {
        Self::Aborted {
            phase: phase.into(),
            source: Box::new(source),
        }
    }

    /// Message of the deepest error in the `source()` chain
    pub fn root_cause(&self) -> String {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current.to_string()
    }

    /// Whether this is a configuration error, possibly wrapped
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Aborted { source, .. } | Self::Task { source, .. } => source.is_config(),
            _ => false,
        }
    }
}

impl From<CommonError> for PipelineError {
    fn from(err: CommonError) -> Self {
        Self::Config(err.to_string())
    }
}
