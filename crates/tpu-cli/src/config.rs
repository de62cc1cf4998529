//! Pipeline configuration
//!
//! Built once from a properties file and shared read-only (behind an `Arc`)
//! by every component of a run.

use crate::error::{PipelineError, Result};
use crate::summary::Strategy;
use std::path::PathBuf;
use tpu_common::Properties;

// ============================================================================
// Property Keys
// ============================================================================

pub const SERVICE_NAME: &str = "service.name";
pub const SERVICE_LOG_LEVEL: &str = "service.log.level";
pub const ENGINE_THREADS: &str = "engine.threads";
pub const ENGINE_DSWARM_API: &str = "engine.dswarm.api";
pub const ENGINE_DSWARM_GRAPH_API: &str = "engine.dswarm.graph.api";
pub const RESOURCE_WATCHFOLDER: &str = "resource.watchfolder";
pub const CONFIGURATION_NAME: &str = "configuration.name";
pub const INIT_DO: &str = "init.do";
pub const INIT_MULTIPLE_DATA_MODELS: &str = "init.multiple_data_models";
pub const INIT_DATA_MODEL_DO_INGEST: &str = "init.data_model.do_ingest";
pub const INGEST_DO: &str = "ingest.do";
pub const TRANSFORM_DO: &str = "transform.do";
pub const TASK_DO_INGEST_ON_THE_FLY: &str = "task.do_ingest_on_the_fly";
pub const TASK_DO_EXPORT_ON_THE_FLY: &str = "task.do_export_on_the_fly";
pub const TASK_CLEANUP_AFTER_TRANSFORM: &str = "task.cleanup_after_transform";
pub const EXPORT_DO: &str = "export.do";
pub const EXPORT_MIME_TYPE: &str = "export.mime_type";
pub const EXPORT_FILE_EXTENSION: &str = "export.file_extension";
pub const RESULTS_PERSIST_IN_DMP: &str = "results.persistInDMP";
pub const RESULTS_PERSIST_IN_FOLDER: &str = "results.persistInFolder";
pub const RESULTS_FOLDER: &str = "results.folder";
pub const PROTOTYPE_DATA_MODEL_ID: &str = "prototype.dataModelID";
pub const PROTOTYPE_RESOURCE_ID: &str = "prototype.resourceID";
pub const PROTOTYPE_OUTPUT_DATA_MODEL_ID: &str = "prototype.outputDataModelID";
pub const PROTOTYPE_INPUT_SCHEMA_ID: &str = "prototype.inputSchemaID";
pub const PROTOTYPE_PROJECT_IDS: &str = "prototype.projectIDs";
pub const PROTOTYPE_PROJECT_ID: &str = "prototype.projectID";
pub const PROJECT_NAME: &str = "project.name";

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVICE_NAME: &str = "tpu";
pub const DEFAULT_THREADS: usize = 1;
pub const DEFAULT_EXPORT_MIME_TYPE: &str = "application/xml";
pub const DEFAULT_EXPORT_FILE_EXTENSION: &str = "xml";
pub const DEFAULT_PROJECT_NAME: &str = "tpu-project";

/// Phase switches of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Switches {
    pub do_init: bool,
    pub allow_multiple_data_models: bool,
    /// Ingest the file content when Init creates the data model
    pub init_data_model_ingest: bool,
    pub do_ingest: bool,
    pub do_transform: bool,
    pub do_ingest_on_the_fly: bool,
    pub do_export_on_the_fly: bool,
    /// Release per-file entities at the end of a fully-automated task
    pub cleanup_after_transform: bool,
    pub do_export: bool,
}

/// Where and how export payloads end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSettings {
    /// Value of the task's `persist` flag
    pub persist_in_dmp: bool,
    pub persist_in_folder: bool,
    pub folder: Option<PathBuf>,
    pub mime_type: String,
    pub file_extension: String,
}

/// Identifiers supplied from outside the run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrototypeIds {
    pub data_model_id: Option<String>,
    pub resource_id: Option<String>,
    pub output_data_model_id: Option<String>,
    pub input_schema_id: Option<String>,
    pub project_ids: Vec<String>,
}

/// Immutable configuration snapshot of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub service_name: String,
    pub threads: usize,
    /// Base URL of the remote service, always ending in `/`
    pub api_base: String,
    /// Base URL for index maintenance, always ending in `/`
    pub graph_api_base: String,
    pub watch_folder: PathBuf,
    pub configuration_template: Option<PathBuf>,
    pub project_name: String,
    pub switches: Switches,
    pub results: ResultSettings,
    pub prototype: PrototypeIds,
}

impl PipelineConfig {
    /// Build and validate a configuration from loaded properties
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let threads = props.parse::<usize>(ENGINE_THREADS)?.unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            return Err(PipelineError::config(format!(
                "'{}' must be at least 1",
                ENGINE_THREADS
            )));
        }

        let api_base = normalize_base_url(props.require(ENGINE_DSWARM_API)?);
        let graph_api_base = props
            .get(ENGINE_DSWARM_GRAPH_API)
            .map(normalize_base_url)
            .unwrap_or_else(|| api_base.clone());

        let switches = Switches {
            do_init: props.bool_or(INIT_DO, false),
            allow_multiple_data_models: props.bool_or(INIT_MULTIPLE_DATA_MODELS, false),
            init_data_model_ingest: props.bool_or(INIT_DATA_MODEL_DO_INGEST, true),
            do_ingest: props.bool_or(INGEST_DO, false),
            do_transform: props.bool_or(TRANSFORM_DO, false),
            do_ingest_on_the_fly: props.bool_or(TASK_DO_INGEST_ON_THE_FLY, false),
            do_export_on_the_fly: props.bool_or(TASK_DO_EXPORT_ON_THE_FLY, false),
            cleanup_after_transform: props.bool_or(TASK_CLEANUP_AFTER_TRANSFORM, false),
            do_export: props.bool_or(EXPORT_DO, false),
        };

        let results = ResultSettings {
            persist_in_dmp: props.bool_or(RESULTS_PERSIST_IN_DMP, false),
            persist_in_folder: props.bool_or(RESULTS_PERSIST_IN_FOLDER, false),
            folder: props.get(RESULTS_FOLDER).map(PathBuf::from),
            mime_type: props
                .get_string(EXPORT_MIME_TYPE)
                .unwrap_or_else(|| DEFAULT_EXPORT_MIME_TYPE.to_string()),
            file_extension: props
                .get(EXPORT_FILE_EXTENSION)
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or_else(|| DEFAULT_EXPORT_FILE_EXTENSION.to_string()),
        };

        let mut project_ids = props.get_list(PROTOTYPE_PROJECT_IDS);
        if project_ids.is_empty() {
            project_ids = props.get_list(PROTOTYPE_PROJECT_ID);
        }

        let prototype = PrototypeIds {
            data_model_id: props.get_string(PROTOTYPE_DATA_MODEL_ID),
            resource_id: props.get_string(PROTOTYPE_RESOURCE_ID),
            output_data_model_id: props.get_string(PROTOTYPE_OUTPUT_DATA_MODEL_ID),
            input_schema_id: props.get_string(PROTOTYPE_INPUT_SCHEMA_ID),
            project_ids,
        };

        let config = Self {
            service_name: props
                .get_string(SERVICE_NAME)
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            threads,
            api_base,
            graph_api_base,
            watch_folder: PathBuf::from(props.require(RESOURCE_WATCHFOLDER)?),
            configuration_template: props.get(CONFIGURATION_NAME).map(PathBuf::from),
            project_name: props
                .get_string(PROJECT_NAME)
                .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string()),
            switches,
            results,
            prototype,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.switches.do_init && self.configuration_template.is_none() {
            return Err(missing(CONFIGURATION_NAME, INIT_DO));
        }

        if self.results.persist_in_folder && self.results.folder.is_none() {
            return Err(missing(RESULTS_FOLDER, RESULTS_PERSIST_IN_FOLDER));
        }

        if self.switches.do_transform && self.prototype.project_ids.is_empty() {
            return Err(missing(PROTOTYPE_PROJECT_IDS, TRANSFORM_DO));
        }

        if !self.switches.do_init
            && self.switches.do_transform
            && self.prototype.data_model_id.is_none()
        {
            return Err(PipelineError::config(format!(
                "'{}' is required when '{}' is enabled without '{}'",
                PROTOTYPE_DATA_MODEL_ID, TRANSFORM_DO, INIT_DO
            )));
        }

        Ok(())
    }

    /// Execution strategy selected by the phase switches
    pub fn strategy(&self) -> Strategy {
        Strategy::select(&self.switches)
    }

    /// Whether `maintain/schemaindices` has to be called before Init
    pub fn needs_schema_indices(&self) -> bool {
        self.switches.do_init && self.switches.init_data_model_ingest
    }

    /// Artifact path for an export of the given data model, when results go to a folder
    pub fn artifact_path(&self, data_model_id: &str) -> Option<PathBuf> {
        if !self.results.persist_in_folder {
            return None;
        }

        self.results.folder.as_ref().map(|folder| {
            folder.join(format!(
                "export-of-{}.{}",
                data_model_id, self.results.file_extension
            ))
        })
    }
}

fn missing(key: &str, because: &str) -> PipelineError {
    PipelineError::config(format!(
        "'{}' is required when '{}' is enabled",
        key, because
    ))
}

/// Ensure a base URL ends with exactly one `/`
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_props() -> Properties {
        Properties::from_pairs([
            (ENGINE_DSWARM_API, "http://localhost:8087/dmp"),
            (RESOURCE_WATCHFOLDER, "/data/in"),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_properties(&base_props()).unwrap();

        assert_eq!(config.service_name, DEFAULT_SERVICE_NAME);
        assert_eq!(config.threads, 1);
        assert_eq!(config.api_base, "http://localhost:8087/dmp/");
        assert_eq!(config.graph_api_base, config.api_base);
        assert_eq!(config.switches, Switches {
            init_data_model_ingest: true,
            ..Switches::default()
        });
        assert_eq!(config.results.mime_type, "application/xml");
        assert_eq!(config.results.file_extension, "xml");
        assert_eq!(config.project_name, DEFAULT_PROJECT_NAME);
        assert!(config.artifact_path("dm").is_none());
    }

    #[test]
    fn test_missing_required_keys() {
        let props = Properties::from_pairs([(RESOURCE_WATCHFOLDER, "/data/in")]);
        let err = PipelineConfig::from_properties(&props).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains(ENGINE_DSWARM_API));

        let props = Properties::from_pairs([(ENGINE_DSWARM_API, "http://x/")]);
        let err = PipelineConfig::from_properties(&props).unwrap_err();
        assert!(err.to_string().contains(RESOURCE_WATCHFOLDER));
    }

    #[test]
    fn test_invalid_thread_count() {
        for value in ["0", "four", "-1"] {
            let mut props = base_props();
            props.set(ENGINE_THREADS, value);
            let err = PipelineConfig::from_properties(&props).unwrap_err();
            assert!(err.is_config(), "value {value} should be rejected");
        }
    }

    #[test]
    fn test_conditional_requirements() {
        let mut props = base_props();
        props.set(INIT_DO, "true");
        assert!(PipelineConfig::from_properties(&props).is_err());
        props.set(CONFIGURATION_NAME, "conf/configuration.json");
        assert!(PipelineConfig::from_properties(&props).is_ok());

        props.set(RESULTS_PERSIST_IN_FOLDER, "TRUE");
        assert!(PipelineConfig::from_properties(&props).is_err());
        props.set(RESULTS_FOLDER, "/data/out");
        assert!(PipelineConfig::from_properties(&props).is_ok());

        props.set(TRANSFORM_DO, "true");
        let err = PipelineConfig::from_properties(&props).unwrap_err();
        assert!(err.to_string().contains(PROTOTYPE_PROJECT_IDS));
        props.set(PROTOTYPE_PROJECT_ID, "project-1");
        let config = PipelineConfig::from_properties(&props).unwrap();
        assert_eq!(config.prototype.project_ids, vec!["project-1"]);
    }

    #[test]
    fn test_transform_without_init_needs_input_model() {
        let mut props = base_props();
        props.set(TRANSFORM_DO, "true");
        props.set(PROTOTYPE_PROJECT_IDS, "p1,p2");
        assert!(PipelineConfig::from_properties(&props).is_err());

        props.set(PROTOTYPE_DATA_MODEL_ID, "dm-1");
        let config = PipelineConfig::from_properties(&props).unwrap();
        assert_eq!(config.prototype.project_ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_artifact_path_and_graph_api() {
        let mut props = base_props();
        props.set(ENGINE_DSWARM_GRAPH_API, "http://graph:7474/graph///");
        props.set(RESULTS_PERSIST_IN_FOLDER, "true");
        props.set(RESULTS_FOLDER, "/data/out");
        props.set(EXPORT_FILE_EXTENSION, ".nt");

        let config = PipelineConfig::from_properties(&props).unwrap();
        assert_eq!(config.graph_api_base, "http://graph:7474/graph/");
        assert_eq!(
            config.artifact_path("dm-7").unwrap(),
            PathBuf::from("/data/out/export-of-dm-7.nt")
        );
    }

    #[test]
    fn test_schema_indices_needed_only_with_init_ingest() {
        let mut props = base_props();
        props.set(INIT_DO, "true");
        props.set(CONFIGURATION_NAME, "conf.json");
        assert!(PipelineConfig::from_properties(&props)
            .unwrap()
            .needs_schema_indices());

        props.set(INIT_DATA_MODEL_DO_INGEST, "false");
        assert!(!PipelineConfig::from_properties(&props)
            .unwrap()
            .needs_schema_indices());
    }
}
