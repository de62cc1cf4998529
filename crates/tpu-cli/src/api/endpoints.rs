//! API endpoint URL builders
//!
//! Base URLs are expected to end in `/` (see `config::normalize_base_url`).

use crate::api::types::EntityKind;

pub fn resources_url(base_url: &str) -> String {
    format!("{}resources", base_url)
}

pub fn resource_url(base_url: &str, id: &str) -> String {
    format!("{}resources/{}", base_url, id)
}

pub fn configurations_url(base_url: &str) -> String {
    format!("{}configurations", base_url)
}

/// Data model creation, optionally ingesting the resource content
pub fn create_data_model_url(base_url: &str, do_ingest: bool) -> String {
    format!("{}datamodels?doIngest={}", base_url, do_ingest)
}

pub fn data_model_url(base_url: &str, id: &str) -> String {
    format!("{}datamodels/{}", base_url, id)
}

/// Non-versioned delta re-ingest into an existing data model
pub fn reingest_url(base_url: &str, id: &str) -> String {
    format!(
        "{}datamodels/{}/data?format=delta&enableVersioning=false",
        base_url, id
    )
}

pub fn export_url(base_url: &str, id: &str, mime_type: &str) -> String {
    format!(
        "{}datamodels/{}/export?format={}",
        base_url,
        id,
        urlencoding::encode(mime_type)
    )
}

pub fn schema_url(base_url: &str, id: &str) -> String {
    format!("{}schemas/{}", base_url, id)
}

pub fn project_url(base_url: &str, id: &str) -> String {
    format!("{}projects/{}", base_url, id)
}

pub fn tasks_url(base_url: &str) -> String {
    format!("{}tasks", base_url)
}

pub fn schema_indices_url(graph_base_url: &str) -> String {
    format!("{}maintain/schemaindices", graph_base_url)
}

pub fn entity_url(base_url: &str, kind: EntityKind, id: &str) -> String {
    format!("{}{}/{}", base_url, kind.endpoint(), id)
}
