//! Remote service document helpers

use crate::error::ServiceError;
use serde_json::Value;
use std::fmt;

/// Identifier field of every remote entity document
pub const UUID_FIELD: &str = "uuid";

/// Prefix of an error envelope embedded in an otherwise successful payload
pub const ERROR_ENVELOPE_PREFIX: &str = r#"{"error":{"message"#;

/// How much of a payload is inspected for an error envelope
pub const ENVELOPE_PROBE_CHARS: usize = 10_000;

/// Server-side entities created by Init and released at cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    DataModel,
    Resource,
    Configuration,
}

impl EntityKind {
    /// Collection path segment
    pub fn endpoint(self) -> &'static str {
        match self {
            EntityKind::DataModel => "datamodels",
            EntityKind::Resource => "resources",
            EntityKind::Configuration => "configurations",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::DataModel => "data model",
            EntityKind::Resource => "resource",
            EntityKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Raw answer of the task endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TaskResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// `uuid` of an entity document
pub fn uuid_of(document: &Value, source: &str) -> Result<String, ServiceError> {
    document
        .get(UUID_FIELD)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::missing_field(source, UUID_FIELD))
}

/// Fail with the raw payload if it carries the remote error envelope
pub fn check_error_envelope(payload: &[u8]) -> Result<(), ServiceError> {
    let text = String::from_utf8_lossy(payload);
    let probe: String = text.chars().take(ENVELOPE_PROBE_CHARS).collect();

    if probe.starts_with(ERROR_ENVELOPE_PREFIX) {
        return Err(ServiceError::Envelope(text.into_owned()));
    }

    Ok(())
}
