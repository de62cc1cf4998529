//! Release of transient server-side entities
//!
//! Deletion order is data model, resource, configuration. Every deletion is
//! attempted on its own; failures become [`CleanupWarning`]s and never errors.

use crate::api::{EntityKind, RemoteServiceClient};
use crate::phases::ProvisionedModelHandle;
use tracing::{info, warn};

const DELETION_ORDER: [EntityKind; 3] = [
    EntityKind::DataModel,
    EntityKind::Resource,
    EntityKind::Configuration,
];

/// A deletion that did not go through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub entity: EntityKind,
    pub id: String,
    pub message: String,
}

/// Delete every entity of a handle; missing identifiers are skipped
pub async fn release(
    client: &dyn RemoteServiceClient,
    handle: &ProvisionedModelHandle,
) -> Vec<CleanupWarning> {
    let mut warnings = Vec::new();

    for kind in DELETION_ORDER {
        let Some(id) = handle.id_of(kind) else {
            continue;
        };

        match client.delete_entity(kind, id).await {
            Ok(()) => info!(entity = %kind, id, "Deleted"),
            Err(e) => {
                warn!(entity = %kind, id, error = %e, "Cleanup deletion failed");
                warnings.push(CleanupWarning {
                    entity: kind,
                    id: id.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    warnings
}

/// Release every handle this run created; handles it did not create are left alone
pub async fn release_owned<'a, I>(client: &dyn RemoteServiceClient, handles: I) -> Vec<CleanupWarning>
where
    I: IntoIterator<Item = &'a ProvisionedModelHandle>,
{
    let mut warnings = Vec::new();

    for handle in handles {
        if !handle.owned {
            continue;
        }
        warnings.extend(release(client, handle).await);
    }

    warnings
}
