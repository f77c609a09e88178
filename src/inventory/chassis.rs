use std::sync::Arc;
use tracing::{debug, error};

use super::CHASSIS_INTERFACE;
use crate::bus::{leaf_name, Directory};
use crate::error::{AssemblyError, AssemblyResult};

/// A resolved enclosure: the id the client used and the backend path behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub id: String,
    pub path: String,
}

/// Maps a human-facing enclosure id onto its backend object path.
pub struct ChassisResolver {
    directory: Arc<dyn Directory>,
}

impl ChassisResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// First enclosure whose final path segment equals `chassis_id`.
    pub async fn resolve(&self, chassis_id: &str) -> AssemblyResult<Enclosure> {
        let not_found = || AssemblyError::ResourceNotFound {
            kind: "Chassis",
            id: chassis_id.to_string(),
        };
        if chassis_id.is_empty() {
            return Err(not_found());
        }

        let paths = match self.directory.resolve_objects_by_interface(&[CHASSIS_INTERFACE]).await {
            Ok(paths) => paths,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                error!("Failed to enumerate chassis objects: {}", e);
                return Err(e.into());
            }
        };

        for path in paths {
            debug!("Chassis path from directory {}", path);
            if leaf_name(&path) == chassis_id {
                return Ok(Enclosure {
                    id: chassis_id.to_string(),
                    path,
                });
            }
        }

        error!("Chassis {} not found", chassis_id);
        Err(not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, BusOp, InMemoryBus, InventorySnapshot};

    const SVC: &str = "xyz.openbmc_project.Inventory.Manager";

    fn bus() -> Arc<InMemoryBus> {
        Arc::new(InMemoryBus::new(
            InventorySnapshot::new()
                .with_interface("/xyz/openbmc_project/inventory/system/chassis", SVC, CHASSIS_INTERFACE)
                .with_interface("/xyz/openbmc_project/inventory/system/chassis/motherboard", SVC, "other"),
        ))
    }

    #[tokio::test]
    async fn test_resolves_by_final_segment() {
        let resolver = ChassisResolver::new(bus());
        let enclosure = resolver.resolve("chassis").await.unwrap();
        assert_eq!(enclosure.path, "/xyz/openbmc_project/inventory/system/chassis");
    }

    #[tokio::test]
    async fn test_unknown_id_is_resource_not_found() {
        let resolver = ChassisResolver::new(bus());
        for id in ["motherboard", "system", ""] {
            let err = resolver.resolve(id).await.unwrap_err();
            assert!(matches!(err, AssemblyError::ResourceNotFound { kind: "Chassis", .. }), "{}", id);
        }
    }

    #[tokio::test]
    async fn test_directory_failure_is_internal() {
        let bus = bus();
        bus.fail_on(BusOp::ResolveObjects, None, BusError::failed(5, "mapper down")).await;
        let err = ChassisResolver::new(bus).resolve("chassis").await.unwrap_err();
        assert!(matches!(err, AssemblyError::Internal(_)));
    }

    #[tokio::test]
    async fn test_directory_not_found_is_resource_not_found() {
        let bus = bus();
        bus.fail_on(BusOp::ResolveObjects, None, BusError::NotFound("/".into())).await;
        let err = ChassisResolver::new(bus).resolve("chassis").await.unwrap_err();
        assert!(matches!(err, AssemblyError::ResourceNotFound { .. }));
    }
}
