use std::sync::Arc;
use tracing::{debug, error};

use super::{ASSEMBLY_RELATION, ASSOCIATION_DEFINITIONS_INTERFACE};
use crate::bus::{AssociationEdge, Directory};
use crate::error::AssemblyResult;

/// Targets of the "assembly" edges, in declaration order.
pub fn assembly_targets(edges: &[AssociationEdge]) -> Vec<String> {
    edges
        .iter()
        .filter(|edge| edge.kind == ASSEMBLY_RELATION)
        .map(|edge| edge.target.clone())
        .collect()
}

/// Enumerates the assembly members an enclosure declares.
///
/// An enclosure without an association-definitions service, or without any
/// "assembly" edge, simply has no candidates.
pub struct AssociationDiscoverer {
    directory: Arc<dyn Directory>,
}

impl AssociationDiscoverer {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn candidates(&self, enclosure_path: &str) -> AssemblyResult<Vec<String>> {
        debug!("Check {} for association definitions", enclosure_path);

        let services = match self.directory.get_hosting_services(enclosure_path, &[]).await {
            Ok(services) => services,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => {
                error!("Failed to look up services hosting {}: {}", enclosure_path, e);
                return Err(e.into());
            }
        };

        let definitions_service = services
            .iter()
            .find(|(_, interfaces)| interfaces.iter().any(|i| i == ASSOCIATION_DEFINITIONS_INTERFACE))
            .map(|(service, _)| service);

        let Some(service) = definitions_service else {
            debug!("{} declares no associations", enclosure_path);
            return Ok(Vec::new());
        };

        let edges = match self.directory.get_association_definitions(service, enclosure_path).await {
            Ok(edges) => edges,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => {
                error!("Failed to read associations of {}: {}", enclosure_path, e);
                return Err(e.into());
            }
        };

        let targets = assembly_targets(&edges);
        debug!("{} declares {} assembly members", enclosure_path, targets.len());
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, BusOp, InMemoryBus, InventorySnapshot};
    use crate::error::AssemblyError;

    const SVC: &str = "xyz.openbmc_project.Inventory.Manager";
    const CHASSIS: &str = "/inv/chassis";

    fn snapshot() -> InventorySnapshot {
        InventorySnapshot::new()
            .with_interface(CHASSIS, SVC, ASSOCIATION_DEFINITIONS_INTERFACE)
            .with_association(CHASSIS, "assembly", "/inv/chassis/b")
            .with_association(CHASSIS, "sensors", "/sensors/x")
            .with_association(CHASSIS, "assembly", "/inv/chassis/a")
    }

    #[tokio::test]
    async fn test_collects_only_assembly_targets() {
        let discoverer = AssociationDiscoverer::new(Arc::new(InMemoryBus::new(snapshot())));
        let candidates = discoverer.candidates(CHASSIS).await.unwrap();
        assert_eq!(candidates, vec!["/inv/chassis/b", "/inv/chassis/a"]);
    }

    #[tokio::test]
    async fn test_no_definitions_capability_is_empty() {
        let snapshot = InventorySnapshot::new()
            .with_interface(CHASSIS, SVC, "xyz.openbmc_project.Inventory.Item.Chassis")
            .with_association(CHASSIS, "assembly", "/inv/chassis/a");
        let discoverer = AssociationDiscoverer::new(Arc::new(InMemoryBus::new(snapshot)));
        assert!(discoverer.candidates(CHASSIS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_assembly_edges_is_empty() {
        let snapshot = InventorySnapshot::new()
            .with_interface(CHASSIS, SVC, ASSOCIATION_DEFINITIONS_INTERFACE)
            .with_association(CHASSIS, "sensors", "/sensors/x");
        let discoverer = AssociationDiscoverer::new(Arc::new(InMemoryBus::new(snapshot)));
        assert!(discoverer.candidates(CHASSIS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_maps_to_empty_other_errors_to_internal() {
        let bus = Arc::new(InMemoryBus::new(snapshot()));
        bus.fail_on(BusOp::GetAssociationDefinitions, None, BusError::NotFound(CHASSIS.into()))
            .await;
        let discoverer = AssociationDiscoverer::new(bus.clone());
        assert!(discoverer.candidates(CHASSIS).await.unwrap().is_empty());

        bus.clear_faults().await;
        bus.fail_on(BusOp::GetHostingServices, Some(CHASSIS), BusError::NotFound(CHASSIS.into()))
            .await;
        assert!(discoverer.candidates(CHASSIS).await.unwrap().is_empty());
        assert_eq!(bus.calls(BusOp::GetAssociationDefinitions).await.len(), 1);

        bus.clear_faults().await;
        bus.fail_on(BusOp::GetHostingServices, Some(CHASSIS), BusError::failed(16, "busy"))
            .await;
        let err = discoverer.candidates(CHASSIS).await.unwrap_err();
        assert!(matches!(err, AssemblyError::Internal(_)));
    }
}
