use std::sync::Arc;
use tracing::{debug, error};

use super::{
    assembly_targets, intersect, OrderedMembers, ASSEMBLY_INTERFACES, CHASSIS_INTERFACE, INVENTORY_ROOT,
};
use crate::bus::{leaf_name, BusError, Directory};
use crate::error::{AssemblyError, AssemblyResult};

/// Replace the last occurrence of `name` in `uri` with `index`.
pub fn substitute_id(uri: &str, name: &str, index: usize) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    let at = uri.rfind(name)?;
    Some(format!("{}{}{}", &uri[..at], index, &uri[at + name.len()..]))
}

/// Rewrites URIs that name an assembly member by display name into ones that
/// use its ordinal id. Used by resources outside this collection that link
/// to a member, so the ids must come from the same ordering as the read path.
///
/// Unlike the read path, nothing here is an expected empty result: every
/// miss is an internal error.
pub struct AssemblyIdResolver {
    directory: Arc<dyn Directory>,
}

impl AssemblyIdResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn fill_assembly_id(
        &self,
        parent_service: &str,
        parent_path: &str,
        parent_interface: &str,
        child_path: &str,
        uri: &str,
    ) -> AssemblyResult<String> {
        if parent_interface != CHASSIS_INTERFACE {
            return Err(AssemblyError::internal(format!(
                "assembly ids are not supported under {}",
                parent_interface
            )));
        }

        let edges = self
            .directory
            .get_association_definitions(parent_service, parent_path)
            .await
            .map_err(|e| failure(parent_path, e))?;
        let targets = assembly_targets(&edges);
        if targets.is_empty() {
            return Err(AssemblyError::internal(format!("{} has no assembly associations", parent_path)));
        }

        let subtree = self
            .directory
            .get_subtree(INVENTORY_ROOT, &ASSEMBLY_INTERFACES, 0)
            .await
            .map_err(|e| failure(INVENTORY_ROOT, e))?;
        let members = OrderedMembers::new(intersect(&targets, &subtree));
        if members.is_empty() {
            return Err(AssemblyError::internal(format!("{} has no implemented assemblies", parent_path)));
        }

        let index = members
            .position(child_path)
            .ok_or_else(|| AssemblyError::internal(format!("{} is not an assembly of {}", child_path, parent_path)))?;
        let name = leaf_name(child_path);
        let filled = substitute_id(uri, name, index)
            .ok_or_else(|| AssemblyError::internal(format!("'{}' does not appear in {}", name, uri)))?;

        debug!("Assembly id of {} is {}", child_path, index);
        Ok(filled)
    }
}

fn failure(path: &str, e: BusError) -> AssemblyError {
    error!("Assembly id lookup failed at {}: {}", path, e);
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusOp, InMemoryBus, InventorySnapshot};
    use crate::inventory::ASSOCIATION_DEFINITIONS_INTERFACE;

    const SVC: &str = "xyz.openbmc_project.Inventory.Manager";
    const BOARD: &str = "xyz.openbmc_project.Inventory.Item.Board";
    const CHASSIS: &str = "/xyz/openbmc_project/inventory/system/chassis";

    fn child(name: &str) -> String {
        format!("{}/{}", CHASSIS, name)
    }

    fn resolver() -> (Arc<InMemoryBus>, AssemblyIdResolver) {
        let bus = Arc::new(InMemoryBus::new(
            InventorySnapshot::new()
                .with_interface(CHASSIS, SVC, CHASSIS_INTERFACE)
                .with_interface(CHASSIS, SVC, ASSOCIATION_DEFINITIONS_INTERFACE)
                .with_interface(&child("vrm0"), SVC, BOARD)
                .with_interface(&child("dimm_panel"), SVC, BOARD)
                .with_association(CHASSIS, "assembly", &child("vrm0"))
                .with_association(CHASSIS, "assembly", &child("ghost"))
                .with_association(CHASSIS, "assembly", &child("dimm_panel")),
        ));
        (bus.clone(), AssemblyIdResolver::new(bus))
    }

    #[test]
    fn test_substitute_last_occurrence() {
        assert_eq!(
            substitute_id("/Chassis/vrm/Assembly/vrm", "vrm", 4).as_deref(),
            Some("/Chassis/vrm/Assembly/4")
        );
        assert_eq!(substitute_id("/a/b", "c", 0), None);
        assert_eq!(substitute_id("/a/b", "", 0), None);
    }

    #[tokio::test]
    async fn test_id_matches_read_ordering() {
        let (_, resolver) = resolver();
        let uri = "/redfish/v1/Chassis/chassis/Assembly#/Assemblies/vrm0";
        let filled = resolver
            .fill_assembly_id(SVC, CHASSIS, CHASSIS_INTERFACE, &child("vrm0"), uri)
            .await
            .unwrap();
        assert_eq!(filled, "/redfish/v1/Chassis/chassis/Assembly#/Assemblies/1");
    }

    #[tokio::test]
    async fn test_unimplemented_target_is_internal() {
        let (_, resolver) = resolver();
        let err = resolver
            .fill_assembly_id(SVC, CHASSIS, CHASSIS_INTERFACE, &child("ghost"), "/x/ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Internal(_)));
    }

    #[tokio::test]
    async fn test_wrong_interface_or_missing_name_is_internal() {
        let (bus, resolver) = resolver();
        let err = resolver
            .fill_assembly_id(SVC, CHASSIS, BOARD, &child("vrm0"), "/x/vrm0")
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Internal(_)));
        assert!(bus.journal().await.is_empty());

        let err = resolver
            .fill_assembly_id(SVC, CHASSIS, CHASSIS_INTERFACE, &child("vrm0"), "/x/other")
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Internal(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_internal_here() {
        let (bus, resolver) = resolver();
        bus.fail_on(BusOp::GetSubtree, None, BusError::NotFound(INVENTORY_ROOT.into()))
            .await;
        let err = resolver
            .fill_assembly_id(SVC, CHASSIS, CHASSIS_INTERFACE, &child("vrm0"), "/x/vrm0")
            .await
            .unwrap_err();
        assert!(matches!(err, AssemblyError::Internal(_)));
    }
}
