//! Location Indicator Access
//!
//! The identify LED of an inventory object is shared by several resources,
//! so it sits behind its own trait. `LedGroupIndicator` follows the backend
//! convention: `<object>/identifying` points at an LED group whose `Asserted`
//! property is the indicator state.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use crate::bus::{child_path, BusError, Directory, PropertyBus};
use crate::error::{AssemblyError, AssemblyResult};

pub const LED_GROUP_INTERFACE: &str = "xyz.openbmc_project.Led.Group";
pub const IDENTIFYING_RELATION: &str = "identifying";

#[async_trait]
pub trait LocationIndicator: Send + Sync {
    /// `None` when the object has no indicator.
    async fn get_active(&self, path: &str) -> AssemblyResult<Option<bool>>;

    async fn set_active(&self, path: &str, active: bool) -> AssemblyResult<()>;
}

pub struct LedGroupIndicator {
    directory: Arc<dyn Directory>,
    properties: Arc<dyn PropertyBus>,
}

impl LedGroupIndicator {
    pub fn new(directory: Arc<dyn Directory>, properties: Arc<dyn PropertyBus>) -> Self {
        Self { directory, properties }
    }

    /// The LED group of `path` and the service hosting it, if there is one.
    async fn led_group(&self, path: &str) -> AssemblyResult<Option<(String, String)>> {
        let endpoints = match self
            .directory
            .get_association_endpoints(&child_path(path, IDENTIFYING_RELATION))
            .await
        {
            Ok(endpoints) => endpoints,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => {
                error!("Failed to get identifying LED of {}: {}", path, e);
                return Err(e.into());
            }
        };
        let Some(group) = endpoints.into_iter().next() else {
            return Ok(None);
        };

        let services = self
            .directory
            .get_hosting_services(&group, &[LED_GROUP_INTERFACE])
            .await
            .map_err(|e| {
                error!("Failed to find service hosting LED group {}: {}", group, e);
                AssemblyError::from(e)
            })?;
        match services.into_keys().next() {
            Some(service) => Ok(Some((service, group))),
            None => Err(BusError::NotFound(group).into()),
        }
    }
}

#[async_trait]
impl LocationIndicator for LedGroupIndicator {
    async fn get_active(&self, path: &str) -> AssemblyResult<Option<bool>> {
        let Some((service, group)) = self.led_group(path).await? else {
            debug!("{} has no identifying LED", path);
            return Ok(None);
        };
        let value = self
            .properties
            .get_property(&service, &group, LED_GROUP_INTERFACE, "Asserted")
            .await
            .map_err(|e| {
                error!("Failed to read Asserted on {}: {}", group, e);
                AssemblyError::from(e)
            })?;
        value
            .as_bool()
            .map(Some)
            .ok_or_else(|| AssemblyError::internal(format!("Asserted on {} is a {}", group, value.type_name())))
    }

    async fn set_active(&self, path: &str, active: bool) -> AssemblyResult<()> {
        let Some((service, group)) = self.led_group(path).await? else {
            return Err(AssemblyError::PropertyUnknown("LocationIndicatorActive".to_string()));
        };
        self.properties
            .set_property(&service, &group, LED_GROUP_INTERFACE, "Asserted", active.into())
            .await
            .map_err(|e| {
                error!("Failed to set Asserted on {}: {}", group, e);
                AssemblyError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusOp, InMemoryBus, InventorySnapshot};

    const LED_SVC: &str = "xyz.openbmc_project.LED.GroupManager";
    const GROUP: &str = "/xyz/openbmc_project/led/groups/panel_identify";

    fn indicator() -> (Arc<InMemoryBus>, LedGroupIndicator) {
        let bus = Arc::new(InMemoryBus::new(
            InventorySnapshot::new()
                .with_property(GROUP, LED_SVC, LED_GROUP_INTERFACE, "Asserted", false)
                .with_association("/inv/panel", IDENTIFYING_RELATION, GROUP),
        ));
        (bus.clone(), LedGroupIndicator::new(bus.clone(), bus))
    }

    #[tokio::test]
    async fn test_read_and_write_through_led_group() {
        let (bus, indicator) = indicator();
        assert_eq!(indicator.get_active("/inv/panel").await.unwrap(), Some(false));

        indicator.set_active("/inv/panel", true).await.unwrap();
        assert_eq!(indicator.get_active("/inv/panel").await.unwrap(), Some(true));
        assert_eq!(bus.calls(BusOp::SetProperty).await[0].path, GROUP);
    }

    #[tokio::test]
    async fn test_object_without_led() {
        let (_, indicator) = indicator();
        assert_eq!(indicator.get_active("/inv/other").await.unwrap(), None);
        let err = indicator.set_active("/inv/other", true).await.unwrap_err();
        assert_eq!(err, AssemblyError::PropertyUnknown("LocationIndicatorActive".into()));
    }

    #[tokio::test]
    async fn test_read_failure_is_internal() {
        let (bus, indicator) = indicator();
        bus.fail_on(BusOp::GetProperty, Some(GROUP), BusError::failed(5, "boom")).await;
        let err = indicator.get_active("/inv/panel").await.unwrap_err();
        assert!(matches!(err, AssemblyError::Internal(_)));
    }
}
