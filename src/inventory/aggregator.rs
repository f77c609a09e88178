//! Attribute fan-out for the read path.
//!
//! Every bus call needed to populate the projection runs concurrently in one
//! `FuturesUnordered` set owned by `aggregate`. Fetches never touch the
//! projection themselves: each one resolves to a [`Fetched`] message and the
//! owner loop applies it. Hosting-service discovery for a member resolves to
//! more fetches, which join the same set. The set running dry is the
//! completion barrier; the first failure drops whatever is still in flight
//! and the partial projection with it.

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error};

use super::projection::{AssemblyProjection, AssetInfo, FieldUpdate};
use super::{
    OrderedMembers, ASSEMBLY_INTERFACES, ASSET_INTERFACE, ITEM_INTERFACE, LOCATION_CODE_INTERFACE,
    OPERATIONAL_STATUS_INTERFACE, READINESS_MEMBER, READINESS_SENSOR_PATH,
};
use crate::bus::{leaf_name, BusError, Directory, PropertyBus, PropertyMap, PropertyValue, ServiceMap};
use crate::error::{AssemblyError, AssemblyResult};
use crate::indicator::LocationIndicator;

enum Fetched {
    Services { index: usize, path: String, services: ServiceMap },
    Field { index: usize, update: Option<FieldUpdate> },
}

type Fetch = BoxFuture<'static, AssemblyResult<Fetched>>;

pub struct PropertyAggregator {
    directory: Arc<dyn Directory>,
    properties: Arc<dyn PropertyBus>,
    indicator: Arc<dyn LocationIndicator>,
}

impl PropertyAggregator {
    pub fn new(
        directory: Arc<dyn Directory>,
        properties: Arc<dyn PropertyBus>,
        indicator: Arc<dyn LocationIndicator>,
    ) -> Self {
        Self {
            directory,
            properties,
            indicator,
        }
    }

    /// Build one fully populated projection per member, in member order.
    pub async fn aggregate(&self, chassis_id: &str, members: &OrderedMembers) -> AssemblyResult<Vec<AssemblyProjection>> {
        debug!("Get properties for {} assemblies of {}", members.len(), chassis_id);

        let mut projections: Vec<AssemblyProjection> = members
            .iter()
            .map(|(index, path)| AssemblyProjection::new(chassis_id, index, path))
            .collect();

        let mut pending: FuturesUnordered<Fetch> = FuturesUnordered::new();
        for (index, path) in members.iter() {
            pending.push(self.discover(index, path));
            pending.push(self.indicator_state(index, path));
            if leaf_name(path) == READINESS_MEMBER {
                pending.push(self.readiness(index));
            }
        }

        let mut completed = 0usize;
        while let Some(fetched) = pending.next().await {
            completed += 1;
            match fetched? {
                Fetched::Services { index, path, services } => {
                    for fetch in self.decorator_fetches(index, &path, &services) {
                        pending.push(fetch);
                    }
                }
                Fetched::Field {
                    index,
                    update: Some(update),
                } => projections[index].apply(update),
                Fetched::Field { update: None, .. } => {}
            }
        }

        debug!("{} attribute fetches completed for {}", completed, chassis_id);
        Ok(projections)
    }

    fn discover(&self, index: usize, path: &str) -> Fetch {
        let directory = self.directory.clone();
        let path = path.to_string();
        async move {
            let services = directory
                .get_hosting_services(&path, &ASSEMBLY_INTERFACES)
                .await
                .map_err(|e| bus_failure(&path, "hosting services", e))?;
            Ok(Fetched::Services { index, path, services })
        }
        .boxed()
    }

    fn decorator_fetches(&self, index: usize, path: &str, services: &ServiceMap) -> Vec<Fetch> {
        let mut fetches = Vec::new();
        for (service, interfaces) in services {
            for interface in interfaces {
                let bus = self.properties.clone();
                let service = service.clone();
                let path = path.to_string();
                let fetch = match interface.as_str() {
                    ASSET_INTERFACE => async move { fetch_asset(bus, service, path).await }.boxed(),
                    LOCATION_CODE_INTERFACE => async move {
                        let value = read_string(bus, &service, &path, LOCATION_CODE_INTERFACE, "LocationCode").await?;
                        Ok(FieldUpdate::LocationCode(value))
                    }
                    .boxed(),
                    OPERATIONAL_STATUS_INTERFACE => async move {
                        let functional = read_bool(bus, &service, &path, OPERATIONAL_STATUS_INTERFACE, "Functional").await?;
                        Ok(FieldUpdate::Health { functional })
                    }
                    .boxed(),
                    ITEM_INTERFACE => async move {
                        let present = read_bool(bus, &service, &path, ITEM_INTERFACE, "Present").await?;
                        Ok(FieldUpdate::Presence { present })
                    }
                    .boxed(),
                    _ => continue,
                };
                fetches.push(
                    fetch
                        .map(move |update: AssemblyResult<FieldUpdate>| {
                            update.map(|u| Fetched::Field {
                                index,
                                update: Some(u),
                            })
                        })
                        .boxed(),
                );
            }
        }
        fetches
    }

    fn indicator_state(&self, index: usize, path: &str) -> Fetch {
        let indicator = self.indicator.clone();
        let path = path.to_string();
        async move {
            let active = indicator.get_active(&path).await?;
            Ok(Fetched::Field {
                index,
                update: active.map(FieldUpdate::IndicatorActive),
            })
        }
        .boxed()
    }

    /// The readiness sensor only exists while the monitoring unit runs.
    fn readiness(&self, index: usize) -> Fetch {
        let directory = self.directory.clone();
        async move {
            let ready = match directory.get_hosting_services(READINESS_SENSOR_PATH, &[]).await {
                Ok(_) => false,
                Err(BusError::NotFound(_)) | Err(BusError::Io(_)) => true,
                Err(e) => return Err(bus_failure(READINESS_SENSOR_PATH, "sensor lookup", e)),
            };
            Ok(Fetched::Field {
                index,
                update: Some(FieldUpdate::ReadyToRemove(ready)),
            })
        }
        .boxed()
    }
}

fn bus_failure(path: &str, what: &str, e: BusError) -> AssemblyError {
    error!("Bus error during {} for {}: {}", what, path, e);
    e.into()
}

async fn fetch_asset(bus: Arc<dyn PropertyBus>, service: String, path: String) -> AssemblyResult<FieldUpdate> {
    let properties = bus
        .get_all_properties(&service, &path, ASSET_INTERFACE)
        .await
        .map_err(|e| bus_failure(&path, "asset read", e))?;
    Ok(FieldUpdate::Asset(AssetInfo {
        part_number: optional_string(&properties, &path, "PartNumber")?,
        serial_number: optional_string(&properties, &path, "SerialNumber")?,
        spare_part_number: optional_string(&properties, &path, "SparePartNumber")?,
        model: optional_string(&properties, &path, "Model")?,
    }))
}

fn optional_string(properties: &PropertyMap, path: &str, name: &str) -> AssemblyResult<Option<String>> {
    match properties.get(name) {
        None => Ok(None),
        Some(value) => match value.as_str() {
            Some(s) => Ok(Some(s.to_string())),
            None => Err(AssemblyError::internal(format!(
                "{} on {} is a {}",
                name,
                path,
                value.type_name()
            ))),
        },
    }
}

async fn read_bool(
    bus: Arc<dyn PropertyBus>,
    service: &str,
    path: &str,
    interface: &str,
    name: &str,
) -> AssemblyResult<bool> {
    let value = bus
        .get_property(service, path, interface, name)
        .await
        .map_err(|e| bus_failure(path, name, e))?;
    value
        .as_bool()
        .ok_or_else(|| AssemblyError::internal(format!("{} on {} is a {}", name, path, value.type_name())))
}

async fn read_string(
    bus: Arc<dyn PropertyBus>,
    service: &str,
    path: &str,
    interface: &str,
    name: &str,
) -> AssemblyResult<String> {
    let value = bus
        .get_property(service, path, interface, name)
        .await
        .map_err(|e| bus_failure(path, name, e))?;
    match value {
        PropertyValue::String(s) => Ok(s),
        other => Err(AssemblyError::internal(format!(
            "{} on {} is a {}",
            name,
            path,
            other.type_name()
        ))),
    }
}
