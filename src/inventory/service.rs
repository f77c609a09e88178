use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    AssemblyCollection, AssemblyIdResolver, AssociationDiscoverer, ChassisResolver, HardwareReconciler,
    ImplementationFilter, OrderedMembers, PatchApplier, PropertyAggregator, WriteIntent,
};
use crate::bus::{Directory, PropertyBus, UnitManager};
use crate::error::AssemblyResult;
use crate::indicator::{LedGroupIndicator, LocationIndicator};

/// The collaborators the assembly pipeline talks to.
#[derive(Clone)]
pub struct Backend {
    pub directory: Arc<dyn Directory>,
    pub properties: Arc<dyn PropertyBus>,
    pub units: Arc<dyn UnitManager>,
    pub indicator: Arc<dyn LocationIndicator>,
}

impl Backend {
    pub fn new(
        directory: Arc<dyn Directory>,
        properties: Arc<dyn PropertyBus>,
        units: Arc<dyn UnitManager>,
        indicator: Arc<dyn LocationIndicator>,
    ) -> Self {
        Self {
            directory,
            properties,
            units,
            indicator,
        }
    }

    /// Everything served by one bus connection, with the LED-group indicator.
    pub fn from_bus<B>(bus: Arc<B>) -> Self
    where
        B: Directory + PropertyBus + UnitManager + 'static,
    {
        let indicator = Arc::new(LedGroupIndicator::new(bus.clone(), bus.clone()));
        Self::new(bus.clone(), bus.clone(), bus, indicator)
    }
}

/// Read and write entry points of the chassis assembly collection.
///
/// No state survives between calls: every request walks the live graph
/// again, so ordinal ids always reflect the graph at the time of the call.
pub struct AssemblyService {
    chassis: ChassisResolver,
    discoverer: AssociationDiscoverer,
    filter: ImplementationFilter,
    aggregator: PropertyAggregator,
    applier: PatchApplier,
    ids: AssemblyIdResolver,
}

impl AssemblyService {
    pub fn new(backend: Backend) -> Self {
        let reconciler = Arc::new(HardwareReconciler::new(
            backend.directory.clone(),
            backend.properties.clone(),
            backend.units.clone(),
        ));
        Self {
            chassis: ChassisResolver::new(backend.directory.clone()),
            discoverer: AssociationDiscoverer::new(backend.directory.clone()),
            filter: ImplementationFilter::new(backend.directory.clone()),
            aggregator: PropertyAggregator::new(
                backend.directory.clone(),
                backend.properties.clone(),
                backend.indicator.clone(),
            ),
            applier: PatchApplier::new(backend.indicator, reconciler),
            ids: AssemblyIdResolver::new(backend.directory),
        }
    }

    /// Implemented assembly members of the enclosure at `enclosure_path`, in id order.
    pub async fn ordered_members(&self, enclosure_path: &str) -> AssemblyResult<OrderedMembers> {
        let candidates = self.discoverer.candidates(enclosure_path).await?;
        let implemented = self.filter.implemented(&candidates).await?;
        Ok(OrderedMembers::new(implemented))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_assemblies(&self, chassis_id: &str) -> AssemblyResult<AssemblyCollection> {
        let enclosure = self.chassis.resolve(chassis_id).await?;
        let members = self.ordered_members(&enclosure.path).await?;
        let assemblies = self.aggregator.aggregate(&enclosure.id, &members).await?;
        debug!("Chassis {} has {} assemblies", chassis_id, assemblies.len());
        Ok(AssemblyCollection::new(&enclosure.id, assemblies))
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn patch_assemblies(&self, chassis_id: &str, body: &Value) -> AssemblyResult<()> {
        let enclosure = self.chassis.resolve(chassis_id).await?;
        let intent = WriteIntent::from_json(body)?;
        if intent.is_empty() {
            debug!("Nothing to apply on chassis {}", chassis_id);
            return Ok(());
        }
        let members = self.ordered_members(&enclosure.path).await?;
        self.applier.apply(&intent, &members).await?;
        info!("Applied {} assembly updates on chassis {}", intent.entries.len(), chassis_id);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn fill_assembly_id(
        &self,
        parent_service: &str,
        parent_path: &str,
        parent_interface: &str,
        child_path: &str,
        uri: &str,
    ) -> AssemblyResult<String> {
        self.ids
            .fill_assembly_id(parent_service, parent_path, parent_interface, child_path, uri)
            .await
    }
}
