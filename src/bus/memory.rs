//! In-Memory Inventory Backend
//!
//! Serves the whole bus surface from an [`InventorySnapshot`]. The graph can
//! be mutated while in use, calls can be made to fail on demand, and every
//! call is journaled so callers can assert on ordering.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::path::{is_below, leaf_name};
use super::{
    AssociationEdge, BusError, BusResult, Directory, PropertyBus, PropertyMap, PropertyValue, ServiceMap,
    SubtreeMap, UnitManager,
};
use crate::inventory::ASSOCIATION_DEFINITIONS_INTERFACE;

/// Error code for a call addressed to an object, service or interface that does not exist.
pub const UNKNOWN_OBJECT: i32 = 2;
/// Error code for a missing or mistyped property.
pub const INVALID_ARGUMENT: i32 = 22;

/// `path -> service -> interface -> properties`
pub type ObjectTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, PropertyMap>>>;

/// A serializable picture of the inventory graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub objects: ObjectTree,
    #[serde(default)]
    pub associations: Vec<AssociationEdge>,
}

impl InventorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load a snapshot from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read inventory snapshot {}", path.display()))?;
        Self::from_json(&json).context("Failed to deserialize inventory snapshot")
    }

    /// Declare that `service` hosts `interface` on `path`.
    pub fn with_interface(mut self, path: &str, service: &str, interface: &str) -> Self {
        self.interface_mut(path, service, interface);
        self
    }

    /// Declare a property (and, implicitly, its interface).
    pub fn with_property(
        mut self,
        path: &str,
        service: &str,
        interface: &str,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.interface_mut(path, service, interface)
            .insert(name.to_string(), value.into());
        self
    }

    pub fn with_association(mut self, source: &str, kind: &str, target: &str) -> Self {
        self.associations.push(AssociationEdge::new(kind, source, target));
        self
    }

    fn interface_mut(&mut self, path: &str, service: &str, interface: &str) -> &mut PropertyMap {
        self.objects
            .entry(path.to_string())
            .or_default()
            .entry(service.to_string())
            .or_default()
            .entry(interface.to_string())
            .or_default()
    }

    fn lookup(&self, service: &str, path: &str, interface: &str) -> BusResult<&PropertyMap> {
        self.objects
            .get(path)
            .and_then(|services| services.get(service))
            .and_then(|interfaces| interfaces.get(interface))
            .ok_or_else(|| {
                BusError::failed(
                    UNKNOWN_OBJECT,
                    format!("{} does not host {} on {}", service, interface, path),
                )
            })
    }

    /// Services on `path` matching the filter, each with its full interface list.
    fn services_of(&self, path: &str, filter: &[&str]) -> ServiceMap {
        let mut out = ServiceMap::new();
        if let Some(services) = self.objects.get(path) {
            for (service, interfaces) in services {
                let names: Vec<String> = interfaces.keys().cloned().collect();
                if filter.is_empty() || names.iter().any(|n| filter.contains(&n.as_str())) {
                    out.insert(service.clone(), names);
                }
            }
        }
        out
    }
}

/// Bus operations, as recorded in the journal and targeted by faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusOp {
    ResolveObjects,
    GetHostingServices,
    GetSubtree,
    GetAssociationEndpoints,
    GetAssociationDefinitions,
    GetProperty,
    GetAllProperties,
    SetProperty,
    StartUnit,
    StopUnit,
}

/// One journaled call. `path` is the object path, subtree root or unit name;
/// `member` names the interface (and property) where one applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCall {
    pub op: BusOp,
    pub path: String,
    pub member: Option<String>,
}

#[derive(Debug, Clone)]
struct Fault {
    op: BusOp,
    path: Option<String>,
    error: BusError,
}

/// Bus backend over a mutable in-memory snapshot.
pub struct InMemoryBus {
    state: RwLock<InventorySnapshot>,
    faults: Mutex<Vec<Fault>>,
    journal: Mutex<Vec<BusCall>>,
    active_units: Mutex<BTreeSet<String>>,
}

impl InMemoryBus {
    pub fn new(snapshot: InventorySnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            faults: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            active_units: Mutex::new(BTreeSet::new()),
        }
    }

    /// Make every `op` call on `path` (or on any path when `None`) fail with `error`.
    pub async fn fail_on(&self, op: BusOp, path: Option<&str>, error: BusError) {
        self.faults.lock().await.push(Fault {
            op,
            path: path.map(str::to_string),
            error,
        });
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    pub async fn journal(&self) -> Vec<BusCall> {
        self.journal.lock().await.clone()
    }

    pub async fn clear_journal(&self) {
        self.journal.lock().await.clear();
    }

    /// Journaled calls of one kind.
    pub async fn calls(&self, op: BusOp) -> Vec<BusCall> {
        self.journal
            .lock()
            .await
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub async fn is_unit_active(&self, unit: &str) -> bool {
        self.active_units.lock().await.contains(unit)
    }

    pub async fn snapshot(&self) -> InventorySnapshot {
        self.state.read().await.clone()
    }

    pub async fn property(&self, service: &str, path: &str, interface: &str, name: &str) -> Option<PropertyValue> {
        let state = self.state.read().await;
        state.lookup(service, path, interface).ok()?.get(name).cloned()
    }

    pub async fn insert_interface(&self, path: &str, service: &str, interface: &str) {
        self.state.write().await.interface_mut(path, service, interface);
    }

    /// Remove an object and every edge pointing at or out of it.
    pub async fn remove_object(&self, path: &str) {
        let mut state = self.state.write().await;
        state.objects.remove(path);
        state.associations.retain(|e| e.source != path && e.target != path);
    }

    pub async fn add_association(&self, source: &str, kind: &str, target: &str) {
        self.state
            .write()
            .await
            .associations
            .push(AssociationEdge::new(kind, source, target));
    }

    pub async fn remove_association(&self, source: &str, kind: &str, target: &str) {
        self.state
            .write()
            .await
            .associations
            .retain(|e| !(e.source == source && e.kind == kind && e.target == target));
    }

    async fn enter(&self, op: BusOp, path: &str, member: Option<String>) -> BusResult<()> {
        debug!(?op, path, ?member, "bus call");
        self.journal.lock().await.push(BusCall {
            op,
            path: path.to_string(),
            member,
        });
        let faults = self.faults.lock().await;
        match faults
            .iter()
            .find(|f| f.op == op && f.path.as_deref().map_or(true, |p| p == path))
        {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Directory for InMemoryBus {
    async fn resolve_objects_by_interface(&self, interfaces: &[&str]) -> BusResult<Vec<String>> {
        self.enter(BusOp::ResolveObjects, "/", Some(interfaces.join(","))).await?;
        let state = self.state.read().await;
        Ok(state
            .objects
            .keys()
            .filter(|path| !state.services_of(path, interfaces).is_empty())
            .cloned()
            .collect())
    }

    async fn get_hosting_services(&self, path: &str, interfaces: &[&str]) -> BusResult<ServiceMap> {
        self.enter(BusOp::GetHostingServices, path, None).await?;
        let state = self.state.read().await;
        let services = state.services_of(path, interfaces);
        if services.is_empty() {
            return Err(BusError::NotFound(path.to_string()));
        }
        Ok(services)
    }

    async fn get_subtree(&self, root: &str, interfaces: &[&str], depth: u32) -> BusResult<SubtreeMap> {
        self.enter(BusOp::GetSubtree, root, Some(interfaces.join(","))).await?;
        let state = self.state.read().await;
        let mut out = SubtreeMap::new();
        for path in state.objects.keys().filter(|p| is_below(root, p, depth)) {
            let services = state.services_of(path, interfaces);
            if !services.is_empty() {
                out.insert(path.clone(), services);
            }
        }
        Ok(out)
    }

    async fn get_association_endpoints(&self, association_path: &str) -> BusResult<Vec<String>> {
        self.enter(BusOp::GetAssociationEndpoints, association_path, None).await?;
        let kind = leaf_name(association_path);
        let source = association_path
            .strip_suffix(kind)
            .map(|s| s.trim_end_matches('/'))
            .unwrap_or_default();
        let state = self.state.read().await;
        let endpoints: Vec<String> = state
            .associations
            .iter()
            .filter(|e| e.source == source && e.kind == kind)
            .map(|e| e.target.clone())
            .collect();
        if endpoints.is_empty() {
            return Err(BusError::NotFound(association_path.to_string()));
        }
        Ok(endpoints)
    }

    async fn get_association_definitions(&self, service: &str, path: &str) -> BusResult<Vec<AssociationEdge>> {
        self.enter(BusOp::GetAssociationDefinitions, path, Some(service.to_string()))
            .await?;
        let state = self.state.read().await;
        state.lookup(service, path, ASSOCIATION_DEFINITIONS_INTERFACE)?;
        Ok(state
            .associations
            .iter()
            .filter(|e| e.source == path)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PropertyBus for InMemoryBus {
    async fn get_property(&self, service: &str, path: &str, interface: &str, name: &str) -> BusResult<PropertyValue> {
        self.enter(BusOp::GetProperty, path, Some(format!("{}.{}", interface, name)))
            .await?;
        let state = self.state.read().await;
        state
            .lookup(service, path, interface)?
            .get(name)
            .cloned()
            .ok_or_else(|| BusError::failed(INVALID_ARGUMENT, format!("no property {}.{} on {}", interface, name, path)))
    }

    async fn get_all_properties(&self, service: &str, path: &str, interface: &str) -> BusResult<PropertyMap> {
        self.enter(BusOp::GetAllProperties, path, Some(interface.to_string()))
            .await?;
        let state = self.state.read().await;
        state.lookup(service, path, interface).cloned()
    }

    async fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> BusResult<()> {
        self.enter(BusOp::SetProperty, path, Some(format!("{}.{}", interface, name)))
            .await?;
        let mut state = self.state.write().await;
        state.lookup(service, path, interface)?;
        let properties = state.interface_mut(path, service, interface);
        if let Some(current) = properties.get(name) {
            if std::mem::discriminant(current) != std::mem::discriminant(&value) {
                return Err(BusError::failed(
                    INVALID_ARGUMENT,
                    format!("{}.{} expects {}, got {}", interface, name, current.type_name(), value.type_name()),
                ));
            }
        }
        properties.insert(name.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl UnitManager for InMemoryBus {
    async fn start_unit(&self, unit: &str) -> BusResult<()> {
        self.enter(BusOp::StartUnit, unit, None).await?;
        self.active_units.lock().await.insert(unit.to_string());
        Ok(())
    }

    async fn stop_unit(&self, unit: &str) -> BusResult<()> {
        self.enter(BusOp::StopUnit, unit, None).await?;
        self.active_units.lock().await.remove(unit);
        Ok(())
    }
}
