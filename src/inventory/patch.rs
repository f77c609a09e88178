//! Write path: request body parsing and per-index application.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{HardwareReconciler, OrderedMembers, READINESS_MEMBER};
use crate::bus::leaf_name;
use crate::error::{AssemblyError, AssemblyResult};
use crate::indicator::LocationIndicator;

const ASSEMBLIES: &str = "Assemblies";
const MEMBER_ID: &str = "MemberId";
const LOCATION_INDICATOR_ACTIVE: &str = "LocationIndicatorActive";
const OEM: &str = "Oem";
const OPEN_BMC: &str = "OpenBMC";
const READY_TO_REMOVE: &str = "ReadyToRemove";

/// Updates requested for one ordinal index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteEntry {
    pub location_indicator_active: Option<bool>,
    /// Validated only when its index is applied.
    pub oem: Option<Map<String, Value>>,
}

/// Sparse by-index update set parsed from a PATCH body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteIntent {
    pub entries: BTreeMap<usize, WriteEntry>,
}

impl WriteIntent {
    pub fn from_json(body: &Value) -> AssemblyResult<Self> {
        let Some(body) = body.as_object() else {
            return Err(AssemblyError::format_error(body, ASSEMBLIES));
        };
        if let Some(key) = body.keys().find(|k| k.as_str() != ASSEMBLIES) {
            return Err(AssemblyError::PropertyUnknown(key.clone()));
        }

        let mut intent = WriteIntent::default();
        let Some(assemblies) = body.get(ASSEMBLIES) else {
            return Ok(intent);
        };
        let items = assemblies
            .as_array()
            .ok_or_else(|| AssemblyError::format_error(assemblies, ASSEMBLIES))?;

        for item in items {
            let fields = item
                .as_object()
                .ok_or_else(|| AssemblyError::format_error(item, ASSEMBLIES))?;
            let (member_id, entry) = parse_item(fields)?;
            let Some(member_id) = member_id else {
                continue;
            };
            match canonical_index(&member_id) {
                Some(index) => intent.merge(index, entry),
                None => debug!("Ignoring non-ordinal MemberId {}", member_id),
            }
        }
        Ok(intent)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Later items win per field; fields an item leaves out keep earlier values.
    fn merge(&mut self, index: usize, entry: WriteEntry) {
        if entry == WriteEntry::default() {
            return;
        }
        let slot = self.entries.entry(index).or_default();
        if let Some(active) = entry.location_indicator_active {
            slot.location_indicator_active = Some(active);
        }
        if let Some(oem) = entry.oem {
            slot.oem = Some(oem);
        }
    }
}

fn parse_item(fields: &Map<String, Value>) -> AssemblyResult<(Option<String>, WriteEntry)> {
    let mut member_id = None;
    let mut entry = WriteEntry::default();
    for (key, value) in fields {
        match key.as_str() {
            MEMBER_ID => {
                let id = value.as_str().ok_or_else(|| AssemblyError::format_error(value, MEMBER_ID))?;
                member_id = Some(id.to_string());
            }
            LOCATION_INDICATOR_ACTIVE => {
                let active = value
                    .as_bool()
                    .ok_or_else(|| AssemblyError::format_error(value, LOCATION_INDICATOR_ACTIVE))?;
                entry.location_indicator_active = Some(active);
            }
            OEM => {
                let oem = value.as_object().ok_or_else(|| AssemblyError::format_error(value, OEM))?;
                entry.oem = Some(oem.clone());
            }
            other => return Err(AssemblyError::PropertyUnknown(other.to_string())),
        }
    }

    let has_update = entry.location_indicator_active.is_some() || entry.oem.is_some();
    if member_id.is_none() && has_update {
        return Err(AssemblyError::PropertyMissing(MEMBER_ID.to_string()));
    }
    Ok((member_id, entry))
}

/// Only the exact decimal rendering of an index addresses it ("01" does not).
fn canonical_index(member_id: &str) -> Option<usize> {
    let index: usize = member_id.parse().ok()?;
    (index.to_string() == member_id).then_some(index)
}

/// Extracts `OpenBMC.ReadyToRemove` from an `Oem` payload.
pub fn readiness_flag(oem: &Map<String, Value>) -> AssemblyResult<bool> {
    if let Some(key) = oem.keys().find(|k| k.as_str() != OPEN_BMC) {
        return Err(AssemblyError::PropertyUnknown(key.clone()));
    }
    let open_bmc = oem
        .get(OPEN_BMC)
        .ok_or_else(|| AssemblyError::PropertyMissing(OPEN_BMC.to_string()))?;
    let open_bmc = open_bmc
        .as_object()
        .ok_or_else(|| AssemblyError::format_error(open_bmc, OPEN_BMC))?;

    if let Some(key) = open_bmc.keys().find(|k| k.as_str() != READY_TO_REMOVE) {
        return Err(AssemblyError::PropertyUnknown(key.clone()));
    }
    let ready = open_bmc
        .get(READY_TO_REMOVE)
        .ok_or_else(|| AssemblyError::PropertyMissing(READY_TO_REMOVE.to_string()))?;
    ready
        .as_bool()
        .ok_or_else(|| AssemblyError::format_error(ready, READY_TO_REMOVE))
}

pub struct PatchApplier {
    indicator: Arc<dyn LocationIndicator>,
    reconciler: Arc<HardwareReconciler>,
}

impl PatchApplier {
    pub fn new(indicator: Arc<dyn LocationIndicator>, reconciler: Arc<HardwareReconciler>) -> Self {
        Self { indicator, reconciler }
    }

    /// Apply `intent` against a freshly built member list. Indices are
    /// visited in ascending order and the first error stops the write.
    pub async fn apply(&self, intent: &WriteIntent, members: &OrderedMembers) -> AssemblyResult<()> {
        for (&index, entry) in &intent.entries {
            let Some(path) = members.get(index) else {
                debug!("No assembly at index {}, ignored", index);
                continue;
            };

            if let Some(active) = entry.location_indicator_active {
                debug!("Set LocationIndicatorActive={} on {}", active, path);
                self.indicator.set_active(path, active).await?;
            }

            if let Some(oem) = &entry.oem {
                let ready = readiness_flag(oem)?;
                if leaf_name(path) != READINESS_MEMBER {
                    return Err(AssemblyError::PropertyUnknown(READY_TO_REMOVE.to_string()));
                }
                self.reconciler.reconcile(path, ready).await?;
            }
        }
        Ok(())
    }
}
