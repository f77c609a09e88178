//! Read projection of the assembly collection, shaped after the Redfish
//! `Assembly` schema. Every attribute is optional; an absent attribute means
//! the member does not implement it.

use serde::Serialize;

use crate::bus::leaf_name;

const COLLECTION_TYPE: &str = "#Assembly.v1_3_0.Assembly";
const MEMBER_TYPE: &str = "#Assembly.v1_3_0.AssemblyData";
const OEM_TYPE: &str = "#OemAssembly.v1_0_0.OpenBMC";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceState {
    Enabled,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Health {
    #[serde(rename = "OK")]
    Ok,
    Critical,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
}

impl Status {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.health.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartLocation {
    pub service_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    pub part_location: PartLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenBmcOem {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    #[serde(rename = "ReadyToRemove")]
    pub ready_to_remove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyOem {
    #[serde(rename = "OpenBMC")]
    pub open_bmc: OpenBmcOem,
}

/// Asset decorator values; each key may be missing on a given member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetInfo {
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub spare_part_number: Option<String>,
    pub model: Option<String>,
}

/// Result of one attribute fetch, applied to the member it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Asset(AssetInfo),
    LocationCode(String),
    Health { functional: bool },
    Presence { present: bool },
    IndicatorActive(bool),
    ReadyToRemove(bool),
}

/// One entry of the collection. `Status.State` starts out `Enabled` and is
/// only lowered by an explicit presence reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssemblyProjection {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
    pub member_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spare_part_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Status::is_empty")]
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_indicator_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oem: Option<AssemblyOem>,
    #[serde(skip)]
    pub index: usize,
    #[serde(skip)]
    pub path: String,
}

impl AssemblyProjection {
    pub fn new(chassis_id: &str, index: usize, path: &str) -> Self {
        Self {
            odata_type: MEMBER_TYPE,
            odata_id: format!("/redfish/v1/Chassis/{}/Assembly#/Assemblies/{}", chassis_id, index),
            member_id: index.to_string(),
            name: leaf_name(path).to_string(),
            part_number: None,
            serial_number: None,
            spare_part_number: None,
            model: None,
            location: None,
            status: Status {
                state: Some(ResourceState::Enabled),
                health: None,
            },
            location_indicator_active: None,
            oem: None,
            index,
            path: path.to_string(),
        }
    }

    /// Last writer wins when two fetches touch the same field.
    pub fn apply(&mut self, update: FieldUpdate) {
        match update {
            FieldUpdate::Asset(asset) => {
                if asset.part_number.is_some() {
                    self.part_number = asset.part_number;
                }
                if asset.serial_number.is_some() {
                    self.serial_number = asset.serial_number;
                }
                if asset.spare_part_number.is_some() {
                    self.spare_part_number = asset.spare_part_number;
                }
                if asset.model.is_some() {
                    self.model = asset.model;
                }
            }
            FieldUpdate::LocationCode(code) => {
                self.location = Some(Location {
                    part_location: PartLocation { service_label: code },
                });
            }
            FieldUpdate::Health { functional } => {
                self.status.health = Some(if functional { Health::Ok } else { Health::Critical });
            }
            FieldUpdate::Presence { present } => {
                self.status.state = Some(if present {
                    ResourceState::Enabled
                } else {
                    ResourceState::Absent
                });
            }
            FieldUpdate::IndicatorActive(active) => self.location_indicator_active = Some(active),
            FieldUpdate::ReadyToRemove(ready) => {
                self.oem = Some(AssemblyOem {
                    open_bmc: OpenBmcOem {
                        odata_type: OEM_TYPE,
                        ready_to_remove: ready,
                    },
                });
            }
        }
    }
}

/// The collection resource returned by the read path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyCollection {
    #[serde(rename = "@odata.type")]
    pub odata_type: &'static str,
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
    #[serde(rename = "Name")]
    pub name: &'static str,
    #[serde(rename = "Id")]
    pub id: &'static str,
    #[serde(rename = "Assemblies")]
    pub assemblies: Vec<AssemblyProjection>,
    #[serde(rename = "Assemblies@odata.count")]
    pub count: usize,
}

impl AssemblyCollection {
    pub fn new(chassis_id: &str, assemblies: Vec<AssemblyProjection>) -> Self {
        Self {
            odata_type: COLLECTION_TYPE,
            odata_id: format!("/redfish/v1/Chassis/{}/Assembly", chassis_id),
            name: "Assembly Collection",
            id: "Assembly",
            count: assemblies.len(),
            assemblies,
        }
    }
}
