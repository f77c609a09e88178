//! Chassis Assembly Inventory
//!
//! Projects the assembly members of an enclosure out of the live inventory
//! graph and maps client writes back onto the same members:
//!
//! - `chassis`: enclosure id → backend path
//! - `association`: declared "assembly" members of the enclosure
//! - `filter`: members that are actually implemented
//! - `indexer`: the one ordering rule behind every ordinal index
//! - `aggregator`: concurrent attribute fan-out into the read projection
//! - `patch` / `reconciler`: the write path and its hardware side effect
//! - `assembly_id`: ordinal id lookup for URIs built elsewhere

mod aggregator;
mod assembly_id;
mod association;
mod chassis;
mod filter;
mod indexer;
mod patch;
mod projection;
mod reconciler;
mod service;

pub use aggregator::PropertyAggregator;
pub use assembly_id::{substitute_id, AssemblyIdResolver};
pub use association::{assembly_targets, AssociationDiscoverer};
pub use chassis::{ChassisResolver, Enclosure};
pub use filter::{intersect, ImplementationFilter};
pub use indexer::OrderedMembers;
pub use patch::{readiness_flag, PatchApplier, WriteEntry, WriteIntent};
pub use projection::{
    AssemblyCollection, AssemblyOem, AssemblyProjection, AssetInfo, FieldUpdate, Health, Location, OpenBmcOem,
    PartLocation, ResourceState, Status,
};
pub use reconciler::{HardwareReconciler, ReconcileState, Reconciliation};
pub use service::{AssemblyService, Backend};

pub const INVENTORY_ROOT: &str = "/xyz/openbmc_project/inventory";

pub const CHASSIS_INTERFACE: &str = "xyz.openbmc_project.Inventory.Item.Chassis";
pub const ASSOCIATION_DEFINITIONS_INTERFACE: &str = "xyz.openbmc_project.Association.Definitions";

/// Relation label linking an enclosure to its assembly members.
pub const ASSEMBLY_RELATION: &str = "assembly";

/// Inventory item interfaces that make a member "implemented".
pub const ASSEMBLY_INTERFACES: [&str; 9] = [
    "xyz.openbmc_project.Inventory.Item.Vrm",
    "xyz.openbmc_project.Inventory.Item.Tpm",
    "xyz.openbmc_project.Inventory.Item.Panel",
    "xyz.openbmc_project.Inventory.Item.Battery",
    "xyz.openbmc_project.Inventory.Item.DiskBackplane",
    "xyz.openbmc_project.Inventory.Item.Board",
    "xyz.openbmc_project.Inventory.Item.Connector",
    "xyz.openbmc_project.Inventory.Item.Drive",
    "xyz.openbmc_project.Inventory.Item.Board.Motherboard",
];

// Decorators
pub const ASSET_INTERFACE: &str = "xyz.openbmc_project.Inventory.Decorator.Asset";
pub const LOCATION_CODE_INTERFACE: &str = "xyz.openbmc_project.Inventory.Decorator.LocationCode";
pub const OPERATIONAL_STATUS_INTERFACE: &str = "xyz.openbmc_project.State.Decorator.OperationalStatus";
pub const ITEM_INTERFACE: &str = "xyz.openbmc_project.Inventory.Item";

/// Display name of the one member that supports the readiness flag.
pub const READINESS_MEMBER: &str = "tod_battery";
/// Voltage sensor that exists only while the monitoring unit runs.
pub const READINESS_SENSOR_PATH: &str = "/xyz/openbmc_project/sensors/voltage/Battery_Voltage";
pub const MONITOR_UNIT: &str = "xyz.openbmc_project.adcsensor.service";
