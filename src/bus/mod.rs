//! Inventory Bus Surface
//!
//! The inventory graph lives in a separate backend process. Everything the
//! assembly pipeline knows about it arrives through the traits below; the
//! transport behind them (connection handling, marshalling) is not part of
//! this crate. `memory` provides a complete in-process backend used by the
//! shipped binary and by the tests.

pub mod memory;
mod path;

pub use memory::{BusCall, BusOp, InMemoryBus, InventorySnapshot};
pub use path::{child_path, leaf_name};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// `service -> [interfaces]` for a single object.
pub type ServiceMap = BTreeMap<String, Vec<String>>;

/// `path -> service -> [interfaces]` for a subtree query.
pub type SubtreeMap = BTreeMap<String, ServiceMap>;

/// `property name -> value` for one interface of one object.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Error returned by a bus call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The directory has no such object / association ("resource not found").
    #[error("not found: {0}")]
    NotFound(String),
    /// I/O error reported by the backend.
    #[error("i/o error: {0}")]
    Io(String),
    /// Any other failure, carrying the backend error code.
    #[error("bus call failed ({code}): {message}")]
    Failed { code: i32, message: String },
}

impl BusError {
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self::Failed { code, message: message.into() }
    }

    /// Whether the error is the directory's "nothing here" answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BusError::NotFound(_))
    }
}

pub type BusResult<T> = std::result::Result<T, BusError>;

/// A property value as carried on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    StringList(Vec<String>),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Double(_) => "double",
            PropertyValue::String(_) => "string",
            PropertyValue::StringList(_) => "string list",
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

/// A kind-labelled edge declared by a backend object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationEdge {
    pub kind: String,
    pub source: String,
    pub target: String,
}

impl AssociationEdge {
    pub fn new(kind: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Object directory: who hosts what, and how objects relate.
#[async_trait]
pub trait Directory: Send + Sync {
    /// All object paths implementing any of `interfaces`.
    async fn resolve_objects_by_interface(&self, interfaces: &[&str]) -> BusResult<Vec<String>>;

    /// Services hosting `path`. With a non-empty filter only services that
    /// expose at least one of the filter interfaces are returned, each with
    /// its full interface list.
    async fn get_hosting_services(&self, path: &str, interfaces: &[&str]) -> BusResult<ServiceMap>;

    /// Every object below `root` hosted by a service exposing one of
    /// `interfaces`. A depth of 0 means unlimited.
    async fn get_subtree(&self, root: &str, interfaces: &[&str], depth: u32) -> BusResult<SubtreeMap>;

    /// Endpoints of the association object `association_path`
    /// (`<source>/<kind>`).
    async fn get_association_endpoints(&self, association_path: &str) -> BusResult<Vec<String>>;

    /// Edges declared by `path`, read from the definitions interface of `service`.
    async fn get_association_definitions(&self, service: &str, path: &str) -> BusResult<Vec<AssociationEdge>>;
}

/// Property access on a hosted object.
#[async_trait]
pub trait PropertyBus: Send + Sync {
    async fn get_property(&self, service: &str, path: &str, interface: &str, name: &str) -> BusResult<PropertyValue>;

    async fn get_all_properties(&self, service: &str, path: &str, interface: &str) -> BusResult<PropertyMap>;

    async fn set_property(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> BusResult<()>;
}

/// Process-lifecycle control for backend units.
#[async_trait]
pub trait UnitManager: Send + Sync {
    async fn start_unit(&self, unit: &str) -> BusResult<()>;
    async fn stop_unit(&self, unit: &str) -> BusResult<()>;
}
