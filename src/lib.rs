//! Chassis Assembly Service
//!
//! Serves the Redfish `Assembly` collection of a chassis out of a live
//! inventory graph:
//! - Association-driven member discovery with a single deterministic ordering
//! - Concurrent attribute fan-out with an explicit completion barrier
//! - By-index writes, including the battery readiness hardware reconciler
//! - Token sessions and a thin axum HTTP surface

pub mod bus;
pub mod config;
pub mod error;
pub mod indicator;
pub mod inventory;
pub mod server;
pub mod session;
pub mod utils;

// Re-exports for convenience
pub use bus::{Directory, InMemoryBus, InventorySnapshot, PropertyBus, UnitManager};
pub use config::ServiceConfig;
pub use error::{AssemblyError, AssemblyResult};
pub use inventory::{AssemblyCollection, AssemblyService, Backend};
pub use session::SessionStore;
