//! Chassis Assembly Service
//!
//! Loads an inventory snapshot into the in-memory bus backend and serves the
//! Redfish assembly collection over HTTP.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use chassis_assembly::server::{self, AppState, Credentials};
use chassis_assembly::utils::init_telemetry;
use chassis_assembly::{AssemblyService, Backend, InMemoryBus, InventorySnapshot, ServiceConfig, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = ServiceConfig::from_env().context("Failed to read configuration")?;
    init_telemetry(&config.log_filter)?;

    println!("\n{}", "═".repeat(60));
    println!("Chassis Assembly Service v{}", env!("CARGO_PKG_VERSION"));
    println!("{}\n", "═".repeat(60));

    let snapshot = InventorySnapshot::load(&config.inventory_file).await?;
    info!(
        "Inventory snapshot {} loaded: {} objects, {} associations",
        config.inventory_file.display(),
        snapshot.objects.len(),
        snapshot.associations.len()
    );
    let bus = Arc::new(InMemoryBus::new(snapshot));
    let service = Arc::new(AssemblyService::new(Backend::from_bus(bus)));

    let mut store = SessionStore::new(config.session_timeout);
    if let Some(path) = &config.session_file {
        let restored = store.load(path).await?;
        info!("Restored {} sessions from {}", restored, path.display());
        store = store.with_persistence(path);
    }
    let sessions = Arc::new(store);
    let sweeper = sessions.clone().spawn_sweeper();

    if config.admin_password.is_none() {
        warn!("ASSEMBLY_ADMIN_PASSWORD is not set; logins will be refused");
    }
    let state = AppState {
        service,
        sessions: sessions.clone(),
        credentials: Arc::new(Credentials {
            username: config.admin_user.clone(),
            password: config.admin_password.clone(),
        }),
    };

    let served = server::run_server(state, config.bind_addr).await;

    sweeper.abort();
    sessions.persist().await?;
    info!("Assembly service stopped");
    served
}
