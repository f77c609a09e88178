//! Service configuration, read from the environment (and `.env`).

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8002";
pub const DEFAULT_LOG_FILTER: &str = "chassis_assembly=info,tower_http=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    /// Inventory snapshot served by the in-memory backend.
    pub inventory_file: PathBuf,
    pub session_file: Option<PathBuf>,
    pub session_timeout: Duration,
    pub admin_user: String,
    /// Logins are refused while this is unset.
    pub admin_password: Option<String>,
    pub log_filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8002)),
            inventory_file: PathBuf::from("inventory.json"),
            session_file: None,
            session_timeout: Duration::from_secs(3600),
            admin_user: "root".to_string(),
            admin_password: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = var("ASSEMBLY_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("Invalid ASSEMBLY_BIND_ADDR '{}'", addr))?;
        }
        if let Some(file) = var("ASSEMBLY_INVENTORY_FILE") {
            config.inventory_file = PathBuf::from(file);
        }
        config.session_file = var("ASSEMBLY_SESSION_FILE").map(PathBuf::from);
        if let Some(secs) = var("ASSEMBLY_SESSION_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("Invalid ASSEMBLY_SESSION_TIMEOUT_SECS '{}'", secs))?;
            config.session_timeout = Duration::from_secs(secs);
        }
        if let Some(user) = var("ASSEMBLY_ADMIN_USER") {
            config.admin_user = user;
        }
        config.admin_password = var("ASSEMBLY_ADMIN_PASSWORD");
        if let Some(filter) = var("ASSEMBLY_LOG") {
            config.log_filter = filter;
        }
        Ok(config)
    }
}
