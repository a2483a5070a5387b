//! Bulk lifecycle operations driven through the bounded scheduler.

pub mod discover;
pub mod provision;
pub mod teardown;
pub mod vm_action;

use std::fmt::Display;

use tracing::warn;

use crate::config::Config;

pub use vm_action::VmAction;

/// Scope and sizing shared by the bulk paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkSettings {
    pub parent_domain_id: String,
    pub page_size: u32,
    pub workers: usize,
    pub num_domains: usize,
    pub networks_per_domain: usize,
    pub vms_per_network: usize,
    pub volumes_per_vm: usize,
}

impl BulkSettings {
    pub fn from_config(config: &Config, workers: usize) -> Self {
        let p = &config.provisioning;
        Self {
            parent_domain_id: p.parent_domain_id.clone(),
            page_size: config.listing_page_size(),
            workers,
            num_domains: p.num_domains,
            networks_per_domain: p.num_networks,
            vms_per_network: p.num_vms,
            volumes_per_vm: p.num_volumes,
        }
    }
}

/// Which resource kinds a create or teardown touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceSelection {
    pub domain: bool,
    pub limits: bool,
    pub network: bool,
    pub vm: bool,
    pub volume: bool,
}

impl ResourceSelection {
    pub fn is_empty(&self) -> bool {
        !(self.domain || self.limits || self.network || self.vm || self.volume)
    }
}

/// Logs a failed call and turns the outcome into a success flag.
pub(crate) fn succeeded<T, E: Display>(what: &str, id: &str, result: Result<T, E>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => {
            warn!(id, error = %err, "failed to {what}");
            false
        }
    }
}
