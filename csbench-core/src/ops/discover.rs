use super::BulkSettings;
use crate::api::{Account, CloudApi, Domain, Network, VirtualMachine, Volume};
use crate::pagination::walk;

// Listings run one domain at a time; a failed walk keeps its partial items and the walker
// has already logged the warning.

/// Direct children of the configured parent domain.
pub async fn sub_domains<C: CloudApi>(api: &C, settings: &BulkSettings) -> Vec<Domain> {
    let parent_id = settings.parent_domain_id.as_str();
    walk("sub-domains", settings.page_size, |page, size| {
        api.list_sub_domains(parent_id, page, size)
    })
    .await
    .items
}

pub async fn accounts<C: CloudApi>(api: &C, domains: &[Domain], page_size: u32) -> Vec<Account> {
    let mut out = Vec::new();
    for d in domains {
        let found = walk("accounts", page_size, |page, size| {
            api.list_accounts(&d.id, page, size)
        })
        .await;
        out.extend(found.items);
    }
    out
}

pub async fn networks<C: CloudApi>(api: &C, domains: &[Domain], page_size: u32) -> Vec<Network> {
    let mut out = Vec::new();
    for d in domains {
        let found = walk("networks", page_size, |page, size| {
            api.list_networks(&d.id, page, size)
        })
        .await;
        out.extend(found.items);
    }
    out
}

pub async fn vms<C: CloudApi>(api: &C, domains: &[Domain], page_size: u32) -> Vec<VirtualMachine> {
    let mut out = Vec::new();
    for d in domains {
        let found = walk("virtual machines", page_size, |page, size| {
            api.list_vms(&d.id, page, size)
        })
        .await;
        out.extend(found.items);
    }
    out
}

pub async fn volumes<C: CloudApi>(api: &C, domains: &[Domain], page_size: u32) -> Vec<Volume> {
    let mut out = Vec::new();
    for d in domains {
        let found = walk("volumes", page_size, |page, size| {
            api.list_volumes(&d.id, page, size)
        })
        .await;
        out.extend(found.items);
    }
    out
}
