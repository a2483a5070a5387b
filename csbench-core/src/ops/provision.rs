use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use super::{BulkSettings, ResourceSelection, discover, succeeded};
use crate::Result;
use crate::api::{Account, CloudApi, LimitUpdate, VmSpec, VmState};
use crate::bucket::ResultBucket;
use crate::pool::{ProgressMarker, TaskPool};

/// Highest resource-limit type; every type from 0 up to this one is lifted.
pub const MAX_RESOURCE_TYPE: u8 = 11;
pub const UNLIMITED: i64 = -1;

/// Creates the selected resources in dependency order: domains, limits, networks, VMs,
/// volumes. Each step lists what the previous ones created.
pub async fn create<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
    what: ResourceSelection,
) -> Result<ResultBucket> {
    let mut bucket = ResultBucket::new();
    if what.domain {
        bucket.merge(create_domains(Arc::clone(&api), settings).await?);
    }
    if what.limits {
        bucket.merge(update_limits(Arc::clone(&api), settings).await?);
    }
    if what.network {
        bucket.merge(create_networks(Arc::clone(&api), settings).await?);
    }
    if what.vm {
        bucket.merge(create_vms(Arc::clone(&api), settings).await?);
    }
    if what.volume {
        bucket.merge(create_volumes(api, settings).await?);
    }
    Ok(bucket)
}

/// One sub-domain plus one domain-admin account per task.
pub async fn create_domains<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    let count = settings.num_domains;
    info!("creating {count} domains");
    let started = Instant::now();
    let progress = ProgressMarker::new("domains", count);
    let mut pool = TaskPool::new(settings.workers)?;

    for i in 0..count {
        progress.submitted(i + 1);
        let api = Arc::clone(&api);
        let parent = settings.parent_domain_id.clone();
        pool.submit("domain", async move {
            let domain = match api.create_domain(&parent).await {
                Ok(d) => d,
                Err(err) => {
                    warn!(parent = %parent, error = %err, "failed to create domain");
                    return false;
                }
            };
            let account = api.create_account(&domain.id).await;
            succeeded("create account", &domain.id, account)
        })
        .await?;
    }

    let bucket = pool.wait().await;
    info!("created {count} domains in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}

/// Lifts every resource limit on each sub-domain and its accounts.
pub async fn update_limits<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    info!(parent = %settings.parent_domain_id, "fetching sub-domains");
    let domains = discover::sub_domains(api.as_ref(), settings).await;
    let accounts = discover::accounts(api.as_ref(), &domains, settings.page_size).await;

    info!("updating limits for {} accounts", accounts.len());
    let started = Instant::now();
    let progress = ProgressMarker::new("accounts", accounts.len());
    let mut pool = TaskPool::new(settings.workers)?;

    let total = accounts.len();
    for (i, account) in accounts.into_iter().enumerate() {
        progress.submitted(i + 1);
        let api = Arc::clone(&api);
        pool.submit("limits", async move { lift_limits(api.as_ref(), &account).await })
            .await?;
    }

    let bucket = pool.wait().await;
    info!(
        "updated limits for {total} accounts in {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(bucket)
}

async fn lift_limits<C: CloudApi>(api: &C, account: &Account) -> bool {
    for resource_type in 0..=MAX_RESOURCE_TYPE {
        let mut update = LimitUpdate {
            resource_type,
            domain_id: account.domain_id.clone(),
            account: None,
            max: UNLIMITED,
        };
        if !succeeded(
            "update domain resource limit",
            &account.domain_id,
            api.update_resource_limit(&update).await,
        ) {
            return false;
        }

        update.account = Some(account.name.clone());
        if !succeeded(
            "update account resource limit",
            &account.id,
            api.update_resource_limit(&update).await,
        ) {
            return false;
        }
    }
    true
}

/// `networks_per_domain` shared networks in every sub-domain, each on its own address block.
pub async fn create_networks<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    info!(parent = %settings.parent_domain_id, "fetching sub-domains");
    let domains = discover::sub_domains(api.as_ref(), settings).await;

    let per_domain = settings.networks_per_domain;
    let total = domains.len() * per_domain;
    info!("creating {total} networks");
    let started = Instant::now();
    let progress = ProgressMarker::new("networks", total);
    let mut pool = TaskPool::new(settings.workers)?;

    let mut submitted = 0usize;
    for (i, domain) in domains.iter().enumerate() {
        for j in 0..per_domain {
            submitted += 1;
            progress.submitted(submitted);

            let index = u32::try_from(i * per_domain + j).unwrap_or(u32::MAX);
            let api = Arc::clone(&api);
            let domain_id = domain.id.clone();
            pool.submit("network", async move {
                let created = api.create_network(&domain_id, index).await;
                succeeded("create network", &domain_id, created)
            })
            .await?;
        }
    }

    let bucket = pool.wait().await;
    info!("created {total} networks in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}

/// `vms_per_network` VMs in every network, owned by the domain's account.
pub async fn create_vms<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    info!(parent = %settings.parent_domain_id, "fetching sub-domains and accounts");
    let domains = discover::sub_domains(api.as_ref(), settings).await;
    let accounts = discover::accounts(api.as_ref(), &domains, settings.page_size).await;
    let account_by_domain: HashMap<String, String> = accounts
        .into_iter()
        .map(|a| (a.domain_id, a.name))
        .collect();

    info!(parent = %settings.parent_domain_id, "fetching networks of sub-domains");
    let networks = discover::networks(api.as_ref(), &domains, settings.page_size).await;

    let per_network = settings.vms_per_network;
    let total = networks.len() * per_network;
    info!("creating {total} VMs");
    let started = Instant::now();
    let progress = ProgressMarker::new("VMs", total);
    let mut pool = TaskPool::new(settings.workers)?;

    let mut submitted = 0usize;
    for network in &networks {
        let account = account_by_domain.get(&network.domain_id).cloned();
        for _ in 0..per_network {
            submitted += 1;
            progress.submitted(submitted);

            let api = Arc::clone(&api);
            let network = network.clone();
            let account = account.clone();
            pool.submit("vm", async move {
                let Some(account) = account else {
                    warn!(
                        network = %network.id,
                        domain = %network.domain_id,
                        "no account in the network's domain"
                    );
                    return false;
                };
                let spec = VmSpec {
                    domain_id: network.domain_id.clone(),
                    network_id: network.id.clone(),
                    account,
                };
                succeeded("deploy vm", &network.id, api.deploy_vm(&spec).await)
            })
            .await?;
        }
    }

    let bucket = pool.wait().await;
    info!("created {total} VMs in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}

/// `volumes_per_vm` data volumes created and attached to every running or stopped VM.
pub async fn create_volumes<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    info!(parent = %settings.parent_domain_id, "fetching all VMs in sub-domains");
    let domains = discover::sub_domains(api.as_ref(), settings).await;
    let vms = discover::vms(api.as_ref(), &domains, settings.page_size).await;

    let (suitable, unsuitable): (Vec<_>, Vec<_>) = vms
        .into_iter()
        .partition(|vm| matches!(vm.state, VmState::Running | VmState::Stopped));
    if !unsuitable.is_empty() {
        warn!("found {} VMs in unsuitable state", unsuitable.len());
    }

    let per_vm = settings.volumes_per_vm;
    let total = suitable.len() * per_vm;
    info!("creating {total} volumes");
    let started = Instant::now();
    let progress = ProgressMarker::new("volumes", total);
    let mut pool = TaskPool::new(settings.workers)?;

    let mut submitted = 0usize;
    for vm in &suitable {
        for _ in 0..per_vm {
            submitted += 1;
            progress.submitted(submitted);

            let api = Arc::clone(&api);
            let vm = vm.clone();
            pool.submit("volume", async move {
                let volume = match api.create_volume(&vm.domain_id, &vm.account).await {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(vm = %vm.id, error = %err, "failed to create volume");
                        return false;
                    }
                };
                let attached = api.attach_volume(&volume.id, &vm.id).await;
                succeeded("attach volume", &volume.id, attached)
            })
            .await?;
        }
    }

    let bucket = pool.wait().await;
    info!("created {total} volumes in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}
