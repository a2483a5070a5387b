use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use super::{BulkSettings, ResourceSelection, discover, succeeded};
use crate::Result;
use crate::api::CloudApi;
use crate::bucket::ResultBucket;
use crate::pool::{ProgressMarker, TaskPool};

/// Deletes the selected resources under the parent domain: VMs, volumes, networks, then
/// domains, so dependents are gone before what they live in.
pub async fn teardown<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
    what: ResourceSelection,
) -> Result<ResultBucket> {
    let mut bucket = ResultBucket::new();
    if what.vm {
        bucket.merge(destroy_vms(Arc::clone(&api), settings).await?);
    }
    if what.volume {
        bucket.merge(delete_volumes(Arc::clone(&api), settings).await?);
    }
    if what.network {
        bucket.merge(delete_networks(Arc::clone(&api), settings).await?);
    }
    if what.domain {
        bucket.merge(delete_domains(api, settings).await?);
    }
    Ok(bucket)
}

pub async fn destroy_vms<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    let domains = discover::sub_domains(api.as_ref(), settings).await;
    let vms = discover::vms(api.as_ref(), &domains, settings.page_size).await;

    info!("destroying {} VMs", vms.len());
    let started = Instant::now();
    let progress = ProgressMarker::new("VMs", vms.len());
    let mut pool = TaskPool::new(settings.workers)?;

    let total = vms.len();
    for (i, vm) in vms.into_iter().enumerate() {
        progress.submitted(i + 1);
        let api = Arc::clone(&api);
        pool.submit("vm-destroy", async move {
            succeeded("destroy vm", &vm.id, api.destroy_vm(&vm.id).await)
        })
        .await?;
    }

    let bucket = pool.wait().await;
    info!("destroyed {total} VMs in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}

pub async fn delete_volumes<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    let domains = discover::sub_domains(api.as_ref(), settings).await;
    let volumes = discover::volumes(api.as_ref(), &domains, settings.page_size).await;

    info!("deleting {} volumes", volumes.len());
    let started = Instant::now();
    let progress = ProgressMarker::new("volumes", volumes.len());
    let mut pool = TaskPool::new(settings.workers)?;

    let total = volumes.len();
    for (i, volume) in volumes.into_iter().enumerate() {
        progress.submitted(i + 1);
        let api = Arc::clone(&api);
        pool.submit("volume-delete", async move {
            succeeded(
                "delete volume",
                &volume.id,
                api.destroy_volume(&volume.id).await,
            )
        })
        .await?;
    }

    let bucket = pool.wait().await;
    info!("deleted {total} volumes in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}

pub async fn delete_networks<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    let domains = discover::sub_domains(api.as_ref(), settings).await;
    let networks = discover::networks(api.as_ref(), &domains, settings.page_size).await;

    info!("deleting {} networks", networks.len());
    let started = Instant::now();
    let progress = ProgressMarker::new("networks", networks.len());
    let mut pool = TaskPool::new(settings.workers)?;

    let total = networks.len();
    for (i, network) in networks.into_iter().enumerate() {
        progress.submitted(i + 1);
        let api = Arc::clone(&api);
        pool.submit("network-delete", async move {
            confirmed("delete network", &network.id, api.delete_network(&network.id).await)
        })
        .await?;
    }

    let bucket = pool.wait().await;
    info!("deleted {total} networks in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}

pub async fn delete_domains<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
) -> Result<ResultBucket> {
    let domains = discover::sub_domains(api.as_ref(), settings).await;

    info!("deleting {} domains", domains.len());
    let started = Instant::now();
    let progress = ProgressMarker::new("domains", domains.len());
    let mut pool = TaskPool::new(settings.workers)?;

    let total = domains.len();
    for (i, domain) in domains.into_iter().enumerate() {
        progress.submitted(i + 1);
        let api = Arc::clone(&api);
        pool.submit("domain-delete", async move {
            confirmed("delete domain", &domain.id, api.delete_domain(&domain.id).await)
        })
        .await?;
    }

    let bucket = pool.wait().await;
    info!("deleted {total} domains in {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(bucket)
}

/// A delete only counts when the server confirmed it.
fn confirmed<E: std::fmt::Display>(
    what: &str,
    id: &str,
    result: std::result::Result<bool, E>,
) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            warn!(id, "server did not confirm {what}");
            false
        }
        Err(err) => succeeded::<(), E>(what, id, Err(err)),
    }
}
