use std::sync::Arc;
use std::time::Duration;

use csbench_core::api::{ApiError, CloudApi, CloudStackClient, JobPolling};
use csbench_core::ops::vm_action::{self, VmAction};
use csbench_core::ops::{BulkSettings, ResourceSelection, provision, teardown};
use csbench_core::report;
use csbench_core::{ApiEndpoint, Profile, Provisioning};
use csbench_testserver::{DEFAULT_API_KEY, DEFAULT_SECRET_KEY, TestServer};

const PARENT: &str = "root-domain";

fn client(server: &TestServer) -> Arc<CloudStackClient> {
    client_with(
        server,
        JobPolling {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        },
    )
}

fn client_with(server: &TestServer, polling: JobPolling) -> Arc<CloudStackClient> {
    let endpoint = ApiEndpoint::new(server.api_url(), Some(Duration::from_secs(5)));
    let profile = Profile::new("admin", DEFAULT_API_KEY, DEFAULT_SECRET_KEY);
    let provisioning = Provisioning {
        parent_domain_id: PARENT.to_string(),
        zone_id: "zone-1".to_string(),
        network_offering_id: "net-offering".to_string(),
        service_offering_id: "svc-offering".to_string(),
        disk_offering_id: "disk-offering".to_string(),
        template_id: "template".to_string(),
        ..Provisioning::default()
    };
    Arc::new(CloudStackClient::new(endpoint, profile, provisioning).with_job_polling(polling))
}

fn settings(workers: usize) -> BulkSettings {
    BulkSettings {
        parent_domain_id: PARENT.to_string(),
        page_size: 2,
        workers,
        num_domains: 3,
        networks_per_domain: 2,
        vms_per_network: 1,
        volumes_per_vm: 1,
    }
}

#[tokio::test]
async fn create_then_teardown_everything() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let api = client(&server);
    let settings = settings(4);

    let everything = ResourceSelection {
        domain: true,
        limits: true,
        network: true,
        vm: true,
        volume: true,
    };
    let created = provision::create(Arc::clone(&api), &settings, everything).await?;
    anyhow::ensure!(created.failed() == 0, "failures during create: {created:?}");
    anyhow::ensure!(created.get("domain").map(<[_]>::len) == Some(3));
    anyhow::ensure!(created.get("limits").map(<[_]>::len) == Some(3));
    anyhow::ensure!(created.get("network").map(<[_]>::len) == Some(6));
    anyhow::ensure!(created.get("vm").map(<[_]>::len) == Some(6));
    anyhow::ensure!(created.get("volume").map(<[_]>::len) == Some(6));

    {
        let cloud = server.cloud().lock();
        anyhow::ensure!(cloud.domains.len() == 3 && cloud.accounts.len() == 3);
        anyhow::ensure!(cloud.networks.len() == 6 && cloud.vms.len() == 6);
        anyhow::ensure!(cloud.volumes.iter().all(|v| v.vm_id.is_some()));
        // Domain and account limit for every resource type 0..=11.
        anyhow::ensure!(cloud.limit_updates == 3 * 2 * 12);
    }

    let removal = ResourceSelection {
        domain: true,
        network: true,
        vm: true,
        volume: true,
        ..ResourceSelection::default()
    };
    let removed = teardown::teardown(Arc::clone(&api), &settings, removal).await?;
    anyhow::ensure!(removed.failed() == 0, "failures during teardown: {removed:?}");
    anyhow::ensure!(removed.get("vm-destroy").map(<[_]>::len) == Some(6));
    anyhow::ensure!(removed.get("domain-delete").map(<[_]>::len) == Some(3));

    {
        let cloud = server.cloud().lock();
        anyhow::ensure!(cloud.domains.is_empty() && cloud.networks.is_empty());
        anyhow::ensure!(cloud.vms.is_empty() && cloud.volumes.is_empty());
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn toggle_flips_every_vm() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let api = client(&server);

    let (running, stopped) = {
        let mut cloud = server.cloud().lock();
        let domain = cloud.seed_domain(PARENT);
        let account = cloud.seed_account(&domain);
        let running: Vec<String> = (0..3)
            .map(|_| cloud.seed_vm(&domain, &account, "Running"))
            .collect();
        let stopped: Vec<String> = (0..2)
            .map(|_| cloud.seed_vm(&domain, &account, "Stopped"))
            .collect();
        (running, stopped)
    };

    let bucket = vm_action::run(Arc::clone(&api), &settings(2), VmAction::Toggle).await?;
    anyhow::ensure!(bucket.get("vmaction-stop").map(<[_]>::len) == Some(3));
    anyhow::ensure!(bucket.get("vmaction-start").map(<[_]>::len) == Some(2));
    anyhow::ensure!(bucket.failed() == 0);

    let cloud = server.cloud().lock();
    anyhow::ensure!(running.iter().all(|id| cloud.vm_state(id) == Some("Stopped")));
    anyhow::ensure!(stopped.iter().all(|id| cloud.vm_state(id) == Some("Running")));
    drop(cloud);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn reboot_of_stopped_vm_is_counted_as_failed_stop() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let api = client(&server);

    {
        let mut cloud = server.cloud().lock();
        let domain = cloud.seed_domain(PARENT);
        let account = cloud.seed_account(&domain);
        cloud.seed_vm(&domain, &account, "Running");
        cloud.seed_vm(&domain, &account, "Stopped");
    }

    let bucket = vm_action::run(Arc::clone(&api), &settings(2), VmAction::Reboot).await?;
    let reboot = bucket.get("vmaction-reboot").map(<[_]>::to_vec).unwrap_or_default();
    anyhow::ensure!(reboot.len() == 1 && reboot[0].success);
    let stop = bucket.get("vmaction-stop").map(<[_]>::to_vec).unwrap_or_default();
    anyhow::ensure!(stop.len() == 1 && !stop[0].success);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn failed_deploy_jobs_are_reported_without_stopping_the_rest() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let api = client(&server);
    server.cloud().lock().fail_next_jobs("deployVirtualMachine", 2);

    let what = ResourceSelection {
        domain: true,
        network: true,
        vm: true,
        ..ResourceSelection::default()
    };
    let created = provision::create(Arc::clone(&api), &settings(3), what).await?;

    let vms = created.get("vm").map(<[_]>::to_vec).unwrap_or_default();
    anyhow::ensure!(vms.len() == 6, "expected 6 vm results, got {}", vms.len());
    anyhow::ensure!(vms.iter().filter(|r| !r.success).count() == 2);
    anyhow::ensure!(created.failed() == 2, "unexpected failures: {created:?}");
    anyhow::ensure!(created.get("network").map(<[_]>::len) == Some(6));
    anyhow::ensure!(server.cloud().lock().vms.len() == 4);

    let rows = report::rows(&created);
    let count_of = |label: &str| rows.iter().find(|r| r.label == label).map(|r| r.count);
    anyhow::ensure!(count_of("vm - All") == Some(6));
    anyhow::ensure!(count_of("vm - Successful") == Some(4));
    anyhow::ensure!(count_of("vm - Failed") == Some(2));
    anyhow::ensure!(count_of("network - Failed").is_none());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn job_failure_carries_the_remote_error_text() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let api = client(&server);
    let vm = {
        let mut cloud = server.cloud().lock();
        cloud.fail_next_jobs("stopVirtualMachine", 1);
        cloud.seed_vm("dom", "acc", "Running")
    };

    match api.stop_vm(&vm).await {
        Err(ApiError::JobFailed { text, .. }) => {
            anyhow::ensure!(text.contains("stopVirtualMachine"), "unexpected text: {text}");
        }
        other => anyhow::bail!("expected a failed job, got {other:?}"),
    }
    anyhow::ensure!(server.cloud().lock().vm_state(&vm) == Some("Running"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn jobs_that_never_finish_time_out() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let polling = JobPolling {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(100),
    };
    let api = client_with(&server, polling);
    let stuck = {
        let mut cloud = server.cloud().lock();
        cloud.stall_jobs("startVirtualMachine");
        let domain = cloud.seed_domain(PARENT);
        let account = cloud.seed_account(&domain);
        cloud.seed_vm(&domain, &account, "Running");
        cloud.seed_vm(&domain, &account, "Stopped")
    };

    match api.start_vm(&stuck).await {
        Err(ApiError::JobTimeout { timeout, .. }) => {
            anyhow::ensure!(timeout == Duration::from_millis(100));
        }
        other => anyhow::bail!("expected a job timeout, got {other:?}"),
    }

    let bucket = vm_action::run(Arc::clone(&api), &settings(2), VmAction::Toggle).await?;
    let start = bucket.get("vmaction-start").map(<[_]>::to_vec).unwrap_or_default();
    anyhow::ensure!(start.len() == 1 && !start[0].success);
    let stop = bucket.get("vmaction-stop").map(<[_]>::to_vec).unwrap_or_default();
    anyhow::ensure!(stop.len() == 1 && stop[0].success);

    server.shutdown().await;
    Ok(())
}
