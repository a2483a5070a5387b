use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::network_plan;
use super::{
    Account, ApiError, ApiResult, CloudApi, Domain, LimitUpdate, Network, Reply, VirtualMachine,
    VmSpec, Volume, random_name,
};
use crate::config::Provisioning;
use crate::endpoint::ApiEndpoint;
use crate::pagination::Page;
use crate::profile::Profile;
use crate::signing::command_params;

const JOB_PENDING: i64 = 0;
const JOB_SUCCEEDED: i64 = 1;

/// How asynchronous jobs are awaited.
#[derive(Debug, Clone, Copy)]
pub struct JobPolling {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for JobPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

/// [`CloudApi`] over signed form posts, signed with one profile.
#[derive(Debug, Clone)]
pub struct CloudStackClient {
    endpoint: ApiEndpoint,
    profile: Profile,
    provisioning: Provisioning,
    polling: JobPolling,
}

type Params = Vec<(&'static str, String)>;

impl CloudStackClient {
    pub fn new(endpoint: ApiEndpoint, profile: Profile, provisioning: Provisioning) -> Self {
        Self {
            endpoint,
            profile,
            provisioning,
            polling: JobPolling::default(),
        }
    }

    #[must_use]
    pub fn with_job_polling(mut self, polling: JobPolling) -> Self {
        self.polling = polling;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    async fn execute(&self, command: &str, params: Params) -> ApiResult<Reply> {
        let signed = command_params(&self.profile, command, params, Utc::now());
        debug!(command, "calling api");
        self.endpoint.send(&signed).await
    }

    /// Runs an asynchronous command and returns its `jobresult`.
    async fn execute_job(&self, command: &str, params: Params) -> ApiResult<Value> {
        let accepted = self.execute(command, params).await?;
        let Some(job_id) = accepted.str_field("jobid").map(str::to_string) else {
            return Err(ApiError::Malformed(format!(
                "`{}` did not return a jobid",
                accepted.key()
            )));
        };
        self.wait_for_job(&job_id).await
    }

    async fn wait_for_job(&self, job_id: &str) -> ApiResult<Value> {
        let deadline = Instant::now() + self.polling.timeout;
        loop {
            let status = self
                .execute("queryAsyncJobResult", vec![("jobid", job_id.to_string())])
                .await?;
            let job_status = status
                .get("jobstatus")
                .and_then(Value::as_i64)
                .unwrap_or(JOB_PENDING);

            match job_status {
                JOB_PENDING => {}
                JOB_SUCCEEDED => {
                    return Ok(status.get("jobresult").cloned().unwrap_or(Value::Null));
                }
                _ => {
                    let text = status
                        .get("jobresult")
                        .and_then(|r| r.get("errortext"))
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string();
                    return Err(ApiError::JobFailed {
                        job_id: job_id.to_string(),
                        text,
                    });
                }
            }

            if Instant::now() + self.polling.interval > deadline {
                return Err(ApiError::JobTimeout {
                    job_id: job_id.to_string(),
                    timeout: self.polling.timeout,
                });
            }
            tokio::time::sleep(self.polling.interval).await;
        }
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        command: &str,
        field: &str,
        mut params: Params,
        page: u32,
        page_size: u32,
    ) -> ApiResult<Page<T>> {
        params.push(("page", page.to_string()));
        params.push(("pagesize", page_size.to_string()));
        self.execute(command, params).await?.page(field)
    }
}

impl CloudApi for CloudStackClient {
    async fn list_sub_domains(
        &self,
        parent_id: &str,
        page: u32,
        page_size: u32,
    ) -> ApiResult<Page<Domain>> {
        self.list(
            "listDomainChildren",
            "domain",
            vec![("id", parent_id.to_string())],
            page,
            page_size,
        )
        .await
    }

    async fn list_accounts(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> ApiResult<Page<Account>> {
        self.list(
            "listAccounts",
            "account",
            vec![("domainid", domain_id.to_string())],
            page,
            page_size,
        )
        .await
    }

    async fn list_networks(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> ApiResult<Page<Network>> {
        let mut params = vec![("domainid", domain_id.to_string())];
        if !self.provisioning.zone_id.is_empty() {
            params.push(("zoneid", self.provisioning.zone_id.clone()));
        }
        self.list("listNetworks", "network", params, page, page_size)
            .await
    }

    async fn list_vms(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> ApiResult<Page<VirtualMachine>> {
        self.list(
            "listVirtualMachines",
            "virtualmachine",
            vec![("domainid", domain_id.to_string())],
            page,
            page_size,
        )
        .await
    }

    async fn list_volumes(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> ApiResult<Page<Volume>> {
        self.list(
            "listVolumes",
            "volume",
            vec![("domainid", domain_id.to_string())],
            page,
            page_size,
        )
        .await
    }

    async fn create_domain(&self, parent_id: &str) -> ApiResult<Domain> {
        let mut params = vec![("name", random_name("Domain-"))];
        if !parent_id.is_empty() {
            params.push(("parentdomainid", parent_id.to_string()));
        }
        self.execute("createDomain", params).await?.take("domain")
    }

    async fn create_account(&self, domain_id: &str) -> ApiResult<Account> {
        let name = random_name("Account-");
        let params = vec![
            ("email", "test@test".to_string()),
            ("firstname", name.clone()),
            ("lastname", "Account".to_string()),
            ("password", "password".to_string()),
            ("username", name),
            ("domainid", domain_id.to_string()),
            ("accounttype", "2".to_string()),
        ];
        self.execute("createAccount", params).await?.take("account")
    }

    async fn update_resource_limit(&self, update: &LimitUpdate) -> ApiResult<()> {
        let mut params = vec![
            ("resourcetype", update.resource_type.to_string()),
            ("domainid", update.domain_id.clone()),
            ("max", update.max.to_string()),
        ];
        if let Some(account) = &update.account {
            params.push(("account", account.clone()));
        }
        self.execute("updateResourceLimit", params).await?;
        Ok(())
    }

    async fn create_network(&self, domain_id: &str, index: u32) -> ApiResult<Network> {
        let p = &self.provisioning;
        let plan = network_plan::plan(
            &mut rand::thread_rng(),
            p.subnet,
            p.submask,
            index,
            (p.vlan_start, p.vlan_end),
        )
        .ok_or(ApiError::AddressSpace { index })?;

        let name = random_name("Network-");
        let params = vec![
            ("name", name.clone()),
            ("displaytext", name),
            ("networkofferingid", p.network_offering_id.clone()),
            ("zoneid", p.zone_id.clone()),
            ("domainid", domain_id.to_string()),
            ("acltype", "Domain".to_string()),
            ("gateway", plan.gateway.to_string()),
            ("netmask", plan.netmask.to_string()),
            ("startip", plan.start_ip.to_string()),
            ("endip", plan.end_ip.to_string()),
            ("vlan", plan.vlan.to_string()),
            ("bypassvlanoverlapcheck", "true".to_string()),
        ];
        self.execute("createNetwork", params).await?.take("network")
    }

    async fn deploy_vm(&self, spec: &VmSpec) -> ApiResult<VirtualMachine> {
        let p = &self.provisioning;
        let name = random_name("Vm-");
        let params = vec![
            ("serviceofferingid", p.service_offering_id.clone()),
            ("templateid", p.template_id.clone()),
            ("zoneid", p.zone_id.clone()),
            ("name", name.clone()),
            ("displayname", name),
            ("domainid", spec.domain_id.clone()),
            ("networkids", spec.network_id.clone()),
            ("account", spec.account.clone()),
            ("startvm", p.start_vm.to_string()),
        ];
        let result = self.execute_job("deployVirtualMachine", params).await?;
        take_nested(&result, "virtualmachine")
    }

    async fn create_volume(&self, domain_id: &str, account: &str) -> ApiResult<Volume> {
        let params = vec![
            ("name", random_name("Volume-")),
            ("domainid", domain_id.to_string()),
            ("zoneid", self.provisioning.zone_id.clone()),
            ("diskofferingid", self.provisioning.disk_offering_id.clone()),
            ("account", account.to_string()),
        ];
        let result = self.execute_job("createVolume", params).await?;
        take_nested(&result, "volume")
    }

    async fn attach_volume(&self, volume_id: &str, vm_id: &str) -> ApiResult<()> {
        let params = vec![
            ("id", volume_id.to_string()),
            ("virtualmachineid", vm_id.to_string()),
        ];
        self.execute_job("attachVolume", params).await?;
        Ok(())
    }

    async fn start_vm(&self, vm_id: &str) -> ApiResult<()> {
        self.execute_job("startVirtualMachine", vec![("id", vm_id.to_string())])
            .await?;
        Ok(())
    }

    async fn stop_vm(&self, vm_id: &str) -> ApiResult<()> {
        self.execute_job("stopVirtualMachine", vec![("id", vm_id.to_string())])
            .await?;
        Ok(())
    }

    async fn reboot_vm(&self, vm_id: &str) -> ApiResult<()> {
        self.execute_job("rebootVirtualMachine", vec![("id", vm_id.to_string())])
            .await?;
        Ok(())
    }

    async fn destroy_vm(&self, vm_id: &str) -> ApiResult<()> {
        let params = vec![("id", vm_id.to_string()), ("expunge", "true".to_string())];
        self.execute_job("destroyVirtualMachine", params).await?;
        Ok(())
    }

    async fn destroy_volume(&self, volume_id: &str) -> ApiResult<()> {
        let params = vec![
            ("id", volume_id.to_string()),
            ("expunge", "true".to_string()),
        ];
        self.execute_job("destroyVolume", params).await?;
        Ok(())
    }

    async fn delete_network(&self, network_id: &str) -> ApiResult<bool> {
        let result = self
            .execute_job("deleteNetwork", vec![("id", network_id.to_string())])
            .await?;
        Ok(job_success(&result))
    }

    async fn delete_domain(&self, domain_id: &str) -> ApiResult<bool> {
        let result = self
            .execute_job("deleteDomain", vec![("id", domain_id.to_string())])
            .await?;
        Ok(job_success(&result))
    }
}

fn take_nested<T: serde::de::DeserializeOwned>(result: &Value, field: &str) -> ApiResult<T> {
    let Some(value) = result.get(field) else {
        return Err(ApiError::Malformed(format!("job result has no `{field}`")));
    };
    serde_json::from_value(value.clone())
        .map_err(|e| ApiError::Malformed(format!("job result `{field}`: {e}")))
}

fn job_success(result: &Value) -> bool {
    match result.get("success") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => {
            warn!("job result carries no success flag");
            false
        }
    }
}
