use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Value, json};

pub const JOB_PENDING: i64 = 0;
pub const JOB_SUCCEEDED: i64 = 1;
pub const JOB_FAILED: i64 = 2;

/// Error returned inside the `<command>response` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFault {
    pub status: u16,
    pub text: String,
}

impl ApiFault {
    fn param(text: impl Into<String>) -> Self {
        Self {
            status: 431,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRec {
    pub id: String,
    pub name: String,
    pub parent_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRec {
    pub id: String,
    pub name: String,
    pub domain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRec {
    pub id: String,
    pub name: String,
    pub domain_id: String,
    pub gateway: String,
    pub netmask: String,
    pub vlan: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRec {
    pub id: String,
    pub name: String,
    pub state: String,
    pub domain_id: String,
    pub account: String,
    pub network_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRec {
    pub id: String,
    pub name: String,
    pub domain_id: String,
    pub account: String,
    pub vm_id: Option<String>,
}

#[derive(Debug, Clone)]
struct Job {
    status: i64,
    result: Value,
}

/// In-memory model of the resources the bulk operations touch.
///
/// Asynchronous commands complete immediately; their outcome is kept until queried.
/// [`Cloud::fail_next_jobs`] and [`Cloud::stall_jobs`] override that outcome per command
/// without touching the modelled resources.
#[derive(Debug, Default)]
pub struct Cloud {
    next_id: u64,
    pub domains: Vec<DomainRec>,
    pub accounts: Vec<AccountRec>,
    pub networks: Vec<NetworkRec>,
    pub vms: Vec<VmRec>,
    pub volumes: Vec<VolumeRec>,
    pub limit_updates: u64,
    jobs: HashMap<String, Job>,
    job_failures: HashMap<String, u64>,
    stalled_commands: HashSet<String>,
}

type Params = BTreeMap<String, String>;

const ASYNC_COMMANDS: &[&str] = &[
    "deployVirtualMachine",
    "createVolume",
    "attachVolume",
    "startVirtualMachine",
    "stopVirtualMachine",
    "rebootVirtualMachine",
    "destroyVirtualMachine",
    "destroyVolume",
    "deleteNetwork",
    "deleteDomain",
];

impl Cloud {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:06}", self.next_id)
    }

    pub fn seed_domain(&mut self, parent_id: &str) -> String {
        let id = self.next_id("dom");
        self.domains.push(DomainRec {
            id: id.clone(),
            name: format!("Domain-{id}"),
            parent_id: parent_id.to_string(),
        });
        id
    }

    pub fn seed_account(&mut self, domain_id: &str) -> String {
        let id = self.next_id("acc");
        let name = format!("Account-{id}");
        self.accounts.push(AccountRec {
            id,
            name: name.clone(),
            domain_id: domain_id.to_string(),
        });
        name
    }

    pub fn seed_vm(&mut self, domain_id: &str, account: &str, state: &str) -> String {
        let id = self.next_id("vm");
        self.vms.push(VmRec {
            id: id.clone(),
            name: format!("Vm-{id}"),
            state: state.to_string(),
            domain_id: domain_id.to_string(),
            account: account.to_string(),
            network_id: String::new(),
        });
        id
    }

    pub fn vm_state(&self, id: &str) -> Option<&str> {
        self.vms.iter().find(|v| v.id == id).map(|v| v.state.as_str())
    }

    /// The next `count` jobs of `command` end with [`JOB_FAILED`].
    pub fn fail_next_jobs(&mut self, command: &str, count: u64) {
        *self.job_failures.entry(command.to_string()).or_default() += count;
    }

    /// Jobs of `command` stay at [`JOB_PENDING`] forever.
    pub fn stall_jobs(&mut self, command: &str) {
        self.stalled_commands.insert(command.to_string());
    }

    /// Returns `None` for commands the model does not know.
    pub fn handle(&mut self, command: &str, p: &Params) -> Option<Result<Value, ApiFault>> {
        if ASYNC_COMMANDS.contains(&command) {
            if self.stalled_commands.contains(command) {
                return Some(Ok(self.pending_job()));
            }
            if let Some(left) = self.job_failures.get_mut(command).filter(|n| **n > 0) {
                *left -= 1;
                return Some(Ok(self.job(Err(format!("scheduled failure for {command}")))));
            }
        }

        let out = match command {
            "listDomainChildren" => Ok(self.list_domains(p)),
            "listAccounts" => Ok(self.list_accounts(p)),
            "listNetworks" => Ok(self.list_networks(p)),
            "listVirtualMachines" => Ok(self.list_vms(p)),
            "listVolumes" => Ok(self.list_volumes(p)),
            "createDomain" => self.create_domain(p),
            "createAccount" => self.create_account(p),
            "updateResourceLimit" => self.update_resource_limit(p),
            "createNetwork" => self.create_network(p),
            "deployVirtualMachine" => self.deploy_vm(p),
            "createVolume" => self.create_volume(p),
            "attachVolume" => self.attach_volume(p),
            "startVirtualMachine" => self.transition_vm(p, "Stopped", "Running"),
            "stopVirtualMachine" => self.transition_vm(p, "Running", "Stopped"),
            "rebootVirtualMachine" => self.transition_vm(p, "Running", "Running"),
            "destroyVirtualMachine" => self.destroy_vm(p),
            "destroyVolume" => self.destroy_volume(p),
            "deleteNetwork" => self.delete_network(p),
            "deleteDomain" => self.delete_domain(p),
            "queryAsyncJobResult" => self.query_job(p),
            _ => return None,
        };
        Some(out)
    }

    fn list_domains(&self, p: &Params) -> Value {
        let parent = param(p, "id");
        let items: Vec<Value> = self
            .domains
            .iter()
            .filter(|d| d.parent_id == parent)
            .map(domain_json)
            .collect();
        paged(p, "domain", items)
    }

    fn list_accounts(&self, p: &Params) -> Value {
        let domain = param(p, "domainid");
        let items: Vec<Value> = self
            .accounts
            .iter()
            .filter(|a| a.domain_id == domain)
            .map(account_json)
            .collect();
        paged(p, "account", items)
    }

    fn list_networks(&self, p: &Params) -> Value {
        let domain = param(p, "domainid");
        let items: Vec<Value> = self
            .networks
            .iter()
            .filter(|n| n.domain_id == domain)
            .map(network_json)
            .collect();
        paged(p, "network", items)
    }

    fn list_vms(&self, p: &Params) -> Value {
        let domain = param(p, "domainid");
        let items: Vec<Value> = self
            .vms
            .iter()
            .filter(|v| v.domain_id == domain)
            .map(vm_json)
            .collect();
        paged(p, "virtualmachine", items)
    }

    fn list_volumes(&self, p: &Params) -> Value {
        let domain = param(p, "domainid");
        let items: Vec<Value> = self
            .volumes
            .iter()
            .filter(|v| v.domain_id == domain)
            .map(volume_json)
            .collect();
        paged(p, "volume", items)
    }

    fn create_domain(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let name = required(p, "name")?;
        let id = self.next_id("dom");
        let rec = DomainRec {
            id,
            name: name.to_string(),
            parent_id: param(p, "parentdomainid").to_string(),
        };
        let out = json!({ "domain": domain_json(&rec) });
        self.domains.push(rec);
        Ok(out)
    }

    fn create_account(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let domain_id = required(p, "domainid")?.to_string();
        let name = required(p, "username")?.to_string();
        if !self.domains.iter().any(|d| d.id == domain_id) {
            return Err(ApiFault::param(format!("unable to find domain {domain_id}")));
        }
        let id = self.next_id("acc");
        let rec = AccountRec {
            id,
            name,
            domain_id,
        };
        let out = json!({ "account": account_json(&rec) });
        self.accounts.push(rec);
        Ok(out)
    }

    fn update_resource_limit(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let resource_type = required(p, "resourcetype")?;
        let max = required(p, "max")?;
        self.limit_updates += 1;
        Ok(json!({ "resourcelimit": {
            "resourcetype": resource_type,
            "max": max,
            "domainid": param(p, "domainid"),
            "account": param(p, "account"),
        }}))
    }

    fn create_network(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let rec = NetworkRec {
            id: self.next_id("net"),
            name: required(p, "name")?.to_string(),
            domain_id: required(p, "domainid")?.to_string(),
            gateway: required(p, "gateway")?.to_string(),
            netmask: required(p, "netmask")?.to_string(),
            vlan: param(p, "vlan").to_string(),
        };
        if self.networks.iter().any(|n| n.gateway == rec.gateway) {
            return Err(ApiFault::param(format!(
                "gateway {} overlaps an existing network",
                rec.gateway
            )));
        }
        let out = json!({ "network": network_json(&rec) });
        self.networks.push(rec);
        Ok(out)
    }

    fn deploy_vm(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let network_id = required(p, "networkids")?.to_string();
        let Some(domain_id) = self
            .networks
            .iter()
            .find(|n| n.id == network_id)
            .map(|n| n.domain_id.clone())
        else {
            return Err(ApiFault::param(format!("unable to find network {network_id}")));
        };
        let state = if param(p, "startvm") == "false" {
            "Stopped"
        } else {
            "Running"
        };
        let rec = VmRec {
            id: self.next_id("vm"),
            name: required(p, "name")?.to_string(),
            state: state.to_string(),
            domain_id,
            account: required(p, "account")?.to_string(),
            network_id,
        };
        let result = json!({ "virtualmachine": vm_json(&rec) });
        self.vms.push(rec);
        Ok(self.job(Ok(result)))
    }

    fn create_volume(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let rec = VolumeRec {
            id: self.next_id("vol"),
            name: required(p, "name")?.to_string(),
            domain_id: required(p, "domainid")?.to_string(),
            account: param(p, "account").to_string(),
            vm_id: None,
        };
        let result = json!({ "volume": volume_json(&rec) });
        self.volumes.push(rec);
        Ok(self.job(Ok(result)))
    }

    fn attach_volume(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let id = required(p, "id")?.to_string();
        let vm_id = required(p, "virtualmachineid")?.to_string();
        let vm_exists = self.vms.iter().any(|v| v.id == vm_id);
        let outcome = match self.volumes.iter_mut().find(|v| v.id == id) {
            Some(vol) if vm_exists && vol.vm_id.is_none() => {
                vol.vm_id = Some(vm_id);
                Ok(json!({ "volume": volume_json(vol) }))
            }
            Some(_) => Err(format!("volume {id} cannot be attached")),
            None => Err(format!("unable to find volume {id}")),
        };
        Ok(self.job(outcome))
    }

    fn transition_vm(&mut self, p: &Params, from: &str, to: &str) -> Result<Value, ApiFault> {
        let id = required(p, "id")?.to_string();
        let outcome = match self.vms.iter_mut().find(|v| v.id == id) {
            Some(vm) if vm.state == from => {
                vm.state = to.to_string();
                Ok(json!({ "virtualmachine": vm_json(vm) }))
            }
            Some(vm) => Err(format!("vm {id} is {}", vm.state)),
            None => Err(format!("unable to find vm {id}")),
        };
        Ok(self.job(outcome))
    }

    fn destroy_vm(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let id = required(p, "id")?.to_string();
        let before = self.vms.len();
        self.vms.retain(|v| v.id != id);
        let outcome = if self.vms.len() < before {
            for vol in self.volumes.iter_mut().filter(|v| v.vm_id.as_deref() == Some(id.as_str())) {
                vol.vm_id = None;
            }
            Ok(json!({ "virtualmachine": { "id": id, "state": "Expunging" } }))
        } else {
            Err(format!("unable to find vm {id}"))
        };
        Ok(self.job(outcome))
    }

    fn destroy_volume(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let id = required(p, "id")?.to_string();
        let before = self.volumes.len();
        self.volumes.retain(|v| v.id != id);
        let outcome = if self.volumes.len() < before {
            Ok(json!({ "success": true }))
        } else {
            Err(format!("unable to find volume {id}"))
        };
        Ok(self.job(outcome))
    }

    fn delete_network(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let id = required(p, "id")?.to_string();
        let outcome = if self.vms.iter().any(|v| v.network_id == id) {
            Err(format!("network {id} has running vms"))
        } else {
            let before = self.networks.len();
            self.networks.retain(|n| n.id != id);
            if self.networks.len() < before {
                Ok(json!({ "success": true }))
            } else {
                Err(format!("unable to find network {id}"))
            }
        };
        Ok(self.job(outcome))
    }

    fn delete_domain(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let id = required(p, "id")?.to_string();
        let busy = self.vms.iter().any(|v| v.domain_id == id)
            || self.networks.iter().any(|n| n.domain_id == id)
            || self.domains.iter().any(|d| d.parent_id == id);
        let outcome = if busy {
            Err(format!("domain {id} still has resources"))
        } else {
            let before = self.domains.len();
            self.domains.retain(|d| d.id != id);
            if self.domains.len() < before {
                self.accounts.retain(|a| a.domain_id != id);
                self.volumes.retain(|v| v.domain_id != id);
                Ok(json!({ "success": true }))
            } else {
                Err(format!("unable to find domain {id}"))
            }
        };
        Ok(self.job(outcome))
    }

    fn job(&mut self, outcome: Result<Value, String>) -> Value {
        let id = self.next_id("job");
        let job = match outcome {
            Ok(result) => Job {
                status: JOB_SUCCEEDED,
                result,
            },
            Err(text) => Job {
                status: JOB_FAILED,
                result: json!({ "errorcode": 530, "errortext": text }),
            },
        };
        self.jobs.insert(id.clone(), job);
        json!({ "jobid": id })
    }

    fn pending_job(&mut self) -> Value {
        let id = self.next_id("job");
        let job = Job {
            status: JOB_PENDING,
            result: Value::Null,
        };
        self.jobs.insert(id.clone(), job);
        json!({ "jobid": id })
    }

    fn query_job(&mut self, p: &Params) -> Result<Value, ApiFault> {
        let id = required(p, "jobid")?;
        let Some(job) = self.jobs.get(id) else {
            return Err(ApiFault::param(format!("unable to find job {id}")));
        };
        Ok(json!({
            "jobid": id,
            "jobstatus": job.status,
            "jobresult": job.result,
        }))
    }
}

fn param<'a>(p: &'a Params, key: &str) -> &'a str {
    p.get(key).map(String::as_str).unwrap_or_default()
}

fn required<'a>(p: &'a Params, key: &str) -> Result<&'a str, ApiFault> {
    match p.get(key) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiFault::param(format!("missing parameter {key}"))),
    }
}

/// Slices `items` by `page`/`pagesize`; empty listings come back as `{}`.
fn paged(p: &Params, field: &str, items: Vec<Value>) -> Value {
    let total = items.len();
    if total == 0 {
        return json!({});
    }
    let page: usize = param(p, "page").parse().unwrap_or(0);
    let size: usize = param(p, "pagesize").parse().unwrap_or(0);
    let slice: Vec<Value> = if page == 0 || size == 0 {
        items
    } else {
        items.into_iter().skip((page - 1) * size).take(size).collect()
    };
    let mut out = serde_json::Map::new();
    out.insert("count".to_string(), json!(total));
    if !slice.is_empty() {
        out.insert(field.to_string(), Value::Array(slice));
    }
    Value::Object(out)
}

fn domain_json(d: &DomainRec) -> Value {
    json!({ "id": d.id, "name": d.name, "parentdomainid": d.parent_id })
}

fn account_json(a: &AccountRec) -> Value {
    json!({ "id": a.id, "name": a.name, "domainid": a.domain_id })
}

fn network_json(n: &NetworkRec) -> Value {
    json!({
        "id": n.id,
        "name": n.name,
        "domainid": n.domain_id,
        "gateway": n.gateway,
        "netmask": n.netmask,
        "vlan": n.vlan,
    })
}

fn vm_json(v: &VmRec) -> Value {
    json!({
        "id": v.id,
        "name": v.name,
        "state": v.state,
        "domainid": v.domain_id,
        "account": v.account,
    })
}

fn volume_json(v: &VolumeRec) -> Value {
    json!({
        "id": v.id,
        "name": v.name,
        "domainid": v.domain_id,
        "account": v.account,
        "virtualmachineid": v.vm_id,
    })
}
