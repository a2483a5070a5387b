use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tracing::{info, warn};

use super::{BulkSettings, discover};
use crate::Result;
use crate::api::{CloudApi, VmState};
use crate::bucket::ResultBucket;
use crate::pool::{ProgressMarker, TaskPool};

pub const CATEGORY_PREFIX: &str = "vmaction-";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum VmAction {
    /// Start stopped VMs.
    Start,
    /// Stop running VMs.
    Stop,
    /// Reboot running VMs.
    Reboot,
    /// Stop running VMs and start stopped ones.
    Toggle,
    /// Toggle a random half of the VMs.
    Random,
}

/// The call issued for one VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmCall {
    Start,
    Stop,
    Reboot,
}

/// What happens to one VM: the category it is reported under and the call to make.
/// `call == None` records an unsuccessful result without touching the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Planned {
    pub category: &'static str,
    pub call: Option<VmCall>,
}

pub fn plan(action: VmAction, state: &VmState) -> Planned {
    use VmAction::*;

    match (state, action) {
        (VmState::Running, Stop | Toggle | Random) => Planned {
            category: "stop",
            call: Some(VmCall::Stop),
        },
        (VmState::Running, Reboot) => Planned {
            category: "reboot",
            call: Some(VmCall::Reboot),
        },
        (VmState::Stopped, Start | Toggle | Random) => Planned {
            category: "start",
            call: Some(VmCall::Start),
        },
        // A stopped VM cannot be rebooted.
        (VmState::Stopped, Reboot) => Planned {
            category: "stop",
            call: None,
        },
        _ => Planned {
            category: "skipped",
            call: None,
        },
    }
}

pub async fn run<C: CloudApi>(
    api: Arc<C>,
    settings: &BulkSettings,
    action: VmAction,
) -> Result<ResultBucket> {
    run_with_rng(api, settings, action, &mut StdRng::from_entropy()).await
}

/// Like [`run`], with the source of randomness for [`VmAction::Random`] supplied.
pub async fn run_with_rng<C: CloudApi, R: Rng + Send>(
    api: Arc<C>,
    settings: &BulkSettings,
    action: VmAction,
    rng: &mut R,
) -> Result<ResultBucket> {
    info!(parent = %settings.parent_domain_id, "fetching all VMs in sub-domains");
    let domains = discover::sub_domains(api.as_ref(), settings).await;
    let vms = discover::vms(api.as_ref(), &domains, settings.page_size).await;

    let total = vms.len();
    let started = Instant::now();
    let progress = ProgressMarker::new("VMs", total);
    let mut pool = TaskPool::new(settings.workers)?;

    for (i, vm) in vms.into_iter().enumerate() {
        progress.submitted(i + 1);

        if action == VmAction::Random && rng.gen_bool(0.5) {
            continue;
        }

        let planned = plan(action, &vm.state);
        let category = format!("{CATEGORY_PREFIX}{}", planned.category);
        let api = Arc::clone(&api);
        pool.submit(category, async move {
            let Some(call) = planned.call else {
                if planned.category == "skipped" {
                    warn!(vm = %vm.id, state = %vm.state, "vm state does not allow {action}");
                }
                return false;
            };
            let result = match call {
                VmCall::Start => api.start_vm(&vm.id).await,
                VmCall::Stop => api.stop_vm(&vm.id).await,
                VmCall::Reboot => api.reboot_vm(&vm.id).await,
            };
            match result {
                Ok(()) => true,
                Err(err) => {
                    warn!(vm = %vm.id, error = %err, "{} failed", planned.category);
                    false
                }
            }
        })
        .await?;
    }

    let bucket = pool.wait().await;
    info!(
        acted = bucket.len(),
        "executed {action} on {total} VMs in {:.2} seconds",
        started.elapsed().as_secs_f64()
    );
    Ok(bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_running_and_stopped() {
        let states = [
            VmState::Running,
            VmState::Stopped,
            VmState::Running,
            VmState::Stopped,
            VmState::Running,
        ];
        let categories: Vec<&str> = states
            .iter()
            .map(|s| plan(VmAction::Toggle, s).category)
            .collect();
        assert_eq!(categories.iter().filter(|c| **c == "stop").count(), 3);
        assert_eq!(categories.iter().filter(|c| **c == "start").count(), 2);
    }

    #[test]
    fn reboot_only_applies_to_running() {
        assert_eq!(
            plan(VmAction::Reboot, &VmState::Running),
            Planned {
                category: "reboot",
                call: Some(VmCall::Reboot)
            }
        );
        assert_eq!(
            plan(VmAction::Reboot, &VmState::Stopped),
            Planned {
                category: "stop",
                call: None
            }
        );
    }

    #[test]
    fn mismatched_states_are_skipped() {
        assert_eq!(plan(VmAction::Start, &VmState::Running).category, "skipped");
        assert_eq!(plan(VmAction::Stop, &VmState::Stopped).category, "skipped");
        let migrating = VmState::Other("Migrating".to_string());
        for action in [VmAction::Start, VmAction::Stop, VmAction::Toggle, VmAction::Random] {
            assert_eq!(plan(action, &migrating).call, None);
        }
    }

    #[test]
    fn action_names() {
        assert_eq!("toggle".parse::<VmAction>().ok(), Some(VmAction::Toggle));
        assert!("pause".parse::<VmAction>().is_err());
        assert_eq!(VmAction::Random.to_string(), "random");
    }
}
