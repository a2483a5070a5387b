//! CloudStack-style management API: reply parsing, resource types and the signed client
//! used by the bulk operations.

mod client;
pub mod network_plan;
pub mod reply;
mod types;

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;

pub use client::{CloudStackClient, JobPolling};
pub use network_plan::NetworkPlan;
pub use reply::Reply;
pub use types::{Account, Domain, LimitUpdate, Network, VirtualMachine, VmSpec, VmState, Volume};

use crate::pagination::Page;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] csbench_http::Error),

    #[error("unexpected http status {status}")]
    Status { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("api error {code}: {text}")]
    Remote { code: i64, text: String },

    #[error("async job {job_id} failed: {text}")]
    JobFailed { job_id: String, text: String },

    #[error("async job {job_id} did not finish within {timeout:?}")]
    JobTimeout { job_id: String, timeout: Duration },

    #[error("cannot plan network #{index}: address space exhausted")]
    AddressSpace { index: u32 },
}

impl ApiError {
    /// Error code reported by the server, when it answered with one.
    #[must_use]
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    #[must_use]
    pub fn transport_kind(&self) -> Option<csbench_http::HttpTransportErrorKind> {
        match self {
            Self::Transport(err) => Some(err.transport_error_kind()),
            _ => None,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Resource operations the bulk paths drive.
///
/// Listings are paged by the implementation and report the total count; every call may fail
/// with a transport or remote error and is never retried by callers.
pub trait CloudApi: Send + Sync + 'static {
    fn list_sub_domains(
        &self,
        parent_id: &str,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = ApiResult<Page<Domain>>> + Send;

    fn list_accounts(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = ApiResult<Page<Account>>> + Send;

    fn list_networks(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = ApiResult<Page<Network>>> + Send;

    fn list_vms(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = ApiResult<Page<VirtualMachine>>> + Send;

    fn list_volumes(
        &self,
        domain_id: &str,
        page: u32,
        page_size: u32,
    ) -> impl Future<Output = ApiResult<Page<Volume>>> + Send;

    fn create_domain(&self, parent_id: &str) -> impl Future<Output = ApiResult<Domain>> + Send;

    fn create_account(&self, domain_id: &str) -> impl Future<Output = ApiResult<Account>> + Send;

    fn update_resource_limit(
        &self,
        update: &LimitUpdate,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    /// `index` selects the address block carved out of the configured subnet.
    fn create_network(
        &self,
        domain_id: &str,
        index: u32,
    ) -> impl Future<Output = ApiResult<Network>> + Send;

    fn deploy_vm(&self, spec: &VmSpec) -> impl Future<Output = ApiResult<VirtualMachine>> + Send;

    fn create_volume(
        &self,
        domain_id: &str,
        account: &str,
    ) -> impl Future<Output = ApiResult<Volume>> + Send;

    fn attach_volume(
        &self,
        volume_id: &str,
        vm_id: &str,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn start_vm(&self, vm_id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    fn stop_vm(&self, vm_id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    fn reboot_vm(&self, vm_id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Destroys and expunges.
    fn destroy_vm(&self, vm_id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Destroys and expunges.
    fn destroy_volume(&self, volume_id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    fn delete_network(&self, network_id: &str) -> impl Future<Output = ApiResult<bool>> + Send;

    fn delete_domain(&self, domain_id: &str) -> impl Future<Output = ApiResult<bool>> + Send;
}

/// `prefix` followed by ten random alphanumerics.
pub fn random_name(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{prefix}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_names_have_prefix_and_suffix() {
        let a = random_name("Domain-");
        let b = random_name("Domain-");
        assert!(a.starts_with("Domain-"));
        assert_eq!(a.len(), "Domain-".len() + 10);
        assert!(a["Domain-".len()..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn error_classification() {
        let remote = ApiError::Remote {
            code: 431,
            text: "bad".to_string(),
        };
        assert_eq!(remote.remote_code(), Some(431));
        assert_eq!(remote.transport_kind(), None);

        let timeout = ApiError::Transport(csbench_http::Error::Timeout(Duration::from_secs(1)));
        assert_eq!(
            timeout.transport_kind(),
            Some(csbench_http::HttpTransportErrorKind::Timeout)
        );
        assert_eq!(timeout.remote_code(), None);
    }
}
