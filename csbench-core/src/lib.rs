#![forbid(unsafe_code)]

pub mod api;
pub mod benchmark;
mod bucket;
pub mod config;
mod endpoint;
mod error;
pub mod ops;
pub mod pagination;
mod pool;
mod profile;
pub mod report;
pub mod signing;
pub mod stats;

pub use bucket::{ResultBucket, TaskResult};
pub use config::{Config, ConfigError, Provisioning};
pub use endpoint::{ApiEndpoint, RequestMethod};
pub use error::{Error, Result};
pub use pool::{ProgressMarker, TaskPool};
pub use profile::{ADMIN_PROFILE, DEFAULT_EXPIRES_SECS, DEFAULT_SIGNATURE_VERSION, Profile};
