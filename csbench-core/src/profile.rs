pub const DEFAULT_EXPIRES_SECS: i64 = 600;
pub const DEFAULT_SIGNATURE_VERSION: u32 = 3;

/// Name of the profile used for bulk provisioning, teardown and VM actions.
pub const ADMIN_PROFILE: &str = "admin";

/// Identity used to sign API requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub api_key: String,
    pub secret_key: String,
    pub signature_version: u32,
    /// Request validity window, added to "now" to build the `expires` parameter.
    pub expires_secs: i64,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            signature_version: DEFAULT_SIGNATURE_VERSION,
            expires_secs: DEFAULT_EXPIRES_SECS,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.name == ADMIN_PROFILE
    }

    pub(crate) fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty()
    }
}
