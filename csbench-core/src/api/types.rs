use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Domain {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "domainid")]
    pub domain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "domainid")]
    pub domain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum VmState {
    Running,
    Stopped,
    Other(String),
}

impl From<String> for VmState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Running" => Self::Running,
            "Stopped" => Self::Stopped,
            _ => Self::Other(value),
        }
    }
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("Running"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub state: VmState,
    #[serde(rename = "domainid")]
    pub domain_id: String,
    #[serde(default)]
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "domainid", default)]
    pub domain_id: String,
    #[serde(rename = "virtualmachineid", default)]
    pub vm_id: Option<String>,
}

/// One `updateResourceLimit` call; `account` narrows the limit from the domain to the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitUpdate {
    pub resource_type: u8,
    pub domain_id: String,
    pub account: Option<String>,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSpec {
    pub domain_id: String,
    pub network_id: String,
    pub account: String,
}
