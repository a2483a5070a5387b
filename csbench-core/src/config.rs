use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::warn;

use crate::profile::Profile;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/client/api/";

/// Page size used when walking listings and no `pagesize` is configured.
pub const DEFAULT_LISTING_PAGE_SIZE: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: `{key}` must appear inside a [profile] section")]
    KeyOutsideProfile { line: usize, key: String },

    #[error("line {line}: invalid value `{value}` for `{key}` (expected {expected})")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("no roles are defined in the configuration file")]
    NoProfiles,

    #[error("invalid api url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Settings consumed by the bulk create/teardown/vm-action paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioning {
    pub zone_id: String,
    pub network_offering_id: String,
    pub service_offering_id: String,
    pub disk_offering_id: String,
    pub template_id: String,
    pub parent_domain_id: String,
    pub num_domains: usize,
    pub num_networks: usize,
    pub subnet: Ipv4Addr,
    pub submask: u8,
    pub vlan_start: u16,
    pub vlan_end: u16,
    pub start_vm: bool,
    pub num_vms: usize,
    pub num_volumes: usize,
}

impl Default for Provisioning {
    fn default() -> Self {
        Self {
            zone_id: String::new(),
            network_offering_id: String::new(),
            service_offering_id: String::new(),
            disk_offering_id: String::new(),
            template_id: String::new(),
            parent_domain_id: String::new(),
            num_domains: 0,
            num_networks: 0,
            subnet: Ipv4Addr::new(10, 0, 0, 0),
            submask: 22,
            vlan_start: 80,
            vlan_end: 1000,
            start_vm: true,
            num_vms: 1,
            num_volumes: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    /// Host part of `url`; partitions the report directories.
    pub host: String,
    pub iterations: u32,
    pub page: u32,
    pub page_size: u32,
    /// Profiles in file order. Profiles without credentials are dropped while loading.
    pub profiles: Vec<Profile>,
    pub provisioning: Provisioning,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses the INI-style profile file.
    ///
    /// `[name]` starts a profile; `apikey`, `secretkey`, `expires` and `signatureversion`
    /// belong to the current profile, every other key is global and may appear anywhere.
    /// Lines starting with `;` are comments.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut url = DEFAULT_API_URL.to_string();
        let mut iterations = 1u32;
        let mut page = 0u32;
        let mut page_size = 0u32;
        let mut provisioning = Provisioning::default();
        let mut profiles: Vec<Profile> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                profiles.push(Profile::new(name.trim(), "", ""));
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            let field = Field {
                line: line_no,
                key: &key,
                value,
            };

            match key.as_str() {
                "apikey" | "secretkey" | "expires" | "signatureversion" => {
                    let Some(profile) = profiles.last_mut() else {
                        return Err(ConfigError::KeyOutsideProfile { line: line_no, key });
                    };
                    match key.as_str() {
                        "apikey" => profile.api_key = value.to_string(),
                        "secretkey" => profile.secret_key = value.to_string(),
                        "expires" => {
                            let secs: i64 = field.parse(EXPIRES_RANGE)?;
                            if !(1..=i64::from(i32::MAX)).contains(&secs) {
                                return Err(field.invalid(EXPIRES_RANGE));
                            }
                            profile.expires_secs = secs;
                        }
                        _ => profile.signature_version = field.parse("an integer")?,
                    }
                }
                "url" => url = value.to_string(),
                "iterations" => {
                    iterations = field.parse("a positive integer")?;
                    if iterations == 0 {
                        return Err(field.invalid("a positive integer"));
                    }
                }
                "page" => page = field.parse("an integer")?,
                "pagesize" => page_size = field.parse("an integer")?,
                "zoneid" => provisioning.zone_id = value.to_string(),
                "networkofferingid" => provisioning.network_offering_id = value.to_string(),
                "serviceofferingid" => provisioning.service_offering_id = value.to_string(),
                "diskofferingid" => provisioning.disk_offering_id = value.to_string(),
                "templateid" => provisioning.template_id = value.to_string(),
                "parentdomainid" => provisioning.parent_domain_id = value.to_string(),
                "numdomains" => provisioning.num_domains = field.parse("an integer")?,
                "numnetworks" => provisioning.num_networks = field.parse("an integer")?,
                "subnet" => provisioning.subnet = field.parse("an IPv4 address")?,
                "submask" => {
                    let mask: u8 = field.parse("a prefix length between 1 and 30")?;
                    if !(1..=30).contains(&mask) {
                        return Err(field.invalid("a prefix length between 1 and 30"));
                    }
                    provisioning.submask = mask;
                }
                "vlanrange" => {
                    let (start, end) = parse_vlan_range(value)
                        .ok_or_else(|| field.invalid("a range like 80-1000"))?;
                    provisioning.vlan_start = start;
                    provisioning.vlan_end = end;
                }
                "numvms" => provisioning.num_vms = field.parse("an integer")?,
                "startvm" => provisioning.start_vm = field.parse("true or false")?,
                "numvolumes" => provisioning.num_volumes = field.parse("an integer")?,
                _ => {}
            }
        }

        if profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        profiles.retain(|p| {
            let usable = p.has_credentials();
            if !usable {
                warn!(
                    profile = %p.name,
                    "skipping profile: apikey and secretkey must not be empty"
                );
            }
            usable
        });
        if profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }

        let host = parse_host(&url)?;

        Ok(Self {
            url,
            host,
            iterations,
            page,
            page_size,
            profiles,
            provisioning,
        })
    }

    #[must_use]
    pub fn admin_profile(&self) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.is_admin())
    }

    /// Page size used by the pagination walker.
    #[must_use]
    pub fn listing_page_size(&self) -> u32 {
        if self.page_size == 0 {
            DEFAULT_LISTING_PAGE_SIZE
        } else {
            self.page_size
        }
    }
}

const EXPIRES_RANGE: &str = "a number of seconds between 1 and 2147483647";

struct Field<'a> {
    line: usize,
    key: &'a str,
    value: &'a str,
}

impl Field<'_> {
    fn parse<T: FromStr>(&self, expected: &'static str) -> Result<T, ConfigError> {
        self.value.parse().map_err(|_| self.invalid(expected))
    }

    fn invalid(&self, expected: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            line: self.line,
            key: self.key.to_string(),
            value: self.value.to_string(),
            expected,
        }
    }
}

fn parse_vlan_range(value: &str) -> Option<(u16, u16)> {
    let (start, end) = value.split_once('-')?;
    let start: u16 = start.trim().parse().ok()?;
    let end: u16 = end.trim().parse().ok()?;
    (start <= end).then_some((start, end))
}

fn parse_host(url: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
; management server
url = http://10.1.1.5:8080/client/api
iterations = 3
page = 1
pagesize = 100

[admin]
apikey = admin-key
secretkey = admin-secret
expires = 300
signatureversion = 3

[user]
apikey = user-key
secretkey = user-secret

[broken]
apikey = only-key

zoneid = zone-1
parentdomainid = root-domain
numdomains = 4
numnetworks = 2
subnet = 10.10.0.0
submask = 24
vlanrange = 100-200
numvms = 3
startvm = false
numvolumes = 2
";

    #[test]
    fn parses_globals_profiles_and_provisioning() {
        let cfg = match Config::parse(SAMPLE) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse config: {err}"),
        };

        assert_eq!(cfg.url, "http://10.1.1.5:8080/client/api");
        assert_eq!(cfg.host, "10.1.1.5");
        assert_eq!(cfg.iterations, 3);
        assert_eq!(cfg.page, 1);
        assert_eq!(cfg.page_size, 100);

        let names: Vec<&str> = cfg.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["admin", "user"]);

        let admin = cfg.admin_profile().map(|p| (p.expires_secs, p.signature_version));
        assert_eq!(admin, Some((300, 3)));

        let p = &cfg.provisioning;
        assert_eq!(p.zone_id, "zone-1");
        assert_eq!(p.parent_domain_id, "root-domain");
        assert_eq!(p.num_domains, 4);
        assert_eq!(p.num_networks, 2);
        assert_eq!(p.subnet, Ipv4Addr::new(10, 10, 0, 0));
        assert_eq!(p.submask, 24);
        assert_eq!((p.vlan_start, p.vlan_end), (100, 200));
        assert_eq!(p.num_vms, 3);
        assert!(!p.start_vm);
        assert_eq!(p.num_volumes, 2);
    }

    #[test]
    fn defaults_apply_when_keys_are_missing() {
        let cfg = match Config::parse("[admin]\napikey=a\nsecretkey=s\n") {
            Ok(v) => v,
            Err(err) => panic!("failed to parse config: {err}"),
        };

        assert_eq!(cfg.url, DEFAULT_API_URL);
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.iterations, 1);
        assert_eq!(cfg.listing_page_size(), DEFAULT_LISTING_PAGE_SIZE);
        assert_eq!(cfg.provisioning, Provisioning::default());
        assert_eq!(cfg.profiles[0].expires_secs, 600);
        assert_eq!(cfg.profiles[0].signature_version, 3);
    }

    #[test]
    fn rejects_empty_or_unusable_profile_sets() {
        assert!(matches!(
            Config::parse("url = http://x/client/api\n"),
            Err(ConfigError::NoProfiles)
        ));
        assert!(matches!(
            Config::parse("[user]\napikey = k\n"),
            Err(ConfigError::NoProfiles)
        ));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = Config::parse("[a]\napikey=k\nsecretkey=s\niterations = many\n");
        assert!(matches!(
            err,
            Err(ConfigError::InvalidValue { line: 4, ref key, .. }) if key == "iterations"
        ));

        assert!(matches!(
            Config::parse("[a]\napikey=k\nsecretkey=s\niterations = 0\n"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::parse("[a]\napikey=k\nsecretkey=s\nvlanrange = 200-100\n"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::parse("apikey = k\n[a]\n"),
            Err(ConfigError::KeyOutsideProfile { line: 1, .. })
        ));
        assert!(matches!(
            Config::parse("[a]\napikey=k\nsecretkey=s\nurl = not a url\n"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_expiry_windows_outside_the_signable_range() {
        for value in ["9000000000000000000", "2147483648", "0", "-5"] {
            let text = format!("[admin]\napikey = k\nsecretkey = s\nexpires = {value}\n");
            assert!(
                matches!(
                    Config::parse(&text),
                    Err(ConfigError::InvalidValue { line: 4, ref key, .. }) if key == "expires"
                ),
                "expires = {value} should be rejected"
            );
        }

        let text = "[admin]\napikey = k\nsecretkey = s\nexpires = 2147483647\n";
        let cfg = match Config::parse(text) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse config: {err}"),
        };
        assert_eq!(cfg.profiles[0].expires_secs, i64::from(i32::MAX));
    }
}
