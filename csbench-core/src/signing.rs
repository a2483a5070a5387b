use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::profile::Profile;

type HmacSha1 = Hmac<Sha1>;

const EXPIRES_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A parameter set with its signature attached.
///
/// `encoded()` is the exact form body sent on the wire. Keys are sorted and values are
/// percent-encoded with `%20` for spaces, so the signed bytes and the sent bytes only differ
/// in case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParams {
    params: BTreeMap<String, String>,
    signature: String,
    encoded: String,
}

impl SignedParams {
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn command(&self) -> &str {
        self.get("command").unwrap_or_default()
    }
}

/// Parameters for one benchmark invocation of `command`.
pub fn benchmark_params(
    profile: &Profile,
    command: &str,
    page: u32,
    page_size: u32,
    keyword: &str,
    now: DateTime<Utc>,
) -> SignedParams {
    let mut params = base_params(profile, command, now);
    if command == "listTemplates" {
        params.insert("templatefilter".to_string(), "all".to_string());
    }
    if page != 0 {
        params.insert("page".to_string(), page.to_string());
        params.insert("pagesize".to_string(), page_size.to_string());
    }
    if !keyword.is_empty() {
        params.insert("keyword".to_string(), keyword.to_string());
    }
    sign(params, &profile.secret_key)
}

/// Parameters for an arbitrary API command; `extra` overrides the defaults.
pub fn command_params<'a, I>(
    profile: &Profile,
    command: &str,
    extra: I,
    now: DateTime<Utc>,
) -> SignedParams
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut params = base_params(profile, command, now);
    for (k, v) in extra {
        params.insert(k.to_string(), v);
    }
    sign(params, &profile.secret_key)
}

fn base_params(profile: &Profile, command: &str, now: DateTime<Utc>) -> BTreeMap<String, String> {
    let expires = expires_at(now, profile.expires_secs);

    let mut params = BTreeMap::new();
    params.insert("apiKey".to_string(), profile.api_key.clone());
    params.insert("response".to_string(), "json".to_string());
    params.insert(
        "signatureVersion".to_string(),
        profile.signature_version.to_string(),
    );
    params.insert("listall".to_string(), "true".to_string());
    params.insert(
        "expires".to_string(),
        expires.format(EXPIRES_FORMAT).to_string(),
    );
    params.insert("command".to_string(), command.to_string());
    params
}

/// `now + secs`, saturating at the last representable instant.
fn expires_at(now: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(secs)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(if secs < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

fn sign(params: BTreeMap<String, String>, secret_key: &str) -> SignedParams {
    let query = canonical_query(&params);
    let signature = compute_signature(&query, secret_key);

    let mut encoded = query;
    encoded.push_str("&signature=");
    encoded.push_str(&percent_encode(&signature));

    SignedParams {
        params,
        signature,
        encoded,
    }
}

/// Sorted `key=value` pairs joined by `&`.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in params {
        ser.append_pair(k, v);
    }
    ser.finish().replace('+', "%20")
}

/// HMAC-SHA1 over the lower-cased query, base64 with padding.
pub fn compute_signature(query: &str, secret_key: &str) -> String {
    let Ok(mut mac) = HmacSha1::new_from_slice(secret_key.as_bytes()) else {
        return String::new();
    };
    mac.update(query.to_lowercase().as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

fn percent_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn profile() -> Profile {
        Profile::new("admin", "api key", "secret")
    }

    fn fixed_now() -> DateTime<Utc> {
        match Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0) {
            chrono::LocalResult::Single(t) => t,
            _ => panic!("invalid fixed timestamp"),
        }
    }

    #[test]
    fn sets_default_parameters_and_expiry() {
        let p = benchmark_params(&profile(), "listVirtualMachines", 0, 0, "", fixed_now());

        assert_eq!(p.get("apiKey"), Some("api key"));
        assert_eq!(p.get("response"), Some("json"));
        assert_eq!(p.get("signatureVersion"), Some("3"));
        assert_eq!(p.get("listall"), Some("true"));
        assert_eq!(p.get("expires"), Some("2024-05-01T12:10:00Z"));
        assert_eq!(p.command(), "listVirtualMachines");
        assert_eq!(p.get("page"), None);
        assert_eq!(p.get("pagesize"), None);
        assert_eq!(p.get("keyword"), None);
        assert_eq!(p.get("templatefilter"), None);
    }

    #[test]
    fn optional_parameters_follow_request_shape() {
        let p = benchmark_params(&profile(), "listTemplates", 2, 50, "web", fixed_now());

        assert_eq!(p.get("templatefilter"), Some("all"));
        assert_eq!(p.get("page"), Some("2"));
        assert_eq!(p.get("pagesize"), Some("50"));
        assert_eq!(p.get("keyword"), Some("web"));
    }

    #[test]
    fn encoded_body_is_sorted_and_uses_percent20() {
        let p = benchmark_params(&profile(), "listZones", 0, 0, "", fixed_now());
        let body = p.encoded();

        assert!(body.starts_with("apiKey=api%20key&command=listZones&expires="));
        assert!(!body.contains('+'));

        let (unsigned, sig) = match body.rsplit_once("&signature=") {
            Some(v) => v,
            None => panic!("signature missing from body: {body}"),
        };
        assert_eq!(compute_signature(unsigned, "secret"), p.signature());
        assert_eq!(sig, percent_encode(p.signature()));
    }

    #[test]
    fn signature_is_deterministic() {
        let a = benchmark_params(&profile(), "listZones", 1, 10, "x", fixed_now());
        let b = benchmark_params(&profile(), "listZones", 1, 10, "x", fixed_now());
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.encoded(), b.encoded());
    }

    #[test]
    fn signature_changes_with_any_parameter() {
        let base = benchmark_params(&profile(), "listZones", 1, 10, "x", fixed_now());
        let variants = [
            benchmark_params(&profile(), "listHosts", 1, 10, "x", fixed_now()),
            benchmark_params(&profile(), "listZones", 2, 10, "x", fixed_now()),
            benchmark_params(&profile(), "listZones", 1, 20, "x", fixed_now()),
            benchmark_params(&profile(), "listZones", 1, 10, "y", fixed_now()),
            benchmark_params(
                &profile(),
                "listZones",
                1,
                10,
                "x",
                fixed_now() + TimeDelta::seconds(1),
            ),
            benchmark_params(
                &Profile::new("admin", "api key", "other"),
                "listZones",
                1,
                10,
                "x",
                fixed_now(),
            ),
        ];
        for v in variants {
            assert_ne!(v.signature(), base.signature());
        }
    }

    #[test]
    fn huge_expiry_windows_saturate_instead_of_overflowing() {
        let mut p = profile();
        p.expires_secs = 9_000_000_000_000_000_000;
        let params = benchmark_params(&p, "listZones", 0, 0, "", fixed_now());
        assert!(params.get("expires").is_some());
        assert_eq!(expires_at(fixed_now(), i64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(expires_at(fixed_now(), i64::MIN), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            expires_at(fixed_now(), 600),
            fixed_now() + TimeDelta::seconds(600)
        );
    }

    #[test]
    fn signing_is_case_insensitive_over_the_query() {
        assert_eq!(
            compute_signature("apikey=ABC&command=listZones", "s"),
            compute_signature("apiKey=abc&command=LISTZONES", "s"),
        );
    }

    #[test]
    fn command_params_override_defaults() {
        let p = command_params(
            &profile(),
            "deployVirtualMachine",
            [("zoneid", "z1".to_string()), ("listall", "false".to_string())],
            fixed_now(),
        );
        assert_eq!(p.get("zoneid"), Some("z1"));
        assert_eq!(p.get("listall"), Some("false"));
        assert_eq!(p.command(), "deployVirtualMachine");
    }
}
