/// `Host` header for `parsed`, keeping an explicit port.
pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

pub(super) fn validate_url(raw: &str) -> Result<url::Url, crate::Error> {
    let parsed = url::Url::parse(raw).map_err(|_| crate::Error::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(crate::Error::UnsupportedScheme(raw.to_string())),
    }
}
