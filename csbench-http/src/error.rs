use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse class of a failed exchange, suitable as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HttpTransportErrorKind {
    InvalidUrl,
    UnsupportedScheme,
    RequestBuild,
    Connect,
    Timeout,
    BodyRead,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid management server url: {0}")]
    InvalidUrl(String),

    #[error("only http:// and https:// URLs are supported: {0}")]
    UnsupportedScheme(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("request to management server failed: {0}")]
    Connect(#[from] hyper_util::client::legacy::Error),

    #[error("no response from management server within {0:?}")]
    Timeout(Duration),

    #[error("failed to read api response body: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl Error {
    #[must_use]
    pub fn transport_error_kind(&self) -> HttpTransportErrorKind {
        match self {
            Self::InvalidUrl(_) => HttpTransportErrorKind::InvalidUrl,
            Self::UnsupportedScheme(_) => HttpTransportErrorKind::UnsupportedScheme,
            Self::RequestBuild(_) => HttpTransportErrorKind::RequestBuild,
            Self::Connect(_) => HttpTransportErrorKind::Connect,
            Self::Timeout(_) => HttpTransportErrorKind::Timeout,
            Self::BodyRead(_) => HttpTransportErrorKind::BodyRead,
        }
    }
}
