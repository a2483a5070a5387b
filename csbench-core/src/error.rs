use crate::api::ApiError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`workers` must be a positive integer")]
    InvalidWorkers,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("task scheduler was closed while submitting work")]
    SchedulerClosed,

    #[error("invalid api url: `{0}`")]
    InvalidUrl(String),

    #[error("failed to read command list `{path}`: {source}")]
    CommandList {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}
