use std::path::PathBuf;

use kite_core::WatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("http client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("api server probe failed: {0}")]
    Probe(#[source] WatchError),
}
