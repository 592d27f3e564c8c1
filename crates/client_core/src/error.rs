use reqwest::StatusCode;
use shared::error::ApiError;
use thiserror::Error;

use crate::controller::Operation;

/// Everything that can go wrong talking to the todo server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server rejected request ({status}): {error}")]
    Api { status: StatusCode, error: ApiError },
    #[error("unexpected server response ({status}): {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    /// The mutation reached the server but the follow-up fetch did not, so
    /// local state is stale.
    #[error("{operation} was applied but refreshing local state failed: {source}")]
    Resync {
        operation: Operation,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Resync { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_resync(&self) -> bool {
        matches!(self, Self::Resync { .. })
    }
}
