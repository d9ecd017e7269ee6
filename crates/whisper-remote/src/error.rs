use thiserror::Error;

use crate::guard::ResourceClass;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Everything a client operation can fail with.  None of these are fatal:
/// the worst case is stale status until the next successful poll.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure, non-2xx status or an unparseable body.
    #[error("{endpoint}: {cause}")]
    Network {
        endpoint: String,
        #[source]
        cause: NetworkCause,
    },
    /// The device answered 2xx but with `{"status":"error"}`.
    #[error("{endpoint}: {message}")]
    Rejected { endpoint: String, message: String },
    #[error("no stations available")]
    EmptyDirectory,
    /// Another mutation of the same class is still in flight.
    #[error("{0} change already in flight")]
    LockConflict(ResourceClass),
    /// Device reports OFFLINE; stream controls are unavailable.
    #[error("stream mode requires the device to be online")]
    StreamUnavailable,
    #[error("volume must be between 0 and 100, got {0}")]
    VolumeOutOfRange(u32),
}

#[derive(Debug, Error)]
pub enum NetworkCause {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("malformed body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn network(endpoint: impl ToString, cause: impl Into<NetworkCause>) -> Self {
        ClientError::Network {
            endpoint: endpoint.to_string(),
            cause: cause.into(),
        }
    }

    /// Lock conflicts are duplicate user input; they never reach the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, ClientError::LockConflict(_))
    }
}
