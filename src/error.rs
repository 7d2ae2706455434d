//! Error types. All of them are folded into plain return values at the
//! public scan/poll/download boundaries.

/// Why a candidate port did not yield a Client status. Every variant means "absent".
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code {0}")]
    Status(u16),

    #[error("invalid status payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ProbeError {
    /// A reachable port answered with something other than 200.
    pub fn is_unexpected_status(&self) -> bool {
        matches!(self, ProbeError::Status(_))
    }
}

/// A scan that produced no usable result at all.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("probe task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A download command that was not accepted by the Client.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("client rejected download with status {0}")]
    Rejected(u16),
}
