use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Remote store is unreachable")]
    Offline,

    #[error("Remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Sync worker is not running")]
    WorkerStopped,
}

impl SyncError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transport(_) | SyncError::Timeout(_) | SyncError::Offline => true,
            SyncError::Rejected { status, .. } => *status >= 500 || *status == 429,
            SyncError::Decode(_) | SyncError::WorkerStopped => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SyncError::Decode(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}
