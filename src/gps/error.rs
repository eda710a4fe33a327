//! Error types for talking to the positioning daemon.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpsError {
    /// Could not reach or write to the daemon socket.
    #[error("gpsd connection failed")]
    Io(#[from] std::io::Error),

    /// `get_current` was called before `connect`.
    #[error("gpsd is not connected")]
    NotConnected,

    /// The daemon closed the connection mid-response.
    #[error("gpsd closed the connection")]
    Closed,

    /// A response line was not the JSON we expected.
    #[error("unexpected gpsd response")]
    Decode(#[from] serde_json::Error),

    /// The daemon did not answer in time.
    #[error("timeout waiting for gpsd")]
    Timeout(#[from] tokio::time::error::Elapsed),
}
