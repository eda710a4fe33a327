//! Error types for the collar cloud API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollarError {
    /// An operation needing a session was called before a successful login.
    #[error("collar session is not initialized")]
    SessionUninitialized,

    /// Login was rejected or the response carried no session.
    #[error("collar login failed: {0}")]
    Authentication(String),

    /// The account has no pet with a collar to track.
    #[error("no pet found on the collar account")]
    NoPet,

    /// The API answered with a non-success status.
    #[error("collar API returned HTTP {status}")]
    Status { status: u16 },

    /// The API answered 200 but reported GraphQL errors or an unexpected shape.
    #[error("collar API error: {0}")]
    Api(String),

    /// Transport failure, including the request timeout.
    #[error("collar API request failed")]
    Http(#[from] reqwest::Error),

    #[error("invalid collar API URL")]
    Url(#[from] url::ParseError),
}
