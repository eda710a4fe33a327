use thiserror::Error;

/// A push to the map server did not go through. Never retried.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("map server request failed")]
    Http(#[from] reqwest::Error),

    #[error("map server returned HTTP {status} for {endpoint}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("invalid map server URL")]
    Url(#[from] url::ParseError),

    #[error("could not open the map view")]
    Launch(#[from] std::io::Error),
}
