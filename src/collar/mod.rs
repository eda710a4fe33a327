//! The pet collar vendor's cloud API.

pub mod error;
pub mod tryfi;

use std::fmt;

pub use self::error::CollarError;
pub use self::tryfi::TryFiClient;

/// The collar's last reported position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollarLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix seconds at which the location was fetched.
    pub fetched_at: u64,
}

/// Account credentials for the collar service.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session-based access to one tracked collar.
///
/// Every operation except [`login`](CollarApi::login) requires a prior successful login and
/// fails with [`CollarError::SessionUninitialized`] otherwise.
#[allow(async_fn_in_trait)]
pub trait CollarApi {
    async fn login(&mut self, credentials: &Credentials) -> Result<(), CollarError>;

    fn has_session(&self) -> bool;

    /// Turn the collar's lost mode (high-frequency location reporting) on or off.
    async fn set_lost_mode(&mut self, enabled: bool) -> Result<(), CollarError>;

    /// Read the collar's current lost mode flag.
    async fn is_lost(&mut self) -> Result<bool, CollarError>;

    /// Ask the service for a fresh pet location. Returns `false` if none was available.
    async fn update_location(&mut self) -> Result<bool, CollarError>;

    /// The location stored by the last successful [`update_location`](CollarApi::update_location).
    fn last_known(&self) -> Option<CollarLocation>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("owner@example.com", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("owner@example.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
