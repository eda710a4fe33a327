use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use super::{MapEvent, RelayError};

/// Fire-and-forget delivery of [`MapEvent`]s to the map view.
#[allow(async_fn_in_trait)]
pub trait MapRelay {
    async fn publish(&self, event: MapEvent) -> Result<(), RelayError>;
}

/// Liveness check of the map server used by the readiness gate.
#[allow(async_fn_in_trait)]
pub trait ReadinessProbe {
    /// `true` once the server answers without an error.
    async fn probe(&self) -> bool;
}

/// Whatever displays the map page once the server is up.
#[allow(async_fn_in_trait)]
pub trait MapView {
    async fn load(&mut self, url: &Url) -> Result<(), RelayError>;
}

/// HTTP client for the local map server, covering both pushes and the readiness probe.
#[derive(Debug, Clone)]
pub struct HttpMapClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpMapClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl MapRelay for HttpMapClient {
    async fn publish(&self, event: MapEvent) -> Result<(), RelayError> {
        let endpoint = event.endpoint();
        let response = self
            .http
            .post(self.base.join(endpoint)?)
            .json(&event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        debug!(endpoint, "Relayed map event");
        Ok(())
    }
}

impl ReadinessProbe for HttpMapClient {
    async fn probe(&self) -> bool {
        match self.http.head(self.base.clone()).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "Map server probe answered");
                !(response.status().is_client_error() || response.status().is_server_error())
            }
            Err(e) => {
                debug!(error = %e, "Map server not reachable yet");
                false
            }
        }
    }
}

/// Opens the map page with an external command (e.g. a browser), or only logs the URL when no
/// command is configured.
#[derive(Debug, Clone, Default)]
pub struct BrowserMapView {
    command: Option<String>,
}

impl BrowserMapView {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl MapView for BrowserMapView {
    async fn load(&mut self, url: &Url) -> Result<(), RelayError> {
        match &self.command {
            Some(command) => {
                tokio::process::Command::new(command)
                    .arg(url.as_str())
                    .spawn()?;
                info!(%url, command = %command, "Opened map view");
            }
            None => info!(%url, "Map view ready"),
        }
        Ok(())
    }
}
