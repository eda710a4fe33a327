//! Runtime configuration, read from the environment with defaults.

use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::collar::Credentials;
use crate::collar::tryfi::DEFAULT_API_URL;
use crate::gps::gpsd::DEFAULT_GPSD_ADDR;
use crate::signal::modem::ModemConfig;

pub const EMAIL_VAR: &str = "TRYFI_EMAIL";
pub const PASSWORD_VAR: &str = "TRYFI_PASSWORD";

pub const DEFAULT_MAP_URL: &str = "http://127.0.0.1:5000";

/// How often each source is polled.
#[derive(Debug, Clone, Copy, Builder)]
pub struct Cadence {
    #[builder(default = Duration::from_secs(1))]
    pub server_probe: Duration,

    /// Delay between the end of one GPS poll and the start of the next.
    #[builder(default = Duration::from_secs(2))]
    pub gps_poll: Duration,

    /// First lost mode check after tracking starts.
    #[builder(default = Duration::from_secs(1))]
    pub lost_mode_first_check: Duration,

    #[builder(default = Duration::from_secs(5))]
    pub lost_mode_check: Duration,

    #[builder(default = Duration::from_secs(5))]
    pub collar_fetch: Duration,

    #[builder(default = Duration::from_secs(5))]
    pub signal: Duration,

    /// Upper bound on every remote call.
    #[builder(default = Duration::from_secs(5))]
    pub request_timeout: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Everything the tracker binary needs to start.
#[derive(Debug, Clone, Builder)]
pub struct TrackerConfig {
    pub map_url: Url,

    #[builder(default = DEFAULT_GPSD_ADDR.to_string())]
    pub gpsd_addr: String,

    #[builder(default = DEFAULT_API_URL.to_string())]
    pub collar_api_url: String,

    pub credentials: Option<Credentials>,

    #[builder(default = ModemConfig::builder().build())]
    pub modem: ModemConfig,

    /// Map server executable to launch; `None` expects it to be running already.
    pub map_server_bin: Option<String>,

    /// Command used to open the map page.
    pub browser: Option<String>,

    #[builder(default)]
    pub cadence: Cadence,
}

impl TrackerConfig {
    /// Read the configuration from `FIINDER_*` and `TRYFI_*` environment variables.
    pub fn from_env() -> Result<Self, url::ParseError> {
        let map_url =
            std::env::var("FIINDER_MAP_URL").unwrap_or_else(|_| DEFAULT_MAP_URL.to_string());

        let credentials = match (std::env::var(EMAIL_VAR), std::env::var(PASSWORD_VAR)) {
            (Ok(email), Ok(password)) => Some(Credentials::new(email, password)),
            _ => None,
        };

        let mut modem = ModemConfig::builder().build();
        if let Ok(port) = std::env::var("FIINDER_MODEM_PORT") {
            modem.port = port;
        }

        let mut config = Self::builder()
            .map_url(Url::parse(&map_url)?)
            .maybe_credentials(credentials)
            .modem(modem)
            .maybe_map_server_bin(std::env::var("FIINDER_MAP_SERVER_BIN").ok())
            .maybe_browser(std::env::var("FIINDER_BROWSER").ok())
            .build();

        if let Ok(addr) = std::env::var("FIINDER_GPSD_ADDR") {
            config.gpsd_addr = addr;
        }
        if let Ok(url) = std::env::var("FIINDER_COLLAR_API_URL") {
            config.collar_api_url = url;
        }

        Ok(config)
    }

    /// `host:port` a spawned map server listens on, taken from the map URL.
    pub fn map_server_addr(&self) -> String {
        let host = self.map_url.host_str().unwrap_or("127.0.0.1");
        let port = self.map_url.port_or_known_default().unwrap_or(5000);
        format!("{host}:{port}")
    }
}
