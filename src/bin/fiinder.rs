use anyhow::{Context, Result};
use fiinder::collar::{CollarApi, TryFiClient};
use fiinder::config::{EMAIL_VAR, PASSWORD_VAR, TrackerConfig};
use fiinder::coordinator::{Control, Coordinator};
use fiinder::gps::GpsdClient;
use fiinder::map::{BrowserMapView, HttpMapClient};
use fiinder::service::MapServerProcess;
use fiinder::signal::{SerialModem, SignalMonitorHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = TrackerConfig::from_env().context("invalid FIINDER_MAP_URL")?;
    let cadence = config.cadence;

    info!(
        map = %config.map_url,
        gpsd = %config.gpsd_addr,
        modem = %config.modem.port,
        "Tracker starting"
    );

    let map_server = match &config.map_server_bin {
        Some(program) => Some(MapServerProcess::spawn(program, &config.map_server_addr())?),
        None => None,
    };

    let mut collar = TryFiClient::new(&config.collar_api_url, cadence.request_timeout)?;
    match &config.credentials {
        Some(credentials) => match collar.login(credentials).await {
            Ok(()) => info!("Logged in to collar service"),
            Err(e) => error!(error = %e, "Collar login failed, tracking unavailable"),
        },
        None => warn!("{EMAIL_VAR} and {PASSWORD_VAR} not set, tracking unavailable"),
    }

    let (signal_tx, signal_rx) = watch::channel(None);
    let modem = config.modem.clone();
    let monitor =
        SignalMonitorHandle::spawn(move || SerialModem::open(&modem), cadence.signal, signal_tx)?;

    let (control_tx, control_rx) = mpsc::channel(8);
    tokio::spawn(read_controls(control_tx));

    let map = HttpMapClient::new(config.map_url.clone(), cadence.request_timeout)?;
    let mut coordinator = Coordinator::new(
        GpsdClient::new(config.gpsd_addr.clone(), cadence.request_timeout),
        collar,
        map,
        BrowserMapView::new(config.browser.clone()),
        config.map_url.clone(),
        cadence,
    );

    info!("Type 't' + Enter to toggle tracking, 'q' to quit");
    coordinator.run(control_rx, signal_rx).await;

    monitor.shutdown_async().await;
    if let Some(map_server) = map_server {
        map_server.shutdown().await;
    }
    drop(coordinator);

    info!("Tracker stopped");
    Ok(())
}

/// Translate terminal lines and Ctrl-C into control requests.
async fn read_controls(control: mpsc::Sender<Control>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let request = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match line.trim() {
                    "t" | "toggle" => Control::Toggle,
                    "q" | "quit" => Control::Shutdown,
                    "" => continue,
                    other => {
                        warn!(input = other, "Unknown command");
                        continue;
                    }
                },
                Ok(None) => Control::Shutdown,
                Err(e) => {
                    warn!(error = %e, "Failed to read terminal input");
                    Control::Shutdown
                }
            },

            _ = tokio::signal::ctrl_c() => Control::Shutdown,
        };

        let shutdown = request == Control::Shutdown;
        if control.send(request).await.is_err() || shutdown {
            break;
        }
    }
}

