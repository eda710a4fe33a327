use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::csq::{CSQ_COMMAND, parse_csq};
use super::{CsqError, ModemError, ModemTransport, SignalQuality, classify};

/// Periodically samples modem signal quality on its own OS thread.
///
/// The latest level is handed to the async side through a `watch` channel, so a reading the
/// coordinator has not consumed yet is simply replaced by the next one.
pub struct SignalMonitor<T> {
    transport: T,
    interval: Duration,
    sender: watch::Sender<Option<SignalQuality>>,
}

impl<T: ModemTransport> SignalMonitor<T> {
    pub fn new(
        transport: T,
        interval: Duration,
        sender: watch::Sender<Option<SignalQuality>>,
    ) -> Self {
        Self {
            transport,
            interval,
            sender,
        }
    }

    /// Query the modem once and classify the answer.
    pub fn sample(&mut self) -> SignalQuality {
        let lines = match self.transport.exchange(CSQ_COMMAND) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(error = %e, "Modem exchange failed");
                return SignalQuality::Error;
            }
        };

        match parse_csq(&lines) {
            Ok((rssi, rsrq)) => {
                let level = classify(Some(rssi), Some(rsrq));
                debug!(rssi, rsrq, level = ?level, "Signal sampled");
                level
            }
            Err(CsqError::NoResponse) => {
                warn!("Modem gave no CSQ response");
                classify(None, None)
            }
            Err(e @ CsqError::Malformed(_)) => {
                warn!(error = %e, "Modem gave a malformed CSQ response");
                classify(None, None)
            }
        }
    }

    fn run(mut self, stop: mpsc::Receiver<()>) {
        loop {
            let level = self.sample();
            self.sender.send_replace(Some(level));

            match stop.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("Signal monitor stopped");
    }
}

/// Owner handle for a running signal monitor thread.
#[derive(Debug)]
pub struct SignalMonitorHandle {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl SignalMonitorHandle {
    /// Start a monitor thread. The transport is opened on that thread; if opening fails the
    /// monitor stays disabled for the rest of the session.
    pub fn spawn<T, F>(
        open: F,
        interval: Duration,
        sender: watch::Sender<Option<SignalQuality>>,
    ) -> std::io::Result<Self>
    where
        T: ModemTransport + 'static,
        F: FnOnce() -> Result<T, ModemError> + Send + 'static,
    {
        let (stop, stop_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("signal-monitor".to_string())
            .spawn(move || match open() {
                Ok(transport) => SignalMonitor::new(transport, interval, sender).run(stop_rx),
                Err(e) => error!(error = %e, "Signal monitor disabled"),
            })?;

        Ok(Self { stop, thread })
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Ask the thread to stop and wait for it. An in-flight modem read finishes first.
    pub fn shutdown(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            error!("Signal monitor thread panicked");
        }
    }

    /// [`shutdown`](Self::shutdown) from async code, joining on the blocking pool.
    pub async fn shutdown_async(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.shutdown()).await {
            error!(error = %e, "Signal monitor shutdown task failed");
        }
    }
}
