use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{info, warn};

/// A map server launched as a child process. Killed on drop.
#[derive(Debug)]
pub struct MapServerProcess {
    child: Child,
}

impl MapServerProcess {
    /// Start `program`, binding it to `addr` through `MAP_SERVER_ADDR`.
    pub fn spawn(program: &str, addr: &str) -> io::Result<Self> {
        let child = Command::new(program)
            .env("MAP_SERVER_ADDR", addr)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        info!(program, addr, pid = child.id(), "Map server started");
        Ok(Self { child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the child and wait for it to exit.
    pub async fn shutdown(mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                warn!(%status, "Map server already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Map server status unavailable"),
        }

        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to stop map server");
            return;
        }
        info!("Map server stopped");
    }
}
