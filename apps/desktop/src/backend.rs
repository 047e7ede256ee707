//! Backend process lifecycle: spawn, readiness poll, shutdown.

use std::{path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use tokio::process::{Child, Command};
use tracing::{info, warn};

const READINESS_POLL_DELAY: Duration = Duration::from_secs(1);

pub struct BackendProcess {
    child: Child,
}

impl BackendProcess {
    pub fn spawn(binary: &Path) -> Result<Self> {
        let child = Command::new(binary)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn backend '{}'", binary.display()))?;
        info!(pid = ?child.id(), "backend process spawned");
        Ok(Self { child })
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if let Err(error) = self.child.start_kill() {
            warn!(%error, "backend process was already gone");
        }
        let status = self.child.wait().await?;
        info!(%status, "backend process stopped");
        Ok(())
    }
}

/// Polls the listing endpoint once per second until the backend answers 200.
/// The window is not shown before this resolves.
pub async fn wait_until_ready(server_url: &str, max_attempts: u32) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{server_url}/todos");

    for attempt in 1..=max_attempts {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(attempt, "backend is ready");
                return Ok(());
            }
            Ok(response) => {
                info!(attempt, status = %response.status(), "backend not ready yet");
            }
            Err(error) => {
                info!(attempt, %error, "backend not reachable yet");
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(READINESS_POLL_DELAY).await;
        }
    }

    Err(anyhow!(
        "backend did not become ready after {max_attempts} attempts"
    ))
}
