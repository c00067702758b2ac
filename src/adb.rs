use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Slow or loaded boxes can take a few seconds to answer adb.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// File transfers move a whole addon source file; give them more room.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum AdbError {
    #[error("adb timed out after {0:?}")]
    Timeout(Duration),
    #[error("adb failed: {0}")]
    CommandFailed(String),
    #[error("adb io error: {0}")]
    Io(#[from] std::io::Error),
}

/// File pull/push channel on the remote device.
///
/// Split out as a trait so the patch scheduler can be tested without a
/// device on the network.
#[async_trait]
pub trait RemoteFs: Send + Sync {
    async fn pull(&self, remote_path: &str) -> Result<String, AdbError>;
    async fn push(&self, remote_path: &str, content: &str) -> Result<(), AdbError>;
}

/// Remote-shell transport to the device, via the `adb` binary.
///
/// The device's adbd handles one session at a time reliably, so every
/// connect-and-command sequence runs under a single mutex; a patch cycle
/// and a playback dispatch never interleave commands on the connection.
pub struct AdbTransport {
    host: String,
    temp_dir: PathBuf,
    session: Mutex<()>,
}

impl AdbTransport {
    pub fn new(host: String, temp_dir: PathBuf) -> Self {
        Self {
            host,
            temp_dir,
            session: Mutex::new(()),
        }
    }

    async fn run(&self, args: &[&str], limit: Duration) -> Result<Output, AdbError> {
        debug!(args = ?args, "adb");

        let output = timeout(limit, Command::new("adb").args(args).output())
            .await
            .map_err(|_| AdbError::Timeout(limit))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AdbError::CommandFailed(stderr));
        }

        Ok(output)
    }

    /// Best-effort connect; a stale registration is dropped first. adbd
    /// often reports "already connected", so failures only warn.
    async fn connect(&self) {
        let _ = self
            .run(&["disconnect", self.host.as_str()], COMMAND_TIMEOUT)
            .await;
        if let Err(e) = self
            .run(&["connect", self.host.as_str()], COMMAND_TIMEOUT)
            .await
        {
            warn!(host = %self.host, error = %e, "adb connect failed");
        }
    }

    /// Run a shell command on the device.
    pub async fn shell(&self, args: &[&str]) -> Result<(), AdbError> {
        let _guard = self.session.lock().await;
        self.connect().await;

        let mut full = vec!["-s", self.host.as_str(), "shell"];
        full.extend_from_slice(args);
        self.run(&full, COMMAND_TIMEOUT).await?;
        Ok(())
    }

    fn local_temp(&self, name: &str) -> PathBuf {
        self.temp_dir.join(name)
    }
}

#[async_trait]
impl RemoteFs for AdbTransport {
    async fn pull(&self, remote_path: &str) -> Result<String, AdbError> {
        let _guard = self.session.lock().await;
        self.connect().await;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let local = self.local_temp("pull.tmp");
        let local_str = local.to_string_lossy().to_string();

        self.run(
            &["-s", self.host.as_str(), "pull", remote_path, local_str.as_str()],
            TRANSFER_TIMEOUT,
        )
        .await?;

        let content = tokio::fs::read_to_string(&local).await?;
        let _ = tokio::fs::remove_file(&local).await;
        Ok(content)
    }

    /// Push lands on `<path>.kodilink.tmp` first and only replaces the
    /// target with a remote `mv`; a failed transfer leaves the remote file
    /// in its pre-push state.
    async fn push(&self, remote_path: &str, content: &str) -> Result<(), AdbError> {
        let _guard = self.session.lock().await;
        self.connect().await;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let local = self.local_temp("push.tmp");
        let local_str = local.to_string_lossy().to_string();
        tokio::fs::write(&local, content).await?;

        let staging = format!("{}.kodilink.tmp", remote_path);

        let pushed = self
            .run(
                &[
                    "-s",
                    self.host.as_str(),
                    "push",
                    local_str.as_str(),
                    staging.as_str(),
                ],
                TRANSFER_TIMEOUT,
            )
            .await;
        let _ = tokio::fs::remove_file(&local).await;
        pushed?;

        self.run(
            &[
                "-s",
                self.host.as_str(),
                "shell",
                "mv",
                staging.as_str(),
                remote_path,
            ],
            COMMAND_TIMEOUT,
        )
        .await?;

        Ok(())
    }
}
