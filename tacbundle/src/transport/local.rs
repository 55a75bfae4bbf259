//! On-device transport: commands go straight to `FastCli`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;

use super::config::SshConfig;
use super::{Connector, ExecOutput, Transport};
use crate::channel::{InteractiveEvent, InteractiveResult, PtyChannel, PtyConfig};
use crate::error::{Error, Result, TransportError};
use crate::platform::{FASTCLI_PATH, PlatformDefinition};

/// Privilege level FastCli runs commands at.
const PRIVILEGE: &str = "15";

/// Opens [`LocalTransport`]s. The connection settings are ignored apart
/// from being logged; there is nothing to authenticate against.
#[derive(Debug, Clone)]
pub struct LocalConnector {
    fastcli: PathBuf,
    platform: PlatformDefinition,
}

impl LocalConnector {
    pub fn new(platform: PlatformDefinition) -> Self {
        Self {
            fastcli: PathBuf::from(FASTCLI_PATH),
            platform,
        }
    }

    /// Use a different CLI binary.
    pub fn with_fastcli(mut self, path: impl Into<PathBuf>) -> Self {
        self.fastcli = path.into();
        self
    }
}

impl Default for LocalConnector {
    fn default() -> Self {
        Self::new(PlatformDefinition::default())
    }
}

impl Connector for LocalConnector {
    type Transport = LocalTransport;

    async fn connect(&self, config: SshConfig) -> Result<LocalTransport> {
        if !tokio::fs::try_exists(&self.fastcli).await.unwrap_or(false) {
            return Err(TransportError::ConnectionFailed {
                host: config.host,
                port: config.port,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", self.fastcli.display()),
                ),
            }
            .into());
        }
        debug!("running locally via {}", self.fastcli.display());
        Ok(LocalTransport {
            fastcli: self.fastcli.clone(),
            platform: self.platform.clone(),
        })
    }
}

/// Runs commands on the device it is executing on.
#[derive(Debug)]
pub struct LocalTransport {
    fastcli: PathBuf,
    platform: PlatformDefinition,
}

impl Transport for LocalTransport {
    async fn exec(&mut self, command: &str, timeout: Duration) -> Result<ExecOutput> {
        debug!("exec locally: {}", command);
        let mut cmd = Command::new(&self.fastcli);
        cmd.args(["-p", PRIVILEGE, "-c", command])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| Error::io(&self.fastcli, e))?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_status: output.status.code().map(|c| c as u32),
        })
    }

    async fn interact(
        &mut self,
        events: &[InteractiveEvent],
        timeout: Duration,
    ) -> Result<InteractiveResult> {
        let mut child = Command::new(&self.fastcli)
            .args(["-p", PRIVILEGE])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::io(&self.fastcli, e))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(TransportError::ChannelOpenFailed("local shell").into());
        };

        let mut pty = PtyChannel::new(
            tokio::io::join(stdout, stdin),
            PtyConfig {
                timeout,
                ..Default::default()
            },
        );
        let result = match pty.prepare(&self.platform).await {
            Ok(()) => pty.run(events, &self.platform).await,
            Err(e) => Err(e),
        };
        if let Err(e) = pty.shutdown().await {
            warn!("closing local shell input: {e}");
        }
        drop(pty);
        if let Err(e) = child.kill().await {
            warn!("stopping local shell: {e}");
        }
        result
    }

    async fn download(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        _timeout: Duration,
    ) -> Result<u64> {
        tokio::fs::copy(remote_path, local_path)
            .await
            .map_err(|e| Error::io(remote_path, e))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::AuthMethod;

    fn config() -> SshConfig {
        SshConfig {
            host: "localhost".into(),
            port: 22,
            username: "admin".into(),
            auth: AuthMethod::None,
            timeout: Duration::from_secs(5),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: Default::default(),
            known_hosts_path: None,
        }
    }

    #[tokio::test]
    async fn test_connect_requires_cli_binary() {
        let connector = LocalConnector::default().with_fastcli("/nonexistent/FastCli");
        let err = connector.connect(config()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Connectivity);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_passes_command_to_cli() {
        // `echo` stands in for FastCli and prints its arguments back
        let connector = LocalConnector::default().with_fastcli("/bin/echo");
        let mut transport = connector.connect(config()).await.unwrap();
        let out = transport
            .exec("show version", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "-p 15 -c show version");
        assert_eq!(out.exit_status, Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_interact_with_exited_shell_cleans_up() {
        // `true` exits at once, so no prompt ever arrives
        let mut transport = LocalTransport {
            fastcli: PathBuf::from("/bin/true"),
            platform: PlatformDefinition::default(),
        };
        let events = [InteractiveEvent::new("show clock", r"#\s*$").unwrap()];
        let err = transport
            .interact(&events, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_download_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("TAC-bundle-1-leaf1-x.tar");
        std::fs::write(&src, b"bundle").unwrap();
        let dest = dir.path().join("out.tar");

        let mut transport = LocalTransport {
            fastcli: PathBuf::from(FASTCLI_PATH),
            platform: PlatformDefinition::default(),
        };
        let n = transport
            .download(src.to_str().unwrap(), &dest, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(n, 6);
        assert_eq!(std::fs::read(dest).unwrap(), b"bundle");
    }
}
