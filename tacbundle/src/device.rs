//! What we know about the device being collected from.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use log::{info, warn};
use regex::Regex;

use crate::error::{Error, Result};
use crate::platform::FASTCLI_PATH;
use crate::session::Session;
use crate::transport::Transport;
use crate::version::Version;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*hostname\s*:\s*(\S+)").expect("static hostname pattern compiles")
});

/// Where the collector runs relative to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// On the switch itself, talking to the local CLI.
    OnDevice,
    /// On a workstation, talking to the switch over SSH.
    Remote,
}

impl ExecutionMode {
    /// Detect the mode from the presence of the on-box CLI.
    pub fn detect() -> Self {
        Self::detect_at(Path::new(FASTCLI_PATH))
    }

    pub fn detect_at(cli: &Path) -> Self {
        if cli.exists() {
            ExecutionMode::OnDevice
        } else {
            ExecutionMode::Remote
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::OnDevice => f.write_str("on-device"),
            ExecutionMode::Remote => f.write_str("remote"),
        }
    }
}

/// A device, as discovered at the start of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Hostname, or the target host when the hostname is unavailable.
    pub identifier: String,
    pub version: Version,
    pub execution_mode: ExecutionMode,
}

impl Device {
    /// Query version and hostname through `session`.
    pub async fn discover<T: Transport>(
        session: &mut Session<T>,
        execution_mode: ExecutionMode,
    ) -> Result<Self> {
        let report = session.run("show version").await?;
        let version = Version::from_report(&report.stdout).map_err(|e| {
            Error::config(format!("cannot determine device software version: {e}"))
        })?;

        let identifier = match session.execute("show hostname").await {
            Ok(out) if out.is_success() => parse_hostname(&out.stdout),
            Ok(out) => {
                warn!("'show hostname' failed: {}", out.stdout);
                None
            }
            Err(e) => return Err(e),
        }
        .unwrap_or_else(|| session.target_host().to_string());

        info!("device {} runs EOS {} ({})", identifier, version, execution_mode);
        Ok(Self {
            identifier,
            version,
            execution_mode,
        })
    }
}

/// Extract the short hostname from `show hostname` output.
pub fn parse_hostname(report: &str) -> Option<String> {
    HOSTNAME
        .captures(report)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hostname() {
        let out = "Hostname: leaf1\nFQDN:     leaf1.dc1.example.net\n";
        assert_eq!(parse_hostname(out).as_deref(), Some("leaf1"));
        assert_eq!(parse_hostname("% Invalid input"), None);
        assert_eq!(parse_hostname(""), None);
    }

    #[test]
    fn test_detect_mode() {
        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("FastCli");
        assert_eq!(ExecutionMode::detect_at(&cli), ExecutionMode::Remote);
        std::fs::write(&cli, b"").unwrap();
        assert_eq!(ExecutionMode::detect_at(&cli), ExecutionMode::OnDevice);
    }
}
