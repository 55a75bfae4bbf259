//! Collector configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! version_threshold = "4.26.1F"
//! placeholder_case_id = "000000"
//! local_dir = "./bundles"
//! extract = true
//!
//! [timeouts]
//! command_secs = 60
//! bundle_secs = 1800
//!
//! [ssh]
//! host_key_verification = "strict"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::platform::FLASH_DIR;
use crate::transport::HostKeyVerification;
use crate::version::Version;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectorConfig {
    /// Devices at or above this version use the single-command bundle.
    pub version_threshold: String,

    /// Case id used when the operator gives none.
    pub placeholder_case_id: String,

    /// Device directory where artifacts are written.
    pub flash_dir: String,

    /// Local directory downloads land in.
    pub local_dir: PathBuf,

    /// Extract downloaded archives.
    pub extract: bool,

    pub timeouts: Timeouts,
    pub locator: LocatorConfig,
    pub ftp: FtpConfig,
    pub ssh: SshSettings,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            version_threshold: "4.26.1F".into(),
            placeholder_case_id: "000000".into(),
            flash_dir: FLASH_DIR.into(),
            local_dir: PathBuf::from("."),
            extract: false,
            timeouts: Timeouts::default(),
            locator: LocatorConfig::default(),
            ftp: FtpConfig::default(),
            ssh: SshSettings::default(),
        }
    }
}

impl CollectorConfig {
    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        self.threshold()?;
        if self.placeholder_case_id.trim().is_empty() {
            return Err(Error::config("placeholder_case_id must not be empty"));
        }
        if !self.flash_dir.starts_with('/') {
            return Err(Error::config(format!(
                "flash_dir must be absolute, got '{}'",
                self.flash_dir
            )));
        }
        if self.locator.attempts == 0 {
            return Err(Error::config("locator.attempts must be at least 1"));
        }
        Ok(())
    }

    /// The parsed version threshold.
    pub fn threshold(&self) -> Result<Version> {
        Version::parse(&self.version_threshold).map_err(|e| {
            Error::config(format!(
                "invalid version_threshold '{}': {}",
                self.version_threshold, e
            ))
        })
    }
}

/// Timeouts, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub connect_secs: u64,
    pub command_secs: u64,
    /// Limit for a single bundle-producing command.
    pub bundle_secs: u64,
    pub transfer_secs: u64,
    pub close_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            command_secs: 60,
            bundle_secs: 1800,
            transfer_secs: 3600,
            close_secs: 5,
        }
    }
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    pub fn bundle(&self) -> Duration {
        Duration::from_secs(self.bundle_secs)
    }

    pub fn transfer(&self) -> Duration {
        Duration::from_secs(self.transfer_secs)
    }

    pub fn close(&self) -> Duration {
        Duration::from_secs(self.close_secs)
    }
}

/// How long to wait for a finished artifact to show up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorConfig {
    pub attempts: u32,
    pub interval_secs: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_secs: 2,
        }
    }
}

/// Defaults for uploads to the vendor FTP drop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FtpConfig {
    pub host: String,
    pub username: String,
    /// `{case}` is replaced by the case id.
    pub directory: String,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: "ftp.arista.com".into(),
            username: "anonymous".into(),
            directory: "/support/{case}/".into(),
        }
    }
}

impl FtpConfig {
    /// The upload directory for `case_id`.
    pub fn directory_for(&self, case_id: &str) -> String {
        self.directory.replace("{case}", case_id)
    }
}

/// SSH connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSettings {
    pub port: u16,
    pub host_key_verification: HostKeyVerification,
    pub known_hosts: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: 22,
            host_key_verification: HostKeyVerification::AcceptNew,
            known_hosts: None,
        }
    }
}
