//! Builder for session managers.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::SessionManager;
use crate::platform::PlatformDefinition;
use crate::transport::config::{AuthMethod, HostKeyVerification};

/// Builder for constructing a [`SessionManager`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tacbundle::session::SessionManager;
/// use tacbundle::transport::{HostKeyVerification, SshConnector};
///
/// let manager = SessionManager::builder(SshConnector::default())
///     .port(2222)
///     .private_key("/home/ops/.ssh/id_ed25519")
///     .timeout(Duration::from_secs(10))
///     .host_key_verification(HostKeyVerification::Strict)
///     .build();
/// ```
pub struct SessionManagerBuilder<C> {
    connector: C,
    port: u16,
    auth: AuthMethod,
    timeout: Duration,
    command_timeout: Duration,
    close_timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    platform: PlatformDefinition,
}

impl<C> SessionManagerBuilder<C> {
    pub(super) fn new(connector: C) -> Self {
        Self {
            connector,
            port: 22,
            auth: AuthMethod::Prompt,
            timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            close_timeout: Duration::from_secs(5),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            platform: PlatformDefinition::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Ask for the password when a session opens (the default).
    pub fn prompt_password(mut self) -> Self {
        self.auth = AuthMethod::Prompt;
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the authentication method directly.
    pub fn auth(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the default per-command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set how long closing may take before it is abandoned.
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Set a custom platform definition.
    pub fn platform(mut self, platform: PlatformDefinition) -> Self {
        self.platform = platform;
        self
    }

    /// Build the manager. No connection is made until a session is opened.
    pub fn build(self) -> SessionManager<C> {
        SessionManager {
            connector: self.connector,
            port: self.port,
            auth: self.auth,
            connect_timeout: self.timeout,
            command_timeout: self.command_timeout,
            close_timeout: self.close_timeout,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
            platform: self.platform,
        }
    }
}
