//! Transport layer: how commands reach the device.
//!
//! [`SshTransport`] drives a remote switch over russh. [`LocalTransport`]
//! runs on the switch itself and shells out to `FastCli`. Both implement
//! [`Transport`], so the session and everything above it never care which
//! one is underneath.

pub mod config;
mod local;
pub mod scp;
mod ssh;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::channel::{InteractiveEvent, InteractiveResult};
use crate::error::Result;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use local::{LocalConnector, LocalTransport};
pub use ssh::{SshConnector, SshTransport};

/// Raw result of one non-interactive command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,

    /// Standard error, lossily decoded.
    pub stderr: String,

    /// Exit status, when the far end reported one.
    pub exit_status: Option<u32>,
}

/// An established channel to one device.
pub trait Transport: Send {
    /// Run one command and wait for it to finish.
    fn exec(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ExecOutput>> + Send;

    /// Run a prompt-driven exchange in an interactive shell.
    fn interact(
        &mut self,
        events: &[InteractiveEvent],
        timeout: Duration,
    ) -> impl Future<Output = Result<InteractiveResult>> + Send;

    /// Copy a file from the device to `local_path`, returning the bytes written.
    fn download(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Release the connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Establishes [`Transport`]s.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Connect and authenticate.
    fn connect(&self, config: SshConfig) -> impl Future<Output = Result<Self::Transport>> + Send;
}
