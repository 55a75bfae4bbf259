//! Authenticated device sessions.
//!
//! A [`Session`] owns one [`Transport`] for the lifetime of a job. Commands
//! take `&mut Session`, so a session is never driven from two places at once.
//! [`SessionManager::scoped`] opens a session, runs a job body against it and
//! closes it on every exit path, including operator interrupts.
//!
//! ```rust,no_run
//! use tacbundle::input::StaticInput;
//! use tacbundle::session::SessionManager;
//! use tacbundle::transport::SshConnector;
//!
//! # async fn example() -> tacbundle::Result<()> {
//! let manager = SessionManager::builder(SshConnector::default())
//!     .password("admin")
//!     .build();
//!
//! let hostname = manager
//!     .scoped(
//!         "leaf1.lab",
//!         "admin",
//!         &StaticInput::new(),
//!         std::future::pending(),
//!         async |session| Ok(session.run("show hostname").await?.stdout),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod output;

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::channel::{InteractiveEvent, InteractiveResult};
use crate::error::{Error, Result, TransportError};
use crate::input::InputProvider;
use crate::platform::PlatformDefinition;
use crate::transport::{AuthMethod, Connector, HostKeyVerification, SshConfig, Transport};

pub use builder::SessionManagerBuilder;
pub use output::CommandOutput;

/// Lifecycle of a [`Session`]'s transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Establishing,
    Active,
    Closing,
    /// Terminal.
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Disconnected => "disconnected",
            TransportState::Establishing => "establishing",
            TransportState::Active => "active",
            TransportState::Closing => "closing",
            TransportState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One authenticated channel to one device.
pub struct Session<T> {
    target_host: String,
    username: String,
    state: TransportState,
    transport: Option<T>,
    opened_at: Option<DateTime<Utc>>,
    command_timeout: Duration,
    close_timeout: Duration,
    platform: PlatformDefinition,
}

impl<T: Transport> Session<T> {
    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransportState::Active
    }

    /// When the transport became active.
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Default timeout for commands.
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn platform(&self) -> &PlatformDefinition {
        &self.platform
    }

    fn transport(&mut self) -> Result<&mut T> {
        match (self.state, self.transport.as_mut()) {
            (TransportState::Active, Some(t)) => Ok(t),
            _ => Err(TransportError::NotConnected.into()),
        }
    }

    /// Execute a command with the default timeout.
    ///
    /// Failure markers and exit status are recorded but not turned into
    /// errors; see [`Session::run`] for that.
    pub async fn execute(&mut self, command: &str) -> Result<CommandOutput> {
        self.execute_with_timeout(command, self.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn execute_with_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!("{}: {}", self.target_host, command);
        let raw = self.transport()?.exec(command, timeout).await?;

        let stdout = raw.stdout.trim_end().to_string();
        let failure_message = self
            .platform
            .detect_failure(&stdout)
            .or_else(|| self.platform.detect_failure(&raw.stderr))
            .map(str::to_string);

        Ok(CommandOutput {
            command: command.to_string(),
            stdout,
            stderr: raw.stderr,
            exit_status: raw.exit_status,
            elapsed: start.elapsed(),
            failure_message,
        })
    }

    /// Execute a command and fail if the device reported an error.
    pub async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        self.run_with_timeout(command, self.command_timeout).await
    }

    /// Like [`Session::run`] with a custom timeout.
    pub async fn run_with_timeout(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let output = self.execute_with_timeout(command, timeout).await?;
        match output.failure_reason() {
            None => Ok(output),
            Some(message) => Err(Error::Command {
                command: output.command.clone(),
                message,
                output: output.combined(),
            }),
        }
    }

    /// Drive an interactive exchange with the default timeout.
    pub async fn interact(&mut self, events: &[InteractiveEvent]) -> Result<InteractiveResult> {
        self.interact_with_timeout(events, self.command_timeout)
            .await
    }

    /// Drive an interactive exchange, waiting up to `timeout` per step.
    pub async fn interact_with_timeout(
        &mut self,
        events: &[InteractiveEvent],
        timeout: Duration,
    ) -> Result<InteractiveResult> {
        debug!(
            "{}: interactive exchange of {} steps",
            self.target_host,
            events.len()
        );
        self.transport()?.interact(events, timeout).await
    }

    /// Copy a remote file to `local_path`.
    pub async fn download(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> Result<u64> {
        debug!(
            "{}: downloading {} to {}",
            self.target_host,
            remote_path,
            local_path.display()
        );
        self.transport()?
            .download(remote_path, local_path, timeout)
            .await
    }

    /// Close the session.
    ///
    /// Safe to call any number of times, including on a session that never
    /// opened. Failures are logged and swallowed.
    pub async fn close(&mut self) {
        if self.state == TransportState::Closed {
            return;
        }
        self.state = TransportState::Closing;

        if let Some(mut transport) = self.transport.take() {
            match tokio::time::timeout(self.close_timeout, transport.close()).await {
                Ok(Ok(())) => debug!("closed session to {}", self.target_host),
                Ok(Err(e)) => warn!("error closing session to {}: {}", self.target_host, e),
                Err(_) => warn!(
                    "closing session to {} timed out after {:?}",
                    self.target_host, self.close_timeout
                ),
            }
        }

        self.state = TransportState::Closed;
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target_host", &self.target_host)
            .field("username", &self.username)
            .field("state", &self.state)
            .field("opened_at", &self.opened_at)
            .finish()
    }
}

/// Opens and tears down [`Session`]s through a [`Connector`].
pub struct SessionManager<C> {
    connector: C,
    port: u16,
    auth: AuthMethod,
    connect_timeout: Duration,
    command_timeout: Duration,
    close_timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<std::path::PathBuf>,
    platform: PlatformDefinition,
}

impl<C: Connector> SessionManager<C> {
    /// Start building a manager around `connector`.
    pub fn builder(connector: C) -> SessionManagerBuilder<C> {
        SessionManagerBuilder::new(connector)
    }

    /// A new, disconnected session.
    pub fn session(&self, host: &str, username: &str) -> Session<C::Transport> {
        Session {
            target_host: host.to_string(),
            username: username.to_string(),
            state: TransportState::Disconnected,
            transport: None,
            opened_at: None,
            command_timeout: self.command_timeout,
            close_timeout: self.close_timeout,
            platform: self.platform.clone(),
        }
    }

    /// Make `session` active.
    ///
    /// An already active session is reused as is. `input` is asked for a
    /// password only when the configured method is [`AuthMethod::Prompt`].
    pub async fn open(
        &self,
        session: &mut Session<C::Transport>,
        input: &dyn InputProvider,
    ) -> Result<()> {
        match session.state {
            TransportState::Active => return Ok(()),
            TransportState::Closing | TransportState::Closed => {
                return Err(TransportError::Disconnected.into());
            }
            TransportState::Disconnected | TransportState::Establishing => {}
        }

        let auth = match &self.auth {
            AuthMethod::Prompt => AuthMethod::Password(input.secret(&format!(
                "Password for {}@{}",
                session.username, session.target_host
            ))?),
            other => other.duplicate(),
        };

        let config = SshConfig {
            host: session.target_host.clone(),
            port: self.port,
            username: session.username.clone(),
            auth,
            timeout: self.connect_timeout,
            terminal_width: self.platform.terminal_width,
            terminal_height: self.platform.terminal_height,
            host_key_verification: self.host_key_verification.clone(),
            known_hosts_path: self.known_hosts_path.clone(),
        };

        session.state = TransportState::Establishing;
        match self.connector.connect(config).await {
            Ok(transport) => {
                session.transport = Some(transport);
                session.state = TransportState::Active;
                session.opened_at = Some(Utc::now());
                info!(
                    "session to {}@{} established",
                    session.username, session.target_host
                );
                Ok(())
            }
            Err(e) => {
                session.state = TransportState::Disconnected;
                Err(e)
            }
        }
    }

    /// Open a session, run `body` against it, and close it.
    ///
    /// The session is closed exactly once whether `body` succeeds, fails, or
    /// `interrupt` completes first. An interrupt yields [`Error::Interrupted`].
    pub async fn scoped<R, F, I>(
        &self,
        host: &str,
        username: &str,
        input: &dyn InputProvider,
        interrupt: I,
        body: F,
    ) -> Result<R>
    where
        I: Future<Output = ()>,
        F: AsyncFnOnce(&mut Session<C::Transport>) -> Result<R>,
    {
        let mut session = self.session(host, username);

        let result = tokio::select! {
            result = async {
                self.open(&mut session, input).await?;
                body(&mut session).await
            } => result,
            () = interrupt => {
                warn!("interrupted; closing session to {}", host);
                Err(Error::Interrupted)
            }
        };

        session.close().await;
        result
    }
}

impl<C> fmt::Debug for SessionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("port", &self.port)
            .field("auth", &self.auth)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("platform", &self.platform.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::StaticInput;
    use crate::transport::ExecOutput;
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Counters {
        connects: AtomicUsize,
        closes: AtomicUsize,
        passwords: Mutex<Vec<String>>,
    }

    struct EchoTransport {
        counters: Arc<Counters>,
        fail_close: bool,
    }

    impl Transport for EchoTransport {
        async fn exec(&mut self, command: &str, _timeout: Duration) -> Result<ExecOutput> {
            let (stdout, exit_status) = match command {
                "bogus" => ("% Invalid input".to_string(), Some(0)),
                "false" => (String::new(), Some(1)),
                other => (format!("{other}\n"), Some(0)),
            };
            Ok(ExecOutput {
                stdout,
                stderr: String::new(),
                exit_status,
            })
        }

        async fn interact(
            &mut self,
            _events: &[InteractiveEvent],
            _timeout: Duration,
        ) -> Result<InteractiveResult> {
            Ok(InteractiveResult::new(vec![], Duration::ZERO))
        }

        async fn download(&mut self, _: &str, _: &Path, _: Duration) -> Result<u64> {
            Ok(0)
        }

        async fn close(&mut self) -> Result<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(TransportError::Disconnected.into());
            }
            Ok(())
        }
    }

    struct EchoConnector {
        counters: Arc<Counters>,
        refuse: bool,
        fail_close: bool,
    }

    impl Connector for EchoConnector {
        type Transport = EchoTransport;

        async fn connect(&self, config: SshConfig) -> Result<EchoTransport> {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            if let Some(p) = config.auth.password() {
                self.counters
                    .passwords
                    .lock()
                    .unwrap()
                    .push(p.expose_secret().to_string());
            }
            if self.refuse {
                return Err(TransportError::AuthenticationFailed {
                    user: config.username,
                }
                .into());
            }
            Ok(EchoTransport {
                counters: self.counters.clone(),
                fail_close: self.fail_close,
            })
        }
    }

    fn manager(refuse: bool, fail_close: bool) -> (SessionManager<EchoConnector>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let connector = EchoConnector {
            counters: counters.clone(),
            refuse,
            fail_close,
        };
        (
            SessionManager::builder(connector).prompt_password().build(),
            counters,
        )
    }

    #[tokio::test]
    async fn test_execute_requires_active_session() {
        let (manager, _) = manager(false, false);
        let mut session = manager.session("leaf1", "admin");
        let err = session.execute("show version").await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_open_reuses_and_prompts_once() {
        let (manager, counters) = manager(false, false);
        let input = StaticInput::new().with_password("hunter2");
        let mut session = manager.session("leaf1", "admin");

        manager.open(&mut session, &input).await.unwrap();
        manager.open(&mut session, &input).await.unwrap();

        assert!(session.is_active());
        assert!(session.opened_at().is_some());
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(*counters.passwords.lock().unwrap(), vec!["hunter2"]);

        let out = session.execute("show hostname").await.unwrap();
        assert_eq!(out.stdout, "show hostname");
        assert!(out.is_success());
    }

    #[tokio::test]
    async fn test_run_converts_failures() {
        let (manager, _) = manager(false, false);
        let mut session = manager.session("leaf1", "admin");
        manager
            .open(&mut session, &StaticInput::new().with_password("x"))
            .await
            .unwrap();

        let err = session.run("bogus").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Command);
        assert!(err.to_string().contains("% Invalid input"));

        let err = session.run("false").await.unwrap_err();
        assert!(err.to_string().contains("exit status 1"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (manager, counters) = manager(false, true);
        let mut session = manager.session("leaf1", "admin");
        manager
            .open(&mut session, &StaticInput::new().with_password("x"))
            .await
            .unwrap();

        session.close().await;
        session.close().await;

        assert_eq!(session.state(), TransportState::Closed);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert!(session.execute("show version").await.is_err());
        assert!(manager
            .open(&mut session, &StaticInput::new().with_password("x"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_close_after_failed_open() {
        let (manager, counters) = manager(true, false);
        let mut session = manager.session("leaf1", "admin");
        let err = manager
            .open(&mut session, &StaticInput::new().with_password("bad"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Authentication);
        assert_eq!(session.state(), TransportState::Disconnected);

        session.close().await;
        session.close().await;
        assert_eq!(session.state(), TransportState::Closed);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scoped_closes_on_error_and_interrupt() {
        let (manager, counters) = manager(false, false);
        let input = StaticInput::new().with_password("x");

        let err = manager
            .scoped(
                "leaf1",
                "admin",
                &input,
                std::future::pending(),
                async |s: &mut Session<EchoTransport>| s.run("bogus").await.map(|_| ()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Command);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        let err = manager
            .scoped(
                "leaf1",
                "admin",
                &input,
                tokio::time::sleep(Duration::from_millis(20)),
                async |_s: &mut Session<EchoTransport>| {
                    std::future::pending::<()>().await;
                    Ok(())
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 2);
    }
}
