//! Error types for tacbundle.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for tacbundle operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH or local transport errors (authentication, connectivity, timeouts).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Unexpected or unstructured command output.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A remote command completed but reported failure.
    #[error("Command '{command}' failed: {message}\n{output}")]
    Command {
        command: String,
        message: String,
        output: String,
    },

    /// Collection reported success but nothing matching was found on the device.
    #[error(
        "No artifact matching '{pattern}' found in {directory}; check the device manually before re-running collection"
    )]
    ArtifactNotFound { directory: String, pattern: String },

    /// A legacy collection step failed after earlier steps left files behind.
    #[error(
        "Collection step '{step}' failed; intermediate files left on the device need manual cleanup: {}",
        .leftovers.join(", ")
    )]
    PartialCollection {
        step: String,
        leftovers: Vec<String>,
        #[source]
        source: Box<Error>,
    },

    /// Artifact transfer errors.
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Invalid or missing configuration.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A raw value that cannot be safely embedded in a command.
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The operator interrupted the run.
    #[error("Interrupted by operator")]
    Interrupted,

    /// Local filesystem errors.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of an [`Error`], used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Connectivity,
    Timeout,
    Parse,
    Command,
    ArtifactNotFound,
    Transfer,
    Configuration,
    Encoding,
    Interrupted,
    Io,
}

impl Error {
    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Build an I/O error annotated with the path involved.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(e) => e.kind(),
            Error::Parse(_) => ErrorKind::Parse,
            Error::Command { .. } => ErrorKind::Command,
            Error::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            Error::PartialCollection { source, .. } => source.kind(),
            Error::Transfer(_) => ErrorKind::Transfer,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Encoding(_) => ErrorKind::Encoding,
            Error::Interrupted => ErrorKind::Interrupted,
            Error::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Transport layer errors (SSH connection, authentication, channels).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Session is not open
    #[error("Session not connected - call open() first")]
    NotConnected,

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Failed to open a channel on the connection
    #[error("Failed to open {0} channel")]
    ChannelOpenFailed(&'static str),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify this transport error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::AuthenticationFailed { .. } | TransportError::Key(_) => {
                ErrorKind::Authentication
            }
            TransportError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Connectivity,
        }
    }
}

/// Output parsing errors.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The version report did not contain a recognizable version token
    #[error("No software version found in version report")]
    MissingVersion,

    /// A version token is not dot-numeric with an optional suffix
    #[error("Malformed version token '{0}'")]
    MalformedVersion(String),

    /// A bundle command did not name the file it produced
    #[error("No bundle filename in command acknowledgement: {output}")]
    MissingFilename { output: String },

    /// A remote file listing line could not be understood
    #[error("Unexpected listing line '{0}'")]
    Listing(String),

    /// An SCP protocol line could not be understood
    #[error("Unexpected SCP header '{0}'")]
    ScpHeader(String),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] glob::PatternError),
}

/// Artifact transfer errors.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The device reported a failure while pushing the artifact
    #[error("{protocol} upload of {filename} failed: {message}\n{output}")]
    Rejected {
        protocol: &'static str,
        filename: String,
        message: String,
        output: String,
    },

    /// The remote end aborted a secure-copy download
    #[error("Secure copy of {path} failed: {message}")]
    ScpRemote { path: String, message: String },

    /// A secure-copy download ended before the announced size was received
    #[error("Secure copy of {path} truncated: expected {expected} bytes, got {received}")]
    Truncated {
        path: String,
        expected: u64,
        received: u64,
    },

    /// A local file already exists at the download destination
    #[error("Refusing to overwrite existing local file {0}")]
    DestinationExists(PathBuf),
}

/// Raised when a raw value cannot be represented safely in a quoting layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot encode {character:?} at byte {position} for the {layer} layer")]
pub struct EncodingError {
    pub layer: &'static str,
    pub character: char,
    pub position: usize,
}

/// Result type alias using tacbundle's Error.
pub type Result<T> = std::result::Result<T, Error>;
