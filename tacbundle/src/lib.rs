//! # tacbundle
//!
//! Collect diagnostic support bundles from Arista EOS switches and deliver
//! them to a support case.
//!
//! A run connects to one device (over SSH, or through the local `FastCli`
//! when running on the switch), reads its software version, and picks a
//! collection procedure:
//!
//! - EOS at or above the configured threshold gets the single-command
//!   `send support-bundle`.
//! - Older releases get a sequence of archive steps tarred into one bundle.
//!
//! The newest matching artifact on flash is then located and either
//! downloaded, or pushed by the device itself with SCP or FTP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tacbundle::{
//!     Collector, CollectionJob, CollectorConfig, ExecutionMode, SessionManager,
//!     TransferRequest,
//! };
//! use tacbundle::input::PromptInput;
//! use tacbundle::transport::SshConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tacbundle::Error> {
//!     let config = CollectorConfig::default();
//!     let manager = SessionManager::builder(SshConnector::default())
//!         .prompt_password()
//!         .build();
//!
//!     let collector = Collector::new(manager, config, ExecutionMode::Remote);
//!     let mut job = CollectionJob::new(Some("123456"), "000000")?;
//!     let report = collector
//!         .collect(
//!             &mut job,
//!             "leaf1.lab",
//!             "admin",
//!             &TransferRequest::download(),
//!             &PromptInput,
//!             std::future::pending(),
//!         )
//!         .await?;
//!
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod decompress;
pub mod device;
pub mod error;
pub mod escape;
pub mod input;
pub mod job;
pub mod locator;
pub mod platform;
pub mod session;
pub mod strategy;
pub mod transfer;
pub mod transport;
pub mod version;

// Re-export main types for convenience
pub use config::CollectorConfig;
pub use device::{Device, ExecutionMode};
pub use error::{Error, ErrorKind, Result};
pub use job::{CollectionJob, Collector, JobReport, JobStatus};
pub use locator::{Artifact, ArtifactLocator};
pub use platform::PlatformDefinition;
pub use session::{CommandOutput, Session, SessionManager, TransportState};
pub use strategy::{CollectionContext, CollectionStrategy, Progress, Strategy};
pub use transfer::{Credentials, TransferKind, TransferOrchestrator, TransferOutcome, TransferRequest};
pub use transport::{AuthMethod, SshConfig};
pub use version::{StrategyKind, Version};
