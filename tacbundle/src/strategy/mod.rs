//! Collection strategies.
//!
//! Newer EOS releases build a support bundle with a single command. Older
//! ones need the pieces archived one by one and tarred together. Which one a
//! device gets is decided by [`crate::version::decide`].

mod legacy;
mod modern;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;

use crate::device::Device;
use crate::error::Result;
use crate::locator::Artifact;
use crate::session::Session;
use crate::transport::Transport;
use crate::version::StrategyKind;

pub use legacy::{LegacyStep, LegacyStrategy};
pub use modern::{ModernStrategy, parse_acknowledgement};

/// Everything a strategy needs to know about the job.
#[derive(Debug, Clone)]
pub struct CollectionContext {
    pub case_id: String,
    pub device: Device,
    /// Device directory artifacts are written to.
    pub flash_dir: String,
    /// Stamped into generated file names.
    pub timestamp: DateTime<Utc>,
    /// Limit for each bundle-producing command.
    pub bundle_timeout: Duration,
}

impl CollectionContext {
    /// Timestamp as it appears in file names.
    pub fn stamp(&self) -> String {
        self.timestamp.format("%Y%m%d-%H%M%S").to_string()
    }

    /// Device identifier reduced to characters safe in a file name.
    pub fn host_label(&self) -> String {
        let label: String = self
            .device
            .identifier
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if label.is_empty() { "device".into() } else { label }
    }

    /// Transport-side limit for a command that runs under a remote `timeout`.
    pub(crate) fn command_limit(&self) -> Duration {
        self.bundle_timeout + Duration::from_secs(30)
    }
}

/// Receives step-by-step progress. Display only.
pub trait Progress: Send + Sync {
    /// Step `index` of `total` is starting.
    fn step(&self, index: usize, total: usize, description: &str);

    /// Free-form status line.
    fn note(&self, _message: &str) {}
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn step(&self, index: usize, total: usize, description: &str) {
        info!("[{index}/{total}] {description}");
    }

    fn note(&self, message: &str) {
        info!("{message}");
    }
}

/// A way of producing a collection artifact on the device.
pub trait CollectionStrategy {
    fn kind(&self) -> StrategyKind;

    /// Glob for the artifact's file name; always embeds the case id.
    fn artifact_pattern(&self, ctx: &CollectionContext) -> String;

    /// Drive the device until the artifact exists.
    fn run<T: Transport>(
        &self,
        session: &mut Session<T>,
        ctx: &CollectionContext,
        progress: &dyn Progress,
    ) -> impl Future<Output = Result<Artifact>>;
}

/// Either strategy, chosen at runtime.
#[derive(Debug, Clone)]
pub enum Strategy {
    Modern(ModernStrategy),
    Legacy(LegacyStrategy),
}

impl Strategy {
    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Modern => Strategy::Modern(ModernStrategy),
            StrategyKind::Legacy => Strategy::Legacy(LegacyStrategy::default()),
        }
    }
}

impl CollectionStrategy for Strategy {
    fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Modern(s) => s.kind(),
            Strategy::Legacy(s) => s.kind(),
        }
    }

    fn artifact_pattern(&self, ctx: &CollectionContext) -> String {
        match self {
            Strategy::Modern(s) => s.artifact_pattern(ctx),
            Strategy::Legacy(s) => s.artifact_pattern(ctx),
        }
    }

    async fn run<T: Transport>(
        &self,
        session: &mut Session<T>,
        ctx: &CollectionContext,
        progress: &dyn Progress,
    ) -> Result<Artifact> {
        match self {
            Strategy::Modern(s) => s.run(session, ctx, progress).await,
            Strategy::Legacy(s) => s.run(session, ctx, progress).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::device::ExecutionMode;
    use crate::version::Version;
    use chrono::TimeZone;

    pub(crate) fn context(identifier: &str) -> CollectionContext {
        CollectionContext {
            case_id: "123456".into(),
            device: Device {
                identifier: identifier.into(),
                version: Version::parse("4.18.0F").unwrap(),
                execution_mode: ExecutionMode::Remote,
            },
            flash_dir: "/mnt/flash".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            bundle_timeout: Duration::from_secs(600),
        }
    }

    #[test]
    fn test_stamp_and_label() {
        let ctx = context("leaf1.dc1");
        assert_eq!(ctx.stamp(), "20240309-140507");
        assert_eq!(ctx.host_label(), "leaf1.dc1");
        assert_eq!(context("sw 1/a'b").host_label(), "sw_1_a_b");
        assert_eq!(context("").host_label(), "device");
    }

    #[test]
    fn test_for_kind() {
        let ctx = context("leaf1");
        let modern = Strategy::for_kind(StrategyKind::Modern);
        assert_eq!(modern.kind(), StrategyKind::Modern);
        assert_eq!(modern.artifact_pattern(&ctx), "support-bundle-SR123456-*.zip");

        let legacy = Strategy::for_kind(StrategyKind::Legacy);
        assert_eq!(legacy.kind(), StrategyKind::Legacy);
        assert_eq!(legacy.artifact_pattern(&ctx), "TAC-bundle-123456-leaf1-*.tar");
    }
}
