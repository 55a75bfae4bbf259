//! One collection run, from connecting to delivering the bundle.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use chrono::Utc;
use log::{info, warn};

use crate::config::CollectorConfig;
use crate::decompress;
use crate::device::{Device, ExecutionMode};
use crate::error::{Error, Result};
use crate::input::InputProvider;
use crate::locator::{Artifact, ArtifactLocator};
use crate::session::SessionManager;
use crate::strategy::{CollectionContext, CollectionStrategy, LogProgress, Progress, Strategy};
use crate::transfer::{TransferOrchestrator, TransferOutcome, TransferRequest};
use crate::transport::Connector;
use crate::version::{self, StrategyKind};

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Collecting,
    Located,
    Transferred,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Collecting => "collecting",
            JobStatus::Located => "located",
            JobStatus::Transferred => "transferred",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// State of one collection run.
#[derive(Debug, Clone)]
pub struct CollectionJob {
    case_id: String,
    device: Option<Device>,
    strategy: Option<StrategyKind>,
    artifact: Option<Artifact>,
    status: JobStatus,
}

impl CollectionJob {
    /// Start a job for `case_id`, or for `placeholder` when none is given.
    pub fn new(case_id: Option<&str>, placeholder: &str) -> Result<Self> {
        let case_id = match case_id.map(str::trim).filter(|c| !c.is_empty()) {
            Some(id) => id,
            None => {
                warn!("no case number given, using placeholder {}", placeholder);
                placeholder.trim()
            }
        };
        validate_case_id(case_id)?;
        Ok(Self {
            case_id: case_id.to_string(),
            device: None,
            strategy: None,
            artifact: None,
            status: JobStatus::Pending,
        })
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn strategy(&self) -> Option<StrategyKind> {
        self.strategy
    }

    /// The located artifact. Set once; transfers only happen after this.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }
}

/// Case ids end up in file names, URLs and CLI lines.
fn validate_case_id(case_id: &str) -> Result<()> {
    if case_id.is_empty()
        || !case_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::config(format!(
            "case id '{case_id}' may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

/// Summary of a finished job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub case_id: String,
    pub device: Device,
    pub strategy: StrategyKind,
    pub artifact: Artifact,
    pub outcome: TransferOutcome,
    /// Where the bundle was extracted, if it was.
    pub extracted: Option<PathBuf>,
    /// Why extraction failed. The download itself still stands.
    pub extraction_error: Option<String>,
}

/// Runs [`CollectionJob`]s against devices.
pub struct Collector<C> {
    manager: SessionManager<C>,
    config: CollectorConfig,
    mode: ExecutionMode,
    progress: Box<dyn Progress>,
}

impl<C: Connector> Collector<C> {
    pub fn new(manager: SessionManager<C>, config: CollectorConfig, mode: ExecutionMode) -> Self {
        Self {
            manager,
            config,
            mode,
            progress: Box::new(LogProgress),
        }
    }

    /// Send progress somewhere other than the log.
    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collect from `host` and deliver per `request`.
    ///
    /// A malformed `request` is rejected before connecting. The session is
    /// closed before this returns, on success, on error and when `interrupt`
    /// fires. Extraction happens afterwards, locally.
    pub async fn collect(
        &self,
        job: &mut CollectionJob,
        host: &str,
        username: &str,
        request: &TransferRequest,
        input: &dyn InputProvider,
        interrupt: impl Future<Output = ()>,
    ) -> Result<JobReport> {
        let threshold = self.config.threshold()?;
        let locator = ArtifactLocator::new(
            self.config.locator.attempts,
            std::time::Duration::from_secs(self.config.locator.interval_secs),
        );
        let orchestrator = TransferOrchestrator::new(
            self.config.local_dir.clone(),
            self.config.flash_dir.clone(),
            self.config.timeouts.transfer(),
        );
        if let Err(e) = orchestrator.validate(request) {
            job.status = JobStatus::Failed;
            return Err(e);
        }
        let progress = self.progress.as_ref();
        let mode = self.mode;
        let config = &self.config;

        let result = self
            .manager
            .scoped(host, username, input, interrupt, async |session| {
                let device = Device::discover(session, mode).await?;
                let kind = version::decide(&device.version, &threshold);
                info!(
                    "EOS {} is {} threshold {}: {} collection",
                    device.version,
                    if kind == StrategyKind::Modern { "at or above" } else { "below" },
                    threshold,
                    kind
                );
                job.device = Some(device.clone());
                job.strategy = Some(kind);
                job.status = JobStatus::Collecting;

                let ctx = CollectionContext {
                    case_id: job.case_id.clone(),
                    device,
                    flash_dir: config.flash_dir.clone(),
                    timestamp: Utc::now(),
                    bundle_timeout: config.timeouts.bundle(),
                };
                let strategy = Strategy::for_kind(kind);
                let produced = strategy.run(session, &ctx, progress).await?;

                let pattern = strategy.artifact_pattern(&ctx);
                let artifact = locator.find(session, &ctx.flash_dir, &pattern).await?;
                if artifact.filename != produced.filename {
                    warn!(
                        "newest match {} differs from reported {}",
                        artifact.filename, produced.filename
                    );
                }
                job.artifact = Some(artifact.clone());
                job.status = JobStatus::Located;

                let outcome = orchestrator.execute(session, &artifact, request).await?;
                job.status = JobStatus::Transferred;
                Ok((ctx.device, kind, artifact, outcome))
            })
            .await;

        let (device, strategy, artifact, outcome) = match result {
            Ok(done) => done,
            Err(e) => {
                job.status = JobStatus::Failed;
                return Err(e);
            }
        };

        let (extracted, extraction_error) = match (&outcome, self.config.extract) {
            (TransferOutcome::Downloaded { local_path, .. }, true) => {
                match decompress::extract(local_path, input) {
                    Ok(dir) => (dir, None),
                    Err(e) => {
                        warn!("{} was saved but not extracted: {e}", local_path.display());
                        (None, Some(e.to_string()))
                    }
                }
            }
            _ => (None, None),
        };

        Ok(JobReport {
            case_id: job.case_id.clone(),
            device,
            strategy,
            artifact,
            outcome,
            extracted,
            extraction_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_id_defaults_to_placeholder() {
        let job = CollectionJob::new(None, "000000").unwrap();
        assert_eq!(job.case_id(), "000000");
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.artifact().is_none());

        let job = CollectionJob::new(Some("   "), "0000").unwrap();
        assert_eq!(job.case_id(), "0000");

        let job = CollectionJob::new(Some(" 123456 "), "000000").unwrap();
        assert_eq!(job.case_id(), "123456");
    }

    #[test]
    fn test_case_id_rejects_metacharacters() {
        for bad in ["12 34", "1;reboot", "$(id)", "a/b", "x\n"] {
            let err = CollectionJob::new(Some(bad), "000000").unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Configuration, "{bad:?}");
        }
        assert!(CollectionJob::new(None, "").is_err());
    }
}
