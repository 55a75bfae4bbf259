//! Multi-step collection for releases without `send support-bundle`.
//!
//! Each step writes one compressed intermediate into flash, then a final
//! step tars them into `TAC-bundle-<case>-<host>-<ts>.tar` and deletes the
//! intermediates. Nothing is rolled back: when step k fails, the files of
//! steps 1..k-1 stay on flash and are named in the error.

use chrono::Utc;

use super::{CollectionContext, CollectionStrategy, Progress};
use crate::error::{Error, Result};
use crate::escape::{self, Layer};
use crate::locator::{Artifact, join_remote};
use crate::platform::FASTCLI_PATH;
use crate::session::Session;
use crate::transport::Transport;
use crate::version::StrategyKind;

/// What one legacy step collects.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    /// Output of a CLI command, gzipped.
    Cli(&'static str),
    /// A device directory, as a gzipped tarball.
    Directory(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StepTemplate {
    name: &'static str,
    description: &'static str,
    source: Source,
    suffix: &'static str,
}

const DEFAULT_STEPS: &[StepTemplate] = &[
    StepTemplate {
        name: "show-tech",
        description: "capturing show tech-support",
        source: Source::Cli("show tech-support"),
        suffix: "show-tech.log.gz",
    },
    StepTemplate {
        name: "agent-logs",
        description: "capturing agent logs",
        source: Source::Cli("show agent logs"),
        suffix: "agent-logs.log.gz",
    },
    StepTemplate {
        name: "var-log",
        description: "archiving /var/log",
        source: Source::Directory("/var/log"),
        suffix: "var-log.tar.gz",
    },
    StepTemplate {
        name: "var-core",
        description: "archiving /var/core",
        source: Source::Directory("/var/core"),
        suffix: "var-core.tar.gz",
    },
    StepTemplate {
        name: "scheduled-tech",
        description: "archiving scheduled tech-supports",
        source: Source::Directory("/mnt/flash/schedule/tech-support"),
        suffix: "scheduled-tech.tar.gz",
    },
];

/// One concrete step for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyStep {
    pub name: &'static str,
    pub description: &'static str,
    /// CLI line to send.
    pub command: String,
    /// File the step leaves on the device.
    pub output_file: String,
}

/// Ordered archive steps followed by aggregation.
#[derive(Debug, Clone)]
pub struct LegacyStrategy {
    steps: &'static [StepTemplate],
}

impl Default for LegacyStrategy {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
        }
    }
}

impl LegacyStrategy {
    /// Name of the aggregated bundle.
    pub fn bundle_name(ctx: &CollectionContext) -> String {
        format!(
            "TAC-bundle-{}-{}-{}.tar",
            ctx.case_id,
            ctx.host_label(),
            ctx.stamp()
        )
    }

    fn stem(ctx: &CollectionContext) -> String {
        format!("TAC-{}-{}-{}", ctx.case_id, ctx.host_label(), ctx.stamp())
    }

    /// `bash timeout <secs> sudo bash -c <script>` as a CLI line.
    fn bash_line(ctx: &CollectionContext, script: &str) -> Result<String> {
        let script = escape::escape(script, &[Layer::Shell])?;
        let line = format!(
            "bash timeout {} sudo bash -c {}",
            ctx.bundle_timeout.as_secs().max(1),
            script
        );
        Ok(escape::escape(&line, &[Layer::Cli])?)
    }

    /// The collection steps for this job, in order.
    pub fn steps(&self, ctx: &CollectionContext) -> Result<Vec<LegacyStep>> {
        let stem = Self::stem(ctx);
        self.steps
            .iter()
            .map(|template| {
                let filename = format!("{stem}-{}", template.suffix);
                let dest = escape::escape(&join_remote(&ctx.flash_dir, &filename), &[Layer::Shell])?;
                let script = match &template.source {
                    Source::Cli(cli) => {
                        let cli = escape::escape(cli, &[Layer::Shell])?;
                        // a failed command must not leave a valid-looking archive
                        format!(
                            "set -o pipefail; {FASTCLI_PATH} -p 15 -c {cli} | gzip > {dest} \
                             || {{ rm -f {dest}; exit 1; }}"
                        )
                    }
                    Source::Directory(dir) => {
                        let rel = escape::escape(dir.trim_start_matches('/'), &[Layer::Shell])?;
                        format!("tar --ignore-failed-read -czf {dest} -C / {rel}")
                    }
                };
                Ok(LegacyStep {
                    name: template.name,
                    description: template.description,
                    command: Self::bash_line(ctx, &script)?,
                    output_file: filename,
                })
            })
            .collect()
    }

    /// Tar the intermediates into the bundle, then delete them.
    pub fn aggregate_command(ctx: &CollectionContext, files: &[String]) -> Result<String> {
        let dir = escape::escape(&ctx.flash_dir, &[Layer::Shell])?;
        let bundle = escape::escape(&Self::bundle_name(ctx), &[Layer::Shell])?;
        let names = files
            .iter()
            .map(|f| escape::escape(f, &[Layer::Shell]))
            .collect::<std::result::Result<Vec<_>, _>>()?
            .join(" ");
        let script = format!("cd {dir} && tar -cf {bundle} {names} && rm -f {names}");
        Self::bash_line(ctx, &script)
    }
}

fn partial(step: &str, completed: &[String], ctx: &CollectionContext, source: Error) -> Error {
    if completed.is_empty() {
        return source;
    }
    Error::PartialCollection {
        step: step.to_string(),
        leftovers: completed
            .iter()
            .map(|f| join_remote(&ctx.flash_dir, f))
            .collect(),
        source: Box::new(source),
    }
}

impl CollectionStrategy for LegacyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Legacy
    }

    fn artifact_pattern(&self, ctx: &CollectionContext) -> String {
        format!("TAC-bundle-{}-{}-*.tar", ctx.case_id, ctx.host_label())
    }

    async fn run<T: Transport>(
        &self,
        session: &mut Session<T>,
        ctx: &CollectionContext,
        progress: &dyn Progress,
    ) -> Result<Artifact> {
        let steps = self.steps(ctx)?;
        let total = steps.len() + 1;
        let mut completed: Vec<String> = Vec::with_capacity(steps.len());

        for (i, step) in steps.iter().enumerate() {
            progress.step(i + 1, total, step.description);
            if let Err(e) = session
                .run_with_timeout(&step.command, ctx.command_limit())
                .await
            {
                return Err(partial(step.name, &completed, ctx, e));
            }
            completed.push(step.output_file.clone());
        }

        progress.step(total, total, "aggregating bundle");
        let command = Self::aggregate_command(ctx, &completed)?;
        if let Err(e) = session
            .run_with_timeout(&command, ctx.command_limit())
            .await
        {
            return Err(partial("aggregate", &completed, ctx, e));
        }

        let filename = Self::bundle_name(ctx);
        Ok(Artifact {
            remote_path: join_remote(&ctx.flash_dir, &filename),
            filename,
            discovered_at: Utc::now(),
        })
    }
}
