//! Single-command support bundle.

use std::sync::LazyLock;

use chrono::Utc;
use log::{debug, warn};
use regex::Regex;

use super::{CollectionContext, CollectionStrategy, Progress};
use crate::error::{ParseError, Result};
use crate::escape::{self, Layer};
use crate::locator::{Artifact, join_remote};
use crate::session::Session;
use crate::transport::Transport;
use crate::version::StrategyKind;

// Only the name format EOS prints today is accepted. Firmware that words the
// acknowledgement differently fails with a parse error instead of a guess.
static BUNDLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"support-bundle-[A-Za-z0-9._\-]+\.zip").expect("static bundle pattern compiles")
});

/// `send support-bundle flash: case-number <case>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModernStrategy;

impl ModernStrategy {
    fn command(ctx: &CollectionContext) -> Result<String> {
        let line = format!("send support-bundle flash: case-number {}", ctx.case_id);
        Ok(escape::escape(&line, &[Layer::Cli])?)
    }
}

/// Pull the generated file name out of the bundle command's acknowledgement.
pub fn parse_acknowledgement(output: &str) -> std::result::Result<String, ParseError> {
    BUNDLE_NAME
        .find(output)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ParseError::MissingFilename {
            output: output.to_string(),
        })
}

impl CollectionStrategy for ModernStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Modern
    }

    fn artifact_pattern(&self, ctx: &CollectionContext) -> String {
        format!("support-bundle-SR{}-*.zip", ctx.case_id)
    }

    async fn run<T: Transport>(
        &self,
        session: &mut Session<T>,
        ctx: &CollectionContext,
        progress: &dyn Progress,
    ) -> Result<Artifact> {
        let command = Self::command(ctx)?;
        progress.step(1, 1, "generating support bundle");

        let output = session
            .run_with_timeout(&command, ctx.command_limit())
            .await?;
        debug!("support-bundle acknowledgement: {}", output.stdout);

        let filename = parse_acknowledgement(&output.combined())?;
        if !filename.contains(&format!("SR{}", ctx.case_id)) {
            warn!(
                "bundle {} does not carry case number {}",
                filename, ctx.case_id
            );
        }
        progress.note(&format!("device reported {filename}"));

        Ok(Artifact {
            remote_path: join_remote(&ctx.flash_dir, &filename),
            filename,
            discovered_at: Utc::now(),
        })
    }
}
