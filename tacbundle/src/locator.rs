//! Finding the artifact a collection produced.
//!
//! Bundle commands report success in free text and some of them name no
//! file at all, so the file is found afterwards by listing the remote
//! directory and taking the newest entry that matches the job's pattern.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::error::{Error, ParseError, Result};
use crate::escape::{self, Layer};
use crate::session::Session;
use crate::transport::Transport;

/// Upper bound for the remote `find`, in seconds.
const LIST_TIMEOUT_SECS: u64 = 30;

/// A file produced on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Absolute path on the device.
    pub remote_path: String,
    pub filename: String,
    pub discovered_at: DateTime<Utc>,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.remote_path)
    }
}

/// One line of a remote listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    /// Modification time, seconds since the epoch.
    pub modified: f64,
    pub filename: String,
}

/// Polls a remote directory for the newest file matching a glob.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    attempts: u32,
    interval: Duration,
}

impl Default for ArtifactLocator {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

impl ArtifactLocator {
    /// List up to `attempts` times, `interval` apart.
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
        }
    }

    /// Find the newest file in `remote_dir` whose name matches `pattern`.
    pub async fn find<T: Transport>(
        &self,
        session: &mut Session<T>,
        remote_dir: &str,
        pattern: &str,
    ) -> Result<Artifact> {
        let glob = glob::Pattern::new(pattern).map_err(ParseError::from)?;
        let command = listing_command(remote_dir, pattern)?;
        let timeout = session
            .command_timeout()
            .max(Duration::from_secs(LIST_TIMEOUT_SECS + 5));

        for attempt in 1..=self.attempts {
            let listing = session.run_with_timeout(&command, timeout).await?;
            let entries = parse_listing(&listing.stdout)?;

            if let Some(entry) = select_newest(&entries, &glob) {
                let artifact = Artifact {
                    remote_path: join_remote(remote_dir, &entry.filename),
                    filename: entry.filename.clone(),
                    discovered_at: Utc::now(),
                };
                info!("located {}", artifact.remote_path);
                return Ok(artifact);
            }

            if attempt < self.attempts {
                debug!(
                    "no match for {} in {} (attempt {}/{}), retrying in {:?}",
                    pattern, remote_dir, attempt, self.attempts, self.interval
                );
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(Error::ArtifactNotFound {
            directory: remote_dir.to_string(),
            pattern: pattern.to_string(),
        })
    }
}

/// The CLI command that lists `remote_dir` as `<mtime> <name>` lines.
pub fn listing_command(remote_dir: &str, pattern: &str) -> Result<String> {
    let dir = escape::escape(remote_dir, &[Layer::Shell])?;
    let name = escape::escape(pattern, &[Layer::Shell])?;
    let line = format!(
        "bash timeout {LIST_TIMEOUT_SECS} find {dir} -maxdepth 1 -type f -name {name} -printf '%T@ %f\\n'"
    );
    Ok(escape::escape(&line, &[Layer::Cli])?)
}

/// Parse `<mtime> <name>` lines. Blank lines are ignored.
pub fn parse_listing(text: &str) -> std::result::Result<Vec<ListingEntry>, ParseError> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (modified, filename) = line
                .trim_start()
                .split_once(' ')
                .ok_or_else(|| ParseError::Listing(line.to_string()))?;
            let modified = modified
                .parse::<f64>()
                .ok()
                .filter(|m| m.is_finite())
                .ok_or_else(|| ParseError::Listing(line.to_string()))?;
            if filename.is_empty() {
                return Err(ParseError::Listing(line.to_string()));
            }
            Ok(ListingEntry {
                modified,
                filename: filename.to_string(),
            })
        })
        .collect()
}

/// Newest matching entry; equal times go to the greatest filename.
pub fn select_newest<'a>(
    entries: &'a [ListingEntry],
    pattern: &glob::Pattern,
) -> Option<&'a ListingEntry> {
    entries
        .iter()
        .filter(|e| pattern.matches(&e.filename))
        .max_by(|a, b| {
            a.modified
                .total_cmp(&b.modified)
                .then_with(|| a.filename.cmp(&b.filename))
        })
}

pub(crate) fn join_remote(dir: &str, name: &str) -> String {
    match dir.trim_end_matches('/') {
        "" => format!("/{name}"),
        dir => format!("{dir}/{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(modified: f64, filename: &str) -> ListingEntry {
        ListingEntry {
            modified,
            filename: filename.into(),
        }
    }

    #[test]
    fn test_listing_command_quotes_pattern() {
        let cmd = listing_command("/mnt/flash", "support-bundle-SR123456-*.zip").unwrap();
        assert_eq!(
            cmd,
            "bash timeout 30 find /mnt/flash -maxdepth 1 -type f \
             -name 'support-bundle-SR123456-*.zip' -printf '%T@ %f\\n'"
        );
        assert!(listing_command("/mnt/flash", "a\nb").is_err());
    }

    #[test]
    fn test_parse_listing() {
        let entries = parse_listing(
            "1700000000.5000000000 TAC-bundle-1-leaf1-a.tar\n\n1700000100.0 TAC-bundle-1-leaf1-b.tar\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].filename, "TAC-bundle-1-leaf1-b.tar");

        assert!(parse_listing("find: '/mnt/nope': No such file or directory").is_err());
        assert!(parse_listing("1700000000").is_err());
        assert!(parse_listing("").unwrap().is_empty());
    }

    #[test]
    fn test_select_newest_by_mtime() {
        let pattern = glob::Pattern::new("support-bundle-SR42-*.zip").unwrap();
        let entries = vec![
            entry(100.0, "support-bundle-SR42-2024-01-01.zip"),
            entry(300.0, "support-bundle-SR42-2024-01-03.zip"),
            entry(200.0, "support-bundle-SR42-2024-01-02.zip"),
            entry(999.0, "support-bundle-SR7-2024-01-09.zip"),
        ];
        let newest = select_newest(&entries, &pattern).unwrap();
        assert_eq!(newest.filename, "support-bundle-SR42-2024-01-03.zip");
    }

    #[test]
    fn test_select_newest_tie_breaks_on_name() {
        let pattern = glob::Pattern::new("TAC-bundle-*").unwrap();
        let entries = vec![
            entry(100.0, "TAC-bundle-a.tar"),
            entry(100.0, "TAC-bundle-c.tar"),
            entry(100.0, "TAC-bundle-b.tar"),
        ];
        assert_eq!(
            select_newest(&entries, &pattern).unwrap().filename,
            "TAC-bundle-c.tar"
        );
        assert!(select_newest(&[], &pattern).is_none());
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/mnt/flash/", "a.zip"), "/mnt/flash/a.zip");
        assert_eq!(join_remote("/mnt/flash", "a.zip"), "/mnt/flash/a.zip");
        assert_eq!(join_remote("/", "a.zip"), "/a.zip");
    }
}
