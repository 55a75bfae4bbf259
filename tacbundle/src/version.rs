//! Software version parsing and comparison.
//!
//! EOS reports its release as a dot-separated numeric version with a
//! trailing train letter (`4.30.3M`, `4.26.1F`, `4.21.1.1F`). Releases are
//! compared component by component, numerically, so `4.30.3` sorts after
//! `4.9.1`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, ParseError, Result};

static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*software\s+image\s+version\s*:\s*(\S+)").expect("valid version regex")
});

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)([A-Za-z][A-Za-z0-9]*)?(?:[-+].*)?$").expect("valid token regex")
});

/// A parsed software version.
///
/// Equality and ordering ignore trailing zero components (`4.21` equals
/// `4.21.0`) so that the ordering is total and consistent with `Eq`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    numbers: Vec<u64>,
    suffix: String,
}

impl Version {
    /// Parse a bare version token such as `4.26.1F`.
    pub fn parse(token: &str) -> std::result::Result<Self, ParseError> {
        let caps = TOKEN
            .captures(token.trim())
            .ok_or_else(|| ParseError::MalformedVersion(token.to_string()))?;

        let numbers = caps[1]
            .split('.')
            .map(|n| n.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ParseError::MalformedVersion(token.to_string()))?;

        let suffix = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();

        Ok(Self {
            raw: token.trim().to_string(),
            numbers,
            suffix,
        })
    }

    /// Extract the version from a free-form `show version` report.
    pub fn from_report(report: &str) -> std::result::Result<Self, ParseError> {
        let token = VERSION_LINE
            .captures(report)
            .and_then(|c| c.get(1))
            .ok_or(ParseError::MissingVersion)?;
        Self::parse(token.as_str())
    }

    /// The token as reported by the device.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric components.
    pub fn numbers(&self) -> &[u64] {
        &self.numbers
    }

    /// Alphabetic train suffix, empty if none.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    fn compare_numbers(&self, other: &Self) -> Ordering {
        let len = self.numbers.len().max(other.numbers.len());
        for i in 0..len {
            let a = self.numbers.get(i).copied().unwrap_or(0);
            let b = other.numbers.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_numbers(other)
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Which collection procedure a device gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// One `send support-bundle` command.
    Modern,
    /// Several archive steps followed by aggregation.
    Legacy,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Modern => f.write_str("modern"),
            StrategyKind::Legacy => f.write_str("legacy"),
        }
    }
}

/// Compare two version tokens.
pub fn compare(a: &str, b: &str) -> std::result::Result<Ordering, ParseError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}

/// Pick a strategy: Modern when the device is at or above `threshold`.
pub fn decide(device: &Version, threshold: &Version) -> StrategyKind {
    if device.cmp(threshold) == Ordering::Less {
        StrategyKind::Legacy
    } else {
        StrategyKind::Modern
    }
}

/// Parse a version report and pick a strategy.
///
/// An unparseable report is a configuration error: there is no safe
/// default between the two procedures.
pub fn decide_from_report(report: &str, threshold: &Version) -> Result<(Version, StrategyKind)> {
    let version = Version::from_report(report).map_err(|e| {
        Error::config(format!("cannot determine device software version: {e}"))
    })?;
    let kind = decide(&version, threshold);
    Ok((version, kind))
}
