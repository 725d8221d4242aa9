use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    Empty,
    InvalidFormat(String),
    ParseError(String),
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::Empty => write!(f, "Empty version string"),
            VersionError::InvalidFormat(s) => write!(f, "Invalid version format: '{}'", s),
            VersionError::ParseError(msg) => write!(f, "Version parse error: {}", msg),
        }
    }
}

impl std::error::Error for VersionError {}

/// Plugin ABI version negotiated between host and plugin.
///
/// Only the major component decides compatibility; the minor component is
/// kept for display and for feature probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// True when `self` was built against a newer major ABI than `host`.
    pub fn is_newer_major_than(&self, host: &ApiVersion) -> bool {
        self.major > host.major
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| VersionError::InvalidFormat(s.to_string()))?;
        let parse_part = |part: &str| -> Result<u32, VersionError> {
            part.parse::<u32>().map_err(|e| VersionError::ParseError(e.to_string()))
        };
        Ok(Self::new(parse_part(major)?, parse_part(minor)?))
    }
}

/// A plugin version.
///
/// Older plugins only report a `(major, minor)` integer pair, newer ones a
/// full semantic version string. Both end up here so they share one total
/// order: numeric triple first, then a release sorts above any of its
/// pre-releases, and two pre-release tags compare lexically. Build metadata
/// is carried for display but never takes part in comparisons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: String,
    pub build: String,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch, ..Self::default() }
    }

    /// Version used for blacklist matching when a plugin's version is unusable.
    pub fn lowest() -> Self {
        Self::default()
    }

    /// Builds `major.minor.0` from the legacy integer pair. Negative values,
    /// which some old plugins report, are clamped to zero.
    pub fn from_legacy(major: i32, minor: i32) -> Self {
        Self::new(major.max(0) as u64, minor.max(0) as u64, 0)
    }

    /// Parses `1`, `1.2`, `1.2.3`, `v1.2.3-beta.1+build5` and the like.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let (without_build, build) = match trimmed.split_once('+') {
            Some((head, build)) => (head, Some(build)),
            None => (trimmed, None),
        };
        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty()
            || parts.len() > 3
            || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(VersionError::InvalidFormat(input.to_string()));
        }

        // semver insists on three components; pad the short forms.
        let mut normalized = parts.join(".");
        for _ in parts.len()..3 {
            normalized.push_str(".0");
        }
        if let Some(pre) = pre {
            normalized.push('-');
            normalized.push_str(pre);
        }
        if let Some(build) = build {
            normalized.push('+');
            normalized.push_str(build);
        }

        let parsed = Version::parse(&normalized)
            .map_err(|e| VersionError::ParseError(format!("'{}': {}", input, e)))?;
        Ok(Self {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            pre_release: parsed.pre.as_str().to_string(),
            build: parsed.build.as_str().to_string(),
        })
    }

    pub fn major_minor(&self) -> (u64, u64) {
        (self.major, self.minor)
    }

    pub fn is_pre_release(&self) -> bool {
        !self.pre_release.is_empty()
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticVersion::parse(s)
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre_release.cmp(&other.pre_release),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre_release.is_empty() {
            write!(f, "-{}", self.pre_release)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}
