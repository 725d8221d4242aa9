//! # Compatibility policy
//!
//! Decides whether a discovered plugin may be loaded, and collects the
//! warnings produced during a discovery pass so they can be shown once.
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::plugin_system::version::SemanticVersion;

/// One blacklist entry.
///
/// With `all_lower` the rule matches every version up to and including
/// `major.minor`; otherwise only that exact pair. Patch and pre-release parts
/// never take part in matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityRule {
    pub name: Cow<'static, str>,
    pub major: u32,
    pub minor: u32,
    pub hard: bool,
    pub all_lower: bool,
}

impl CompatibilityRule {
    pub const fn hard_all_lower(name: &'static str, major: u32, minor: u32) -> Self {
        Self { name: Cow::Borrowed(name), major, minor, hard: true, all_lower: true }
    }

    pub fn new(name: impl Into<Cow<'static, str>>, major: u32, minor: u32, hard: bool, all_lower: bool) -> Self {
        Self { name: name.into(), major, minor, hard, all_lower }
    }

    pub fn matches(&self, name: &str, version: &SemanticVersion) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        let threshold = (u64::from(self.major), u64::from(self.minor));
        if self.all_lower {
            version.major_minor() <= threshold
        } else {
            version.major_minor() == threshold
        }
    }
}

/// Plugins known to crash or misbehave with this host.
pub const BLACKLIST: &[CompatibilityRule] = &[
    CompatibilityRule::hard_all_lower("aisradar_pi", 0, 95),
    CompatibilityRule::hard_all_lower("radar_pi", 0, 95),
    CompatibilityRule::hard_all_lower("watchdog_pi", 1, 0),
    CompatibilityRule::hard_all_lower("squiddio_pi", 0, 2),
    CompatibilityRule::hard_all_lower("objsearch_pi", 0, 3),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Allow,
    AllowWithWarning,
    Reject,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Allow => "allow",
            Verdict::AllowWithWarning => "allow (with warning)",
            Verdict::Reject => "reject",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct CompatibilityPolicy {
    rules: Vec<CompatibilityRule>,
}

impl Default for CompatibilityPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CompatibilityPolicy {
    /// The compiled-in [`BLACKLIST`].
    pub fn builtin() -> Self {
        Self { rules: BLACKLIST.to_vec() }
    }

    pub fn with_rules(rules: Vec<CompatibilityRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CompatibilityRule] {
        &self.rules
    }

    pub fn evaluate(&self, name: &str, version: &SemanticVersion) -> Verdict {
        self.matching_rule(name, version)
            .map(Self::verdict_for)
            .unwrap_or(Verdict::Allow)
    }

    /// Evaluates every alias of one plugin (file name, common name) and keeps
    /// the strictest verdict.
    pub fn evaluate_any<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        version: &SemanticVersion,
    ) -> Verdict {
        names
            .into_iter()
            .map(|name| self.evaluate(name, version))
            .max_by_key(|verdict| match verdict {
                Verdict::Allow => 0,
                Verdict::AllowWithWarning => 1,
                Verdict::Reject => 2,
            })
            .unwrap_or(Verdict::Allow)
    }

    fn matching_rule(&self, name: &str, version: &SemanticVersion) -> Option<&CompatibilityRule> {
        self.rules.iter().find(|rule| rule.matches(name, version))
    }

    fn verdict_for(rule: &CompatibilityRule) -> Verdict {
        if rule.hard {
            Verdict::Reject
        } else {
            Verdict::AllowWithWarning
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportKind {
    OpenFailed,
    IncompatibleApi,
    Blacklisted { hard: bool },
    MalformedVersion,
    InitFailed,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::OpenFailed => write!(f, "open failed"),
            ReportKind::IncompatibleApi => write!(f, "incompatible API"),
            ReportKind::Blacklisted { hard: true } => write!(f, "blacklisted"),
            ReportKind::Blacklisted { hard: false } => write!(f, "blacklisted (warning)"),
            ReportKind::MalformedVersion => write!(f, "malformed version"),
            ReportKind::InitFailed => write!(f, "init failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub file: PathBuf,
    pub name: String,
    pub kind: ReportKind,
    pub message: String,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}: {}", self.name, self.file.display(), self.kind, self.message)
    }
}

/// Consolidated result of [`DeferredReport::flush`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub entries: Vec<ReportEntry>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, kind: ReportKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}

/// Warnings accumulated while scanning, shown to the user once afterwards.
#[derive(Debug, Clone)]
pub struct DeferredReport {
    entries: Vec<ReportEntry>,
    dialog_enabled: bool,
}

impl Default for DeferredReport {
    fn default() -> Self {
        Self { entries: Vec::new(), dialog_enabled: true }
    }
}

impl DeferredReport {
    pub fn new(dialog_enabled: bool) -> Self {
        Self { entries: Vec::new(), dialog_enabled }
    }

    pub fn set_dialog_enabled(&mut self, enabled: bool) {
        self.dialog_enabled = enabled;
    }

    pub fn push(&mut self, entry: ReportEntry) {
        log::warn!("Deferred plugin message: {}", entry);
        self.entries.push(entry);
    }

    pub fn record(&mut self, file: impl Into<PathBuf>, name: impl Into<String>, kind: ReportKind, message: impl Into<String>) {
        self.push(ReportEntry { file: file.into(), name: name.into(), kind, message: message.into() });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drains the pending entries. With the dialog disabled the entries are
    /// only logged and an empty report comes back.
    pub fn flush(&mut self) -> ScanReport {
        let entries = std::mem::take(&mut self.entries);
        if entries.is_empty() {
            return ScanReport::default();
        }
        log::warn!("{} plugin(s) reported problems during the last scan:", entries.len());
        for entry in &entries {
            log::warn!("  {}", entry);
        }
        if self.dialog_enabled {
            ScanReport { entries }
        } else {
            ScanReport::default()
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
