use crate::matcher::{MatchMode, NodeMatcher, DEFAULT_NEAR_MATCH_THRESHOLD};
use crate::refactoring::{DetectionSettings, InlineFidelity, RefactoringKind};
use crate::search::SearchSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CACHE_BYTES: usize = 16 * 1024 * 1024;

/// Effective tracker configuration. Every table and field is optional in
/// the TOML source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    pub search: SearchSettings,
    pub matching: MatchingConfig,
    pub cache: CacheConfig,
    pub detectors: DetectorConfig,
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.search.look_back_limit == 0 {
            issues.push(ValidationIssue::MustBePositive {
                field: "search.look_back_limit",
            });
        }
        if self.search.search_depth == 0 {
            issues.push(ValidationIssue::MustBePositive {
                field: "search.search_depth",
            });
        }
        if !(0.0..=1.0).contains(&self.matching.threshold) {
            issues.push(ValidationIssue::OutOfRange {
                field: "matching.threshold",
                message: format!("{} is not within 0.0..=1.0", self.matching.threshold),
            });
        }
        if self.cache.max_bytes == 0 {
            issues.push(ValidationIssue::MustBePositive {
                field: "cache.max_bytes",
            });
        }
        if self.detectors.enabled.is_empty() {
            issues.push(ValidationIssue::NoDetectors);
        }
        for (idx, kind) in self.detectors.enabled.iter().enumerate() {
            if self.detectors.enabled[..idx].contains(kind) {
                issues.push(ValidationIssue::DuplicateDetector(*kind));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn detection(&self) -> DetectionSettings {
        DetectionSettings {
            matcher: NodeMatcher::new(self.matching.mode, self.matching.threshold),
            min_inlined_statements: self.detectors.min_inlined_statements,
            inline_fidelity: self.detectors.inline_fidelity,
        }
    }

    /// Rendering printed by `refactor-audit config`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    pub mode: MatchMode,
    /// Largest scaled edit distance still counted as a near match.
    pub threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::default(),
            threshold: DEFAULT_NEAR_MATCH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Budget of each memo cache, in approximate bytes.
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub enabled: Vec<RefactoringKind>,
    pub min_inlined_statements: usize,
    pub inline_fidelity: InlineFidelity,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let detection = DetectionSettings::default();
        Self {
            enabled: RefactoringKind::ALL.to_vec(),
            min_inlined_statements: detection.min_inlined_statements,
            inline_fidelity: detection.inline_fidelity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MustBePositive { field: &'static str },
    OutOfRange { field: &'static str, message: String },
    NoDetectors,
    DuplicateDetector(RefactoringKind),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MustBePositive { field } => {
                write!(f, "'{field}' must be greater than zero")
            }
            ValidationIssue::OutOfRange { field, message } => {
                write!(f, "'{field}' out of range: {message}")
            }
            ValidationIssue::NoDetectors => write!(f, "'detectors.enabled' is empty"),
            ValidationIssue::DuplicateDetector(kind) => {
                write!(f, "detector '{kind}' is enabled more than once")
            }
        }
    }
}
