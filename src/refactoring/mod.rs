//! Structural refactoring detectors.
//!
//! Each detector is a pure function of a (before, after) tree pair that
//! returns zero or more immutable [`Refactoring`] descriptors. No state
//! survives between calls, so a detector can be reused for any number of
//! comparisons.

pub mod change_signature;
pub mod extract_method;
pub mod inline_method;
pub mod rename;

pub use change_signature::{ChangeSignature, ChangeSignatureDetector};
pub use extract_method::{ExtractMethod, ExtractMethodDetector, ExtractedRegion};
pub use inline_method::{InlineMethod, InlineMethodDetector};
pub use rename::{Rename, RenameDetector};

use crate::matcher::NodeMatcher;
use crate::ts::SyntaxTree;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefactoringKind {
    ExtractMethod,
    InlineMethod,
    Rename,
    ChangeSignature,
}

const KIND_NAMES: &[(RefactoringKind, &str)] = &[
    (RefactoringKind::ExtractMethod, "extract-method"),
    (RefactoringKind::InlineMethod, "inline-method"),
    (RefactoringKind::Rename, "rename"),
    (RefactoringKind::ChangeSignature, "change-signature"),
];

impl RefactoringKind {
    pub const ALL: [RefactoringKind; 4] = [
        RefactoringKind::ExtractMethod,
        RefactoringKind::InlineMethod,
        RefactoringKind::Rename,
        RefactoringKind::ChangeSignature,
    ];

    pub fn as_str(self) -> &'static str {
        KIND_NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("unknown", |(_, name)| name)
    }

    pub fn parse(s: &str) -> Option<Self> {
        KIND_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(kind, _)| *kind)
    }
}

impl fmt::Display for RefactoringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether inline detection proves the inlining structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InlineFidelity {
    /// Require a run of the removed method's statements in the caller.
    #[default]
    Structural,
    /// Report whenever a removed method was invoked by a surviving caller.
    Fast,
}

/// Tunables shared by all detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionSettings {
    pub matcher: NodeMatcher,
    /// The inlined run must be strictly longer than this.
    pub min_inlined_statements: usize,
    pub inline_fidelity: InlineFidelity,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            matcher: NodeMatcher::default(),
            min_inlined_statements: 1,
            inline_fidelity: InlineFidelity::default(),
        }
    }
}

/// A detected refactoring occurrence.
#[derive(Debug, Clone)]
pub enum Refactoring {
    ExtractMethod(ExtractMethod),
    InlineMethod(InlineMethod),
    Rename(Rename),
    ChangeSignature(ChangeSignature),
}

impl Refactoring {
    pub fn kind(&self) -> RefactoringKind {
        match self {
            Refactoring::ExtractMethod(_) => RefactoringKind::ExtractMethod,
            Refactoring::InlineMethod(_) => RefactoringKind::InlineMethod,
            Refactoring::Rename(_) => RefactoringKind::Rename,
            Refactoring::ChangeSignature(_) => RefactoringKind::ChangeSignature,
        }
    }

    pub fn before(&self) -> &Arc<SyntaxTree> {
        match self {
            Refactoring::ExtractMethod(r) => &r.before,
            Refactoring::InlineMethod(r) => &r.before,
            Refactoring::Rename(r) => &r.before,
            Refactoring::ChangeSignature(r) => &r.before,
        }
    }

    pub fn after(&self) -> &Arc<SyntaxTree> {
        match self {
            Refactoring::ExtractMethod(r) => &r.after,
            Refactoring::InlineMethod(r) => &r.after,
            Refactoring::Rename(r) => &r.after,
            Refactoring::ChangeSignature(r) => &r.after,
        }
    }

    /// Name of the declaration the refactoring is about; part of the logical
    /// identity of any issue it raises.
    pub fn declaration(&self) -> String {
        match self {
            Refactoring::ExtractMethod(r) => r.extracted.qualified_name(),
            Refactoring::InlineMethod(r) => r.removed.qualified_name(),
            Refactoring::Rename(r) => r.old_name.clone(),
            Refactoring::ChangeSignature(r) => r.declaration.qualified_name(),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Refactoring::ExtractMethod(r) => r.summary(),
            Refactoring::InlineMethod(r) => r.summary(),
            Refactoring::Rename(r) => r.summary(),
            Refactoring::ChangeSignature(r) => r.summary(),
        }
    }
}

pub trait Detector: Sync {
    fn kind(&self) -> RefactoringKind;

    fn detect(
        &self,
        before: &Arc<SyntaxTree>,
        after: &Arc<SyntaxTree>,
        settings: &DetectionSettings,
    ) -> Vec<Refactoring>;

    fn has_refactoring(
        &self,
        before: &Arc<SyntaxTree>,
        after: &Arc<SyntaxTree>,
        settings: &DetectionSettings,
    ) -> bool {
        !self.detect(before, after, settings).is_empty()
    }
}

static EXTRACT_METHOD: ExtractMethodDetector = ExtractMethodDetector;
static INLINE_METHOD: InlineMethodDetector = InlineMethodDetector;
static RENAME: RenameDetector = RenameDetector;
static CHANGE_SIGNATURE: ChangeSignatureDetector = ChangeSignatureDetector;

/// Detector dispatch table.
pub fn detector(kind: RefactoringKind) -> &'static dyn Detector {
    match kind {
        RefactoringKind::ExtractMethod => &EXTRACT_METHOD,
        RefactoringKind::InlineMethod => &INLINE_METHOD,
        RefactoringKind::Rename => &RENAME,
        RefactoringKind::ChangeSignature => &CHANGE_SIGNATURE,
    }
}
