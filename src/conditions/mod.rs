//! Condition checkers and issue computers.
//!
//! A checker looks at one detected refactoring and decides whether the edit
//! that produced it applied the refactoring completely. The answer is either
//! a [`CorrectResult`] or an [`IssueComputer`]: a long-lived value that the
//! registry tracks across later edits and that renders warnings on demand.

pub mod call_sites;
mod dataflow;
pub mod invocations;
pub mod parameters;
pub mod references;
pub mod return_value;

use crate::edit::TextEdit;
use crate::refactoring::{Refactoring, RefactoringKind};
use crate::snapshot::{DocumentKey, Snapshot, Timestamp};
use crate::ts::Node;
use crate::workspace::{WorkspaceError, WorkspaceQuery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// Timestamp of the after-snapshot a result was computed from.
pub type Revision = Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionKind {
    /// Extracted method receives every value it reads.
    Parameters,
    /// Values produced by the extracted code flow back to the caller.
    ReturnValue,
    /// No reference still uses the old name.
    References,
    /// No invocation of an inlined method is left.
    Invocations,
    /// Every call site follows the new parameter order.
    CallSites,
}

const CONDITION_NAMES: &[(ConditionKind, &str)] = &[
    (ConditionKind::Parameters, "parameters"),
    (ConditionKind::ReturnValue, "return-value"),
    (ConditionKind::References, "references"),
    (ConditionKind::Invocations, "invocations"),
    (ConditionKind::CallSites, "call-sites"),
];

const CONDITIONS_BY_KIND: &[(RefactoringKind, &[ConditionKind])] = &[
    (
        RefactoringKind::ExtractMethod,
        &[ConditionKind::Parameters, ConditionKind::ReturnValue],
    ),
    (RefactoringKind::InlineMethod, &[ConditionKind::Invocations]),
    (RefactoringKind::Rename, &[ConditionKind::References]),
    (RefactoringKind::ChangeSignature, &[ConditionKind::CallSites]),
];

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        CONDITION_NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("unknown", |(_, name)| name)
    }

    pub fn parse(s: &str) -> Option<Self> {
        CONDITION_NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(kind, _)| *kind)
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conditions checked for every refactoring of `kind`.
pub fn conditions_for(kind: RefactoringKind) -> &'static [ConditionKind] {
    CONDITIONS_BY_KIND
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, conditions)| *conditions)
        .unwrap_or(&[])
}

/// Logical identity of an issue: two computers with equal keys describe the
/// same outstanding problem, whichever edit produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IssueKey {
    pub document: DocumentKey,
    pub refactoring: RefactoringKind,
    pub condition: ConditionKind,
    pub declaration: String,
}

impl IssueKey {
    pub fn new(document: &DocumentKey, refactoring: &Refactoring, condition: ConditionKind) -> Self {
        Self {
            document: document.clone(),
            refactoring: refactoring.kind(),
            condition,
            declaration: refactoring.declaration(),
        }
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} `{}`",
            self.document, self.refactoring, self.condition, self.declaration
        )
    }
}

/// An inspected edit that applied its refactoring completely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectResult {
    pub key: IssueKey,
    pub revision: Revision,
    pub summary: String,
}

/// Edit to one document, part of a [`CodeAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEdit {
    pub document: DocumentKey,
    pub edit: TextEdit,
}

/// A titled remediation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAction {
    pub title: String,
    pub edits: Vec<DocumentEdit>,
}

impl CodeAction {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            edits: Vec::new(),
        }
    }

    pub fn edit(mut self, document: &DocumentKey, edit: TextEdit) -> Self {
        self.edits.push(DocumentEdit {
            document: document.clone(),
            edit,
        });
        self
    }

    /// Edits that apply to `document`, in the order they were added.
    pub fn edits_for(&self, document: &DocumentKey) -> Vec<TextEdit> {
        self.edits
            .iter()
            .filter(|e| &e.document == document)
            .map(|e| e.edit.clone())
            .collect()
    }
}

/// A rendered warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeIssue {
    pub key: IssueKey,
    pub document: DocumentKey,
    pub span: Range<usize>,
    pub message: String,
    pub actions: Vec<CodeAction>,
}

/// Serializable view of a live computer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueSummary {
    pub key: IssueKey,
    pub revision: Revision,
    pub message: String,
}

/// A trackable, outstanding warning.
pub trait IssueComputer: fmt::Debug + Send + Sync {
    fn key(&self) -> &IssueKey;

    fn revision(&self) -> Revision;

    /// One-line description of the outstanding problem.
    fn message(&self) -> String;

    /// Issues this computer raises at `node` of `document`.
    fn compute_issues(&self, document: &DocumentKey, node: Node<'_>) -> Vec<CodeIssue>;

    /// Documents this computer can raise issues in.
    fn applies_to(&self, document: &DocumentKey) -> bool {
        &self.key().document == document
    }

    fn same_issue(&self, other: &dyn IssueComputer) -> bool {
        self.key() == other.key()
    }

    /// `other` is a strictly later computer for the same logical issue.
    fn is_updated_by(&self, other: &dyn IssueComputer) -> bool {
        self.same_issue(other) && other.revision() > self.revision()
    }

    /// A strictly later correct result for the same logical issue accounts
    /// for everything this computer reports.
    fn is_resolved_by(&self, correct: &CorrectResult) -> bool {
        self.key() == &correct.key && correct.revision > self.revision()
    }

    fn summary(&self) -> IssueSummary {
        IssueSummary {
            key: self.key().clone(),
            revision: self.revision(),
            message: self.message(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CheckOutcome {
    Correct(CorrectResult),
    Issue(Arc<dyn IssueComputer>),
}

impl CheckOutcome {
    pub fn key(&self) -> &IssueKey {
        match self {
            CheckOutcome::Correct(correct) => &correct.key,
            CheckOutcome::Issue(computer) => computer.key(),
        }
    }

    pub fn revision(&self) -> Revision {
        match self {
            CheckOutcome::Correct(correct) => correct.revision,
            CheckOutcome::Issue(computer) => computer.revision(),
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, CheckOutcome::Correct(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("condition {condition} does not apply to {refactoring}")]
    NotApplicable {
        condition: ConditionKind,
        refactoring: RefactoringKind,
    },

    #[error("descriptor no longer resolves its {0}")]
    MissingNode(&'static str),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Everything a checker may consult besides the snapshots themselves.
#[derive(Clone)]
pub struct CheckContext {
    pub workspace: Arc<dyn WorkspaceQuery>,
    /// Budget of the per-document caches kept by issue computers.
    pub cache_bytes: usize,
}

impl fmt::Debug for CheckContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckContext")
            .field("cache_bytes", &self.cache_bytes)
            .finish_non_exhaustive()
    }
}

/// Facts every checker needs about the edit under inspection.
#[derive(Debug, Clone, Copy)]
pub struct Inspected<'a> {
    pub document: &'a DocumentKey,
    pub revision: Revision,
}

impl<'a> Inspected<'a> {
    pub fn new(after: &'a Snapshot) -> Self {
        Self {
            document: after.key(),
            revision: after.timestamp(),
        }
    }

    pub fn key(&self, refactoring: &Refactoring, condition: ConditionKind) -> IssueKey {
        IssueKey::new(self.document, refactoring, condition)
    }

    pub fn correct(&self, refactoring: &Refactoring, condition: ConditionKind) -> CheckOutcome {
        CheckOutcome::Correct(CorrectResult {
            key: self.key(refactoring, condition),
            revision: self.revision,
            summary: refactoring.summary(),
        })
    }
}

/// Check one condition of `refactoring`, found between `before` and `after`.
pub fn check(
    before: &Snapshot,
    after: &Snapshot,
    refactoring: &Refactoring,
    condition: ConditionKind,
    ctx: &CheckContext,
) -> Result<CheckOutcome, CheckError> {
    debug_assert_eq!(before.key(), after.key());
    let inspected = Inspected::new(after);

    match (condition, refactoring) {
        (ConditionKind::Parameters, Refactoring::ExtractMethod(r)) => {
            parameters::check(inspected, refactoring, r)
        }
        (ConditionKind::ReturnValue, Refactoring::ExtractMethod(r)) => {
            return_value::check(inspected, refactoring, r)
        }
        (ConditionKind::References, Refactoring::Rename(r)) => {
            Ok(references::check(inspected, refactoring, r))
        }
        (ConditionKind::Invocations, Refactoring::InlineMethod(r)) => {
            invocations::check(inspected, refactoring, r)
        }
        (ConditionKind::CallSites, Refactoring::ChangeSignature(r)) => {
            call_sites::check(inspected, refactoring, r, before.timestamp(), ctx)
        }
        _ => Err(CheckError::NotApplicable {
            condition,
            refactoring: refactoring.kind(),
        }),
    }
}

/// Check every condition registered for the refactoring's kind.
pub fn check_all(
    before: &Snapshot,
    after: &Snapshot,
    refactoring: &Refactoring,
    ctx: &CheckContext,
) -> Vec<Result<CheckOutcome, CheckError>> {
    conditions_for(refactoring.kind())
        .iter()
        .map(|condition| check(before, after, refactoring, *condition, ctx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed {
        key: IssueKey,
        revision: Revision,
    }

    impl IssueComputer for Fixed {
        fn key(&self) -> &IssueKey {
            &self.key
        }

        fn revision(&self) -> Revision {
            self.revision
        }

        fn message(&self) -> String {
            "fixed".to_string()
        }

        fn compute_issues(&self, _document: &DocumentKey, _node: Node<'_>) -> Vec<CodeIssue> {
            Vec::new()
        }
    }

    fn key(condition: ConditionKind, declaration: &str) -> IssueKey {
        IssueKey {
            document: DocumentKey::new("s", "n", "f.rs"),
            refactoring: RefactoringKind::ExtractMethod,
            condition,
            declaration: declaration.to_string(),
        }
    }

    #[test]
    fn every_kind_has_conditions() {
        for kind in RefactoringKind::ALL {
            assert!(!conditions_for(kind).is_empty());
        }
        assert_eq!(
            conditions_for(RefactoringKind::ExtractMethod),
            &[ConditionKind::Parameters, ConditionKind::ReturnValue]
        );
        assert_eq!(ConditionKind::parse("call-sites"), Some(ConditionKind::CallSites));
    }

    #[test]
    fn later_computer_updates_earlier() {
        let a = Fixed {
            key: key(ConditionKind::Parameters, "T::f"),
            revision: 5,
        };
        let b = Fixed {
            key: key(ConditionKind::Parameters, "T::f"),
            revision: 9,
        };
        assert!(a.same_issue(&b));
        assert!(a.is_updated_by(&b));
        assert!(!b.is_updated_by(&a));
    }

    #[test]
    fn different_condition_is_a_different_issue() {
        let a = Fixed {
            key: key(ConditionKind::Parameters, "T::f"),
            revision: 5,
        };
        let b = Fixed {
            key: key(ConditionKind::ReturnValue, "T::f"),
            revision: 9,
        };
        assert!(!a.same_issue(&b));
        assert!(!a.is_updated_by(&b));
    }

    #[test]
    fn later_correct_result_resolves() {
        let a = Fixed {
            key: key(ConditionKind::Parameters, "T::f"),
            revision: 5,
        };
        let correct = CorrectResult {
            key: key(ConditionKind::Parameters, "T::f"),
            revision: 7,
            summary: String::new(),
        };
        assert!(a.is_resolved_by(&correct));

        let stale = CorrectResult {
            revision: 5,
            ..correct
        };
        assert!(!a.is_resolved_by(&stale));
    }
}
