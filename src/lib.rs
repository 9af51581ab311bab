//! refactor-audit: refactoring detection and completeness checking over a
//! file's version history.
//!
//! Every save of a tracked file becomes a [`Snapshot`]. A run walks back
//! through a bounded window of snapshots, looks for the footprint of
//! well-known refactorings (extract method, inline method, rename, change
//! signature) between an earlier snapshot and a later one, and checks
//! whether each refactoring was carried through: parameters passed, values
//! returned, references updated, call sites reordered. Findings are kept as
//! long-lived issue computers in an [`IssueRegistry`] that later edits update
//! or retire.
//!
//! # Architecture
//!
//! Snapshots are parsed with tree-sitter into an owned arena
//! ([`ts::SyntaxTree`]). Detectors are pure functions over two trees.
//! Condition checkers turn a detected refactoring into either a
//! [`CorrectResult`] or an [`IssueComputer`]. [`TrackerContext`] wires the
//! history search, the checkers and the registry together.
//!
//! # Example
//!
//! ```no_run
//! use refactor_audit::{DocumentKey, MemorySnapshotStore, NullSink, TrackerConfig, TrackerContext};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemorySnapshotStore::new());
//! let doc = DocumentKey::new("app", "billing", "report.rs");
//! store.create_next_at(&doc, "fn total() -> u32 { 1 }", 1).unwrap();
//!
//! let ctx = TrackerContext::with_snapshot_workspace(store, TrackerConfig::default(), Arc::new(NullSink));
//! let report = ctx.detect_and_track(&doc).unwrap();
//! for issue in &report.live {
//!     println!("{}: {}", issue.key, issue.message);
//! }
//! ```

pub mod cache;
pub mod conditions;
pub mod config;
pub mod edit;
pub mod matcher;
pub mod pool;
pub mod refactoring;
pub mod registry;
pub mod search;
pub mod snapshot;
pub mod tracker;
pub mod ts;
pub mod workspace;

// Re-exports
pub use cache::{MemoCache, MemoSize};
pub use conditions::{
    CheckOutcome, CodeAction, CodeIssue, ConditionKind, CorrectResult, IssueComputer, IssueKey,
    IssueSummary,
};
pub use config::{ConfigError, TrackerConfig};
pub use edit::{EditError, EditVerification, TextEdit};
pub use matcher::{exact_match, longest_contiguous_run, near_match, MatchMode, NodeMatcher};
pub use refactoring::{detector, DetectionSettings, Detector, Refactoring, RefactoringKind};
pub use registry::{IssueRegistry, LoggingSink, NotificationSink, NullSink, Reconciliation};
pub use search::{HistorySearch, SearchSettings};
pub use snapshot::{DocumentKey, MemorySnapshotStore, Snapshot, SnapshotError, SnapshotProvider};
pub use tracker::{TrackError, TrackReport, TrackerContext};
pub use ts::{SyntaxTree, TreeSitterError};
pub use workspace::{SnapshotWorkspace, WorkspaceQuery};
