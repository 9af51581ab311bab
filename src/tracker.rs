//! The tracking pipeline.
//!
//! [`TrackerContext`] owns everything one process needs to mine a file's
//! history: the snapshot provider, the workspace view used by cross-document
//! checks, the configuration and the issue registry. A run searches the
//! history, checks every detected refactoring and reconciles the outcomes
//! into the registry in chronological order.

use crate::conditions::{
    check_all, CheckContext, CheckOutcome, CodeIssue, CorrectResult, IssueComputer, IssueKey,
    IssueSummary,
};
use crate::config::TrackerConfig;
use crate::registry::{IssueRegistry, NotificationSink, Reconciliation};
use crate::search::HistorySearch;
use crate::snapshot::{DocumentKey, SnapshotError, SnapshotProvider};
use crate::ts::{Node, SyntaxTree, TreeSitterError};
use crate::workspace::{SnapshotWorkspace, WorkspaceQuery};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("no snapshot of {0}")]
    NoSnapshot(DocumentKey),

    #[error("failed to parse latest snapshot of {document}: {source}")]
    Parse {
        document: DocumentKey,
        #[source]
        source: TreeSitterError,
    },
}

/// Refactoring found by one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundRefactoring {
    pub kind: crate::refactoring::RefactoringKind,
    pub before: u64,
    pub after: u64,
    pub summary: String,
}

/// What one [`TrackerContext::detect_and_track`] run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackReport {
    pub document: DocumentKey,
    pub refactorings: Vec<FoundRefactoring>,
    /// Computers added or updated by this run that are still live.
    pub live: Vec<IssueSummary>,
    /// Latest correct result per logical issue.
    pub correct: Vec<CorrectResult>,
    /// Computers refused because their issue was already retired.
    pub rejected: usize,
    /// Checks that could not be evaluated.
    pub failed_checks: usize,
    pub comparisons: usize,
    pub skipped: usize,
}

pub struct TrackerContext {
    provider: Arc<dyn SnapshotProvider>,
    workspace: Arc<dyn WorkspaceQuery>,
    config: TrackerConfig,
    registry: IssueRegistry,
}

impl std::fmt::Debug for TrackerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerContext")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl TrackerContext {
    pub fn new(
        provider: Arc<dyn SnapshotProvider>,
        workspace: Arc<dyn WorkspaceQuery>,
        config: TrackerConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            provider,
            workspace,
            config,
            registry: IssueRegistry::new(sink),
        }
    }

    /// Context whose workspace is the latest snapshot of every document in
    /// `provider`.
    pub fn with_snapshot_workspace(
        provider: Arc<dyn SnapshotProvider>,
        config: TrackerConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let workspace = Arc::new(SnapshotWorkspace::new(Arc::clone(&provider)));
        Self::new(provider, workspace, config, sink)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn registry(&self) -> &IssueRegistry {
        &self.registry
    }

    /// Drop every tracked issue and retirement.
    pub fn reset(&self) {
        self.registry.clear();
    }

    /// Search `document`'s history for refactorings, check each one and
    /// reconcile the outcomes into the registry.
    pub fn detect_and_track(&self, document: &DocumentKey) -> Result<TrackReport, TrackError> {
        let detection = self.config.detection();
        let mut search = HistorySearch::new(
            self.provider.as_ref(),
            &self.config.search,
            &detection,
            &self.config.detectors.enabled,
            self.config.cache.max_bytes,
        );
        let comparisons = search.run(document)?;
        let stats = search.stats();

        let ctx = CheckContext {
            workspace: Arc::clone(&self.workspace),
            cache_bytes: self.config.cache.max_bytes,
        };

        let mut refactorings = Vec::new();
        let mut touched: BTreeSet<IssueKey> = BTreeSet::new();
        let mut correct: BTreeMap<IssueKey, CorrectResult> = BTreeMap::new();
        let mut rejected = 0;
        let mut failed_checks = 0;

        for comparison in &comparisons {
            for refactoring in &comparison.refactorings {
                refactorings.push(FoundRefactoring {
                    kind: comparison.kind,
                    before: comparison.before.timestamp(),
                    after: comparison.after.timestamp(),
                    summary: refactoring.summary(),
                });

                for outcome in check_all(&comparison.before, &comparison.after, refactoring, &ctx) {
                    let outcome = match outcome {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            tracing::warn!(
                                %document,
                                after = comparison.after.timestamp(),
                                %err,
                                "condition check failed"
                            );
                            failed_checks += 1;
                            continue;
                        }
                    };

                    let key = outcome.key().clone();
                    if let CheckOutcome::Correct(result) = &outcome {
                        correct.insert(key.clone(), result.clone());
                    }
                    match self.registry.reconcile(outcome) {
                        Reconciliation::Added | Reconciliation::Replaced { .. } => {
                            touched.insert(key);
                        }
                        Reconciliation::Rejected { .. } => rejected += 1,
                        Reconciliation::Ignored | Reconciliation::Retired(_) => {}
                    }
                }
            }
        }

        let mut live: Vec<IssueSummary> = self
            .registry
            .live()
            .iter()
            .filter(|c| touched.contains(c.key()))
            .map(|c| c.summary())
            .collect();
        live.sort_by(|a, b| a.key.cmp(&b.key));

        tracing::info!(
            %document,
            refactorings = refactorings.len(),
            live = live.len(),
            comparisons = stats.comparisons,
            "tracking run finished"
        );

        Ok(TrackReport {
            document: document.clone(),
            refactorings,
            live,
            correct: correct.into_values().collect(),
            rejected,
            failed_checks,
            comparisons: stats.comparisons,
            skipped: stats.skipped,
        })
    }

    pub fn live_issue_computers(&self) -> Vec<Arc<dyn IssueComputer>> {
        self.registry.live()
    }

    /// Issues every live computer raises for `node` of `document`.
    pub fn code_issues_for_node(&self, document: &DocumentKey, node: Node<'_>) -> Vec<CodeIssue> {
        self.registry
            .live_for(document)
            .iter()
            .flat_map(|computer| computer.compute_issues(document, node))
            .collect()
    }

    /// Issues raised anywhere in the latest snapshot of `document`.
    pub fn code_issues_for_document(&self, document: &DocumentKey) -> Result<Vec<CodeIssue>, TrackError> {
        let latest = self
            .provider
            .latest(document)?
            .ok_or_else(|| TrackError::NoSnapshot(document.clone()))?;
        let tree = SyntaxTree::parse(latest.text()).map_err(|source| TrackError::Parse {
            document: document.clone(),
            source,
        })?;

        let computers = self.registry.live_for(document);
        if computers.is_empty() {
            return Ok(Vec::new());
        }
        Ok(tree
            .preorder()
            .flat_map(|node| {
                computers
                    .iter()
                    .flat_map(move |computer| computer.compute_issues(document, node))
            })
            .collect())
    }
}
