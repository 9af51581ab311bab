//! Bounded history search.
//!
//! From a head snapshot the search walks back at most `look_back_limit`
//! snapshots, comparing each earlier snapshot against the head with every
//! configured detector. The first step where anything fires ends the walk.
//! Each detector that fired there then re-compares the same baseline against
//! every snapshot between the baseline and the head, oldest first, so a
//! refactoring applied piecemeal is checked at each of its steps.

use crate::cache::MemoCache;
use crate::refactoring::{detector, DetectionSettings, Refactoring, RefactoringKind};
use crate::snapshot::{ancestor, DocumentKey, Snapshot, SnapshotError, SnapshotId, SnapshotProvider};
use crate::ts::SyntaxTree;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_LOOK_BACK_LIMIT: usize = 30;
pub const DEFAULT_SEARCH_DEPTH: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    pub look_back_limit: usize,
    pub search_depth: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            look_back_limit: DEFAULT_LOOK_BACK_LIMIT,
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }
}

/// Refactorings one detector found between two snapshots.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub before: Snapshot,
    pub after: Snapshot,
    pub kind: RefactoringKind,
    pub refactorings: Vec<Refactoring>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Snapshot pairs handed to detectors.
    pub comparisons: usize,
    /// Snapshots skipped because they did not parse.
    pub skipped: usize,
    /// Tree cache hits.
    pub cache_hits: usize,
}

/// One search pass over one document's chain.
///
/// Parsed trees are memoized for the lifetime of the pass.
pub struct HistorySearch<'a> {
    provider: &'a dyn SnapshotProvider,
    settings: &'a SearchSettings,
    detection: &'a DetectionSettings,
    detectors: &'a [RefactoringKind],
    trees: MemoCache<SnapshotId, Arc<SyntaxTree>>,
    unparsable: HashSet<SnapshotId>,
    stats: SearchStats,
}

impl<'a> HistorySearch<'a> {
    pub fn new(
        provider: &'a dyn SnapshotProvider,
        settings: &'a SearchSettings,
        detection: &'a DetectionSettings,
        detectors: &'a [RefactoringKind],
        cache_bytes: usize,
    ) -> Self {
        Self {
            provider,
            settings,
            detection,
            detectors,
            trees: MemoCache::new(cache_bytes),
            unparsable: HashSet::new(),
            stats: SearchStats::default(),
        }
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Run the search for `key`. Comparisons come back ordered by the
    /// after-snapshot's timestamp.
    pub fn run(&mut self, key: &DocumentKey) -> Result<Vec<Comparison>, SnapshotError> {
        let latest = self
            .provider
            .latest(key)?
            .ok_or_else(|| SnapshotError::UnknownDocument(key.clone()))?;

        let mut found = Vec::new();
        for depth in 0..self.settings.search_depth {
            let head = match ancestor(self.provider, &latest, depth) {
                Ok(Some(head)) => head,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%key, depth, %err, "cannot reach search head");
                    break;
                }
            };
            self.search_from(&head, &mut found);
        }

        found.sort_by_key(|c| c.after.timestamp());
        Ok(found)
    }

    fn search_from(&mut self, head: &Snapshot, found: &mut Vec<Comparison>) {
        let Some(head_tree) = self.tree(head) else {
            return;
        };

        let mut walked: Vec<Snapshot> = Vec::new();
        let mut cursor = head.clone();
        for step in 0..self.settings.look_back_limit {
            let baseline = match self.provider.previous(&cursor) {
                Ok(Some(previous)) => previous,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(key = %head.key(), step, %err, "history walk interrupted");
                    break;
                }
            };
            cursor = baseline.clone();
            walked.push(baseline.clone());

            let Some(before_tree) = self.tree(&baseline) else {
                continue;
            };

            self.stats.comparisons += 1;
            let firing: Vec<(RefactoringKind, Vec<Refactoring>)> = self
                .detectors
                .iter()
                .filter_map(|kind| {
                    let refactorings = detector(*kind).detect(&before_tree, &head_tree, self.detection);
                    (!refactorings.is_empty()).then_some((*kind, refactorings))
                })
                .collect();
            if firing.is_empty() {
                continue;
            }

            tracing::debug!(
                key = %head.key(),
                step,
                baseline = baseline.timestamp(),
                head = head.timestamp(),
                detectors = firing.len(),
                "refactoring found"
            );

            // Everything strictly between the baseline and the head, oldest first.
            let between: Vec<Snapshot> = walked[..walked.len() - 1].iter().rev().cloned().collect();
            for (kind, at_head) in firing {
                self.propagate(kind, &baseline, &before_tree, &between, found);
                found.push(Comparison {
                    before: baseline.clone(),
                    after: head.clone(),
                    kind,
                    refactorings: at_head,
                });
            }
            break;
        }
    }

    fn propagate(
        &mut self,
        kind: RefactoringKind,
        baseline: &Snapshot,
        before_tree: &Arc<SyntaxTree>,
        between: &[Snapshot],
        found: &mut Vec<Comparison>,
    ) {
        for snapshot in between {
            let Some(after_tree) = self.tree(snapshot) else {
                continue;
            };
            self.stats.comparisons += 1;
            let refactorings = detector(kind).detect(before_tree, &after_tree, self.detection);
            if !refactorings.is_empty() {
                found.push(Comparison {
                    before: baseline.clone(),
                    after: snapshot.clone(),
                    kind,
                    refactorings,
                });
            }
        }
    }

    fn tree(&mut self, snapshot: &Snapshot) -> Option<Arc<SyntaxTree>> {
        if self.unparsable.contains(&snapshot.id()) {
            return None;
        }
        if self.trees.contains(&snapshot.id()) {
            self.stats.cache_hits += 1;
        }
        let parsed = self
            .trees
            .try_get_or_insert_with(snapshot.id(), || SyntaxTree::parse(snapshot.text()).map(Arc::new));
        match parsed {
            Ok(tree) => Some(tree),
            Err(err) => {
                tracing::warn!(
                    key = %snapshot.key(),
                    timestamp = snapshot.timestamp(),
                    %err,
                    "skipping unparsable snapshot"
                );
                self.stats.skipped += 1;
                self.unparsable.insert(snapshot.id());
                None
            }
        }
    }
}
