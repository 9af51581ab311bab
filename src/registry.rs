//! Live issue computers and their reconciliation.
//!
//! Per logical issue the registry moves through absent, tracked,
//! tracked-replaced and retired. A retirement is remembered by revision, so
//! a computer produced from an edit at or before it can never bring the
//! issue back; only a detection on a later edit can.

use crate::conditions::{CheckOutcome, CorrectResult, IssueComputer, IssueKey, Revision};
use crate::snapshot::DocumentKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Receiver of registry changes, typically a presentation layer.
pub trait NotificationSink: Send + Sync {
    fn on_computers_added(&self, added: &[Arc<dyn IssueComputer>]);

    /// `removed` selects the computers that left the live set.
    fn on_computers_removed(&self, removed: &dyn Fn(&dyn IssueComputer) -> bool);

    fn on_problem_count_changed(&self, count: usize);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn on_computers_added(&self, _added: &[Arc<dyn IssueComputer>]) {}

    fn on_computers_removed(&self, _removed: &dyn Fn(&dyn IssueComputer) -> bool) {}

    fn on_problem_count_changed(&self, _count: usize) {}
}

/// Reports changes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn on_computers_added(&self, added: &[Arc<dyn IssueComputer>]) {
        for computer in added {
            tracing::info!(key = %computer.key(), revision = computer.revision(), "issue tracked");
        }
    }

    fn on_computers_removed(&self, _removed: &dyn Fn(&dyn IssueComputer) -> bool) {
        tracing::info!("issues removed");
    }

    fn on_problem_count_changed(&self, count: usize) {
        tracing::info!(count, "live issue count changed");
    }
}

/// What the registry did with one check outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// A new logical issue is now tracked.
    Added,
    /// The computer superseded a live one produced at `previous`.
    Replaced { previous: Revision },
    /// An equal live computer is at least as recent.
    Ignored,
    /// The issue was retired at `retired_at`, at or after this computer.
    Rejected { retired_at: Revision },
    /// A correct result retired this many live computers.
    Retired(usize),
}

#[derive(Default)]
struct RegistryState {
    live: Vec<Arc<dyn IssueComputer>>,
    retired: HashMap<IssueKey, Revision>,
}

struct Change {
    added: Vec<Arc<dyn IssueComputer>>,
    removed: Vec<Arc<dyn IssueComputer>>,
    count: usize,
}

/// Process-wide set of live issue computers, safe to share between the
/// tracking pipeline and readers.
pub struct IssueRegistry {
    state: Mutex<RegistryState>,
    sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for IssueRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueRegistry")
            .field("live", &self.len())
            .finish_non_exhaustive()
    }
}

impl IssueRegistry {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            sink,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reconcile(&self, outcome: CheckOutcome) -> Reconciliation {
        match outcome {
            CheckOutcome::Correct(correct) => self.resolve(&correct),
            CheckOutcome::Issue(computer) => self.track(computer),
        }
    }

    /// Retire every live computer `correct` resolves.
    pub fn resolve(&self, correct: &CorrectResult) -> Reconciliation {
        let change = {
            let mut state = self.lock();
            let retired_at = state.retired.entry(correct.key.clone()).or_insert(correct.revision);
            *retired_at = (*retired_at).max(correct.revision);

            let (removed, live): (Vec<_>, Vec<_>) = state
                .live
                .drain(..)
                .partition(|c| c.is_resolved_by(correct));
            state.live = live;
            Change {
                added: Vec::new(),
                removed,
                count: state.live.len(),
            }
        };

        let retired = change.removed.len();
        if retired > 0 {
            tracing::debug!(key = %correct.key, retired, "issue resolved");
            self.notify(change);
        }
        Reconciliation::Retired(retired)
    }

    /// Add a computer, replacing the live computer it updates.
    pub fn track(&self, computer: Arc<dyn IssueComputer>) -> Reconciliation {
        let (result, change) = {
            let mut state = self.lock();

            if let Some(&retired_at) = state.retired.get(computer.key()) {
                if retired_at >= computer.revision() {
                    return Reconciliation::Rejected { retired_at };
                }
            }

            let existing = state.live.iter().position(|c| c.same_issue(computer.as_ref()));
            match existing {
                Some(index) if state.live[index].is_updated_by(computer.as_ref()) => {
                    let previous = std::mem::replace(&mut state.live[index], Arc::clone(&computer));
                    let count = state.live.len();
                    (
                        Reconciliation::Replaced {
                            previous: previous.revision(),
                        },
                        Change {
                            added: vec![computer],
                            removed: vec![previous],
                            count,
                        },
                    )
                }
                Some(_) => return Reconciliation::Ignored,
                None => {
                    state.live.push(Arc::clone(&computer));
                    let count = state.live.len();
                    (
                        Reconciliation::Added,
                        Change {
                            added: vec![computer],
                            removed: Vec::new(),
                            count,
                        },
                    )
                }
            }
        };

        tracing::debug!(?result, "issue computer reconciled");
        self.notify(change);
        result
    }

    fn notify(&self, change: Change) {
        if !change.removed.is_empty() {
            let removed = &change.removed;
            self.sink.on_computers_removed(&|candidate: &dyn IssueComputer| {
                removed
                    .iter()
                    .any(|r| r.key() == candidate.key() && r.revision() == candidate.revision())
            });
        }
        if !change.added.is_empty() {
            self.sink.on_computers_added(&change.added);
        }
        self.sink.on_problem_count_changed(change.count);
    }

    /// Snapshot of the live set.
    pub fn live(&self) -> Vec<Arc<dyn IssueComputer>> {
        self.lock().live.clone()
    }

    /// Live computers that can raise issues in `document`.
    pub fn live_for(&self, document: &DocumentKey) -> Vec<Arc<dyn IssueComputer>> {
        self.lock()
            .live
            .iter()
            .filter(|c| c.applies_to(document))
            .cloned()
            .collect()
    }

    pub fn retired_at(&self, key: &IssueKey) -> Option<Revision> {
        self.lock().retired.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every live computer and retirement.
    pub fn clear(&self) {
        let had_live = {
            let mut state = self.lock();
            let had_live = !state.live.is_empty();
            *state = RegistryState::default();
            had_live
        };
        if had_live {
            self.sink.on_computers_removed(&|_: &dyn IssueComputer| true);
            self.sink.on_problem_count_changed(0);
        }
    }
}
