//! Whitespace-insensitive node comparison.
//!
//! Manual refactorings rarely preserve formatting, so every comparison works
//! on node text with all whitespace removed. `near_match` tolerates small
//! edits (renamed locals, an added `&`) through a scaled Levenshtein distance.

use crate::ts::Node;
use serde::{Deserialize, Serialize};

/// Default scaled-distance threshold for [`near_match`].
pub const DEFAULT_NEAR_MATCH_THRESHOLD: f64 = 0.2;

/// Remove every whitespace character.
pub fn stripped(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Exact comparison of whitespace-stripped renderings.
pub fn exact_match(a: Node<'_>, b: Node<'_>) -> bool {
    a.stripped_text() == b.stripped_text()
}

/// Near-duplicate comparison of whitespace-stripped renderings.
pub fn near_match(a: Node<'_>, b: Node<'_>, threshold: f64) -> bool {
    near_match_text(&a.stripped_text(), &b.stripped_text(), threshold)
}

/// Levenshtein distance scaled by the longer input's char count.
///
/// Two empty inputs have distance 0.
pub fn scaled_distance(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    strsim::levenshtein(a, b) as f64 / longest as f64
}

/// Near-match on already stripped text.
pub fn near_match_text(a: &str, b: &str, threshold: f64) -> bool {
    scaled_distance(a, b) <= threshold
}

/// How statements are compared by the extract and inline detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    #[default]
    Exact,
    Near,
}

/// Comparison strategy bound to its threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeMatcher {
    pub mode: MatchMode,
    pub threshold: f64,
}

impl Default for NodeMatcher {
    fn default() -> Self {
        Self {
            mode: MatchMode::Exact,
            threshold: DEFAULT_NEAR_MATCH_THRESHOLD,
        }
    }
}

impl NodeMatcher {
    pub fn new(mode: MatchMode, threshold: f64) -> Self {
        Self { mode, threshold }
    }

    /// Compare two pre-stripped renderings.
    pub fn matches_text(&self, a: &str, b: &str) -> bool {
        match self.mode {
            MatchMode::Exact => a == b,
            MatchMode::Near => near_match_text(a, b, self.threshold),
        }
    }

    pub fn matches(&self, a: Node<'_>, b: Node<'_>) -> bool {
        match self.mode {
            MatchMode::Exact => exact_match(a, b),
            MatchMode::Near => near_match(a, b, self.threshold),
        }
    }
}

/// Longest run of sibling-adjacent statements among `nodes`.
///
/// Two statements are adjacent when they share a parent block and their
/// statement indices differ by one; nested statements between them do not
/// break a run. Runs are ranked by length, then by where they start in the
/// document, so the first run wins ties. Nodes that are not statements only
/// ever form runs of one.
pub fn longest_contiguous_run<'t>(nodes: &[Node<'t>]) -> Vec<Node<'t>> {
    let mut ordered: Vec<Node<'t>> = nodes.to_vec();
    ordered.sort_by_key(|n| n.id());
    ordered.dedup();

    let mut best: Vec<Node<'t>> = Vec::new();
    for (i, &first) in ordered.iter().enumerate() {
        if ordered[..i].iter().any(|prev| adjacent(*prev, first)) {
            continue;
        }

        let mut run = vec![first];
        let mut last = first;
        while let Some(next) = ordered[i + 1..].iter().find(|n| adjacent(last, **n)) {
            run.push(*next);
            last = *next;
        }
        if run.len() > best.len() {
            best = run;
        }
    }
    best
}

fn adjacent(a: Node<'_>, b: Node<'_>) -> bool {
    match (a.statement_index(), b.statement_index()) {
        (Some(i), Some(j)) => j == i + 1 && a.parent() == b.parent(),
        _ => false,
    }
}
