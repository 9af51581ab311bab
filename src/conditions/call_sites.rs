use super::{
    CheckContext, CheckOutcome, CodeAction, CodeIssue, ConditionKind, Inspected, IssueComputer,
    IssueKey, Revision,
};
use crate::cache::MemoCache;
use crate::edit::TextEdit;
use crate::refactoring::{ChangeSignature, Refactoring};
use crate::snapshot::{DocumentKey, Timestamp};
use crate::ts::{call_arguments, Node};
use crate::workspace::{sites_in, InvocationSite, WorkspaceQuery};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// After a parameter reorder, every call site of the changed method in the
/// workspace must pass its arguments in the new order.
///
/// A call site is stale when its argument list is exactly one that existed
/// before the edit and reordering it would change it. In the edited document
/// "before" is the refactoring's before tree; in every other document it is
/// the version that was current at `since`. Documents created after `since`
/// were written against the new signature.
pub fn check(
    inspected: Inspected<'_>,
    refactoring: &Refactoring,
    change: &ChangeSignature,
    since: Timestamp,
    ctx: &CheckContext,
) -> Result<CheckOutcome, super::CheckError> {
    let mut stale = BTreeMap::new();
    let edited = stale_lists(
        change,
        &sites_in(inspected.document, &change.before, &change.declaration),
        &sites_in(inspected.document, &change.after, &change.declaration),
    );
    if !edited.is_empty() {
        stale.insert(inspected.document.clone(), edited);
    }

    for document in ctx.workspace.documents() {
        if &document == inspected.document {
            continue;
        }
        let earlier = ctx
            .workspace
            .invocations_as_of(&document, &change.declaration, since);
        let current = ctx.workspace.invocations_of(&document, &change.declaration);
        let (earlier, current) = match (earlier, current) {
            (Ok(Some(earlier)), Ok(current)) => (earlier, current),
            (Ok(None), _) => continue,
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(%document, %err, "skipping document while checking call sites");
                continue;
            }
        };
        let lists = stale_lists(change, &earlier, &current);
        if !lists.is_empty() {
            stale.insert(document, lists);
        }
    }

    if stale.is_empty() {
        return Ok(inspected.correct(refactoring, ConditionKind::CallSites));
    }

    tracing::debug!(
        declaration = %change.declaration,
        documents = stale.len(),
        "call sites not updated after parameter reorder"
    );
    Ok(CheckOutcome::Issue(Arc::new(StaleCallSites {
        key: inspected.key(refactoring, ConditionKind::CallSites),
        revision: inspected.revision,
        change: change.clone(),
        stale,
        workspace: Arc::clone(&ctx.workspace),
        sites: Mutex::new(MemoCache::new(ctx.cache_bytes)),
    })))
}

/// Stripped argument lists of `current` sites still written as in `earlier`.
fn stale_lists(
    change: &ChangeSignature,
    earlier: &[InvocationSite],
    current: &[InvocationSite],
) -> Vec<String> {
    let earlier: Vec<String> = earlier.iter().map(InvocationSite::stripped_arguments).collect();
    current
        .iter()
        .filter(|site| earlier.contains(&site.stripped_arguments()))
        .filter(|site| {
            change
                .reorder(&site.arguments)
                .is_some_and(|reordered| reordered != site.arguments)
        })
        .map(InvocationSite::stripped_arguments)
        .collect()
}

pub struct StaleCallSites {
    key: IssueKey,
    revision: Revision,
    change: ChangeSignature,
    /// Stripped argument lists of stale calls, per document.
    stale: BTreeMap<DocumentKey, Vec<String>>,
    workspace: Arc<dyn WorkspaceQuery>,
    sites: Mutex<MemoCache<DocumentKey, Arc<Vec<InvocationSite>>>>,
}

impl fmt::Debug for StaleCallSites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaleCallSites")
            .field("key", &self.key)
            .field("revision", &self.revision)
            .field("mapping", &self.change.mapping())
            .field("stale", &self.stale)
            .finish_non_exhaustive()
    }
}

impl StaleCallSites {
    fn is_stale(&self, document: &DocumentKey, arguments: &[String], stripped: &str) -> bool {
        let listed = self
            .stale
            .get(document)
            .is_some_and(|lists| lists.iter().any(|list| list == stripped));
        listed
            && self
                .change
                .reorder(arguments)
                .is_some_and(|reordered| reordered != arguments)
    }

    /// Invocation sites of one document, memoized per document identity.
    fn sites_for(&self, document: &DocumentKey) -> Arc<Vec<InvocationSite>> {
        let mut cache = self.sites.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sites) = cache.get(document) {
            return Arc::clone(sites);
        }
        let sites = match self.workspace.invocations_of(document, &self.change.declaration) {
            Ok(sites) => Arc::new(sites),
            Err(err) => {
                tracing::warn!(%document, %err, "skipping document while collecting call sites");
                Arc::new(Vec::new())
            }
        };
        cache.insert(document.clone(), Arc::clone(&sites));
        sites
    }

    fn reorder_edit(&self, site: &InvocationSite) -> Option<TextEdit> {
        let reordered = self.change.reorder(&site.arguments)?;
        Some(TextEdit::new(
            site.arguments_range.start,
            site.arguments_range.end,
            format!("({})", reordered.join(", ")),
            &site.arguments_text,
        ))
    }

    fn fix_everywhere(&self) -> CodeAction {
        let mut action = CodeAction::new(format!(
            "Reorder arguments at every call of `{}`",
            self.change.declaration.qualified_name()
        ));
        for document in self.stale.keys() {
            for site in self.sites_for(document).iter() {
                if !self.is_stale(document, &site.arguments, &site.stripped_arguments()) {
                    continue;
                }
                if let Some(edit) = self.reorder_edit(site) {
                    action = action.edit(document, edit);
                }
            }
        }
        action
    }
}

impl IssueComputer for StaleCallSites {
    fn key(&self) -> &IssueKey {
        &self.key
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn message(&self) -> String {
        format!(
            "{} call(s) to `{}` still use the old parameter order",
            self.stale.values().map(Vec::len).sum::<usize>(),
            self.change.declaration.qualified_name()
        )
    }

    fn applies_to(&self, document: &DocumentKey) -> bool {
        self.stale.contains_key(document)
    }

    fn compute_issues(&self, document: &DocumentKey, node: Node<'_>) -> Vec<CodeIssue> {
        if !self.applies_to(document) || node.kind() != "call_expression" {
            return Vec::new();
        }
        let bound = node
            .tree()
            .resolve_invocation_target(node)
            .is_some_and(|handle| handle.matches(&self.change.declaration));
        if !bound {
            return Vec::new();
        }

        let arguments: Vec<String> = call_arguments(node).iter().map(|a| a.text().to_string()).collect();
        let stripped: Vec<String> = call_arguments(node).iter().map(|a| a.stripped_text()).collect();
        if !self.is_stale(document, &arguments, &stripped.join(",")) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if let (Some(list), Some(reordered)) = (node.child_by_field("arguments"), self.change.reorder(&arguments)) {
            let range = list.byte_range();
            actions.push(
                CodeAction::new("Reorder arguments here").edit(
                    document,
                    TextEdit::new(range.start, range.end, format!("({})", reordered.join(", ")), list.text()),
                ),
            );
        }
        actions.push(self.fix_everywhere());

        vec![CodeIssue {
            key: self.key.clone(),
            document: document.clone(),
            span: node.byte_range(),
            message: format!(
                "call to `{}` passes arguments in the old order",
                self.change.declaration.qualified_name()
            ),
            actions,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactoring::{ChangeSignatureDetector, DetectionSettings, Detector};
    use crate::snapshot::{MemorySnapshotStore, SnapshotProvider};
    use crate::ts::SyntaxTree;
    use crate::workspace::SnapshotWorkspace;

    const BEFORE: &str = r#"
fn transfer(from: u32, to: u32, amount: u64) {}

fn run() {
    transfer(1, 2, 30);
    transfer(3, 4, 50);
}
"#;

    const AFTER: &str = r#"
fn transfer(amount: u64, from: u32, to: u32) {}

fn run() {
    transfer(30, 1, 2);
    transfer(3, 4, 50);
}
"#;

    const MAIN_OLD: &str = "fn main() {\n    transfer(7, 8, 90);\n}\n";
    const MAIN_NEW: &str = "fn main() {\n    transfer(90, 7, 8);\n}\n";

    fn lib() -> DocumentKey {
        DocumentKey::new("bank", "core", "lib.rs")
    }

    fn main_rs() -> DocumentKey {
        DocumentKey::new("bank", "cli", "main.rs")
    }

    struct Fixture {
        store: Arc<MemorySnapshotStore>,
        outcome: CheckOutcome,
    }

    /// `lib.rs` goes from `BEFORE` (t=1) to `after` (t=2); `main.rs` gets the
    /// given versions.
    fn fixture(after: &str, main_versions: &[(&str, u64)]) -> Fixture {
        let store = Arc::new(MemorySnapshotStore::new());
        let before_snapshot = store.create_next_at(&lib(), BEFORE, 1).unwrap();
        let a = store.create_next_at(&lib(), after, 2).unwrap();
        for (text, t) in main_versions {
            store.create_next_at(&main_rs(), text, *t).unwrap();
        }

        let ctx = CheckContext {
            workspace: Arc::new(SnapshotWorkspace::new(store.clone())),
            cache_bytes: 4096,
        };
        let before = Arc::new(SyntaxTree::parse(BEFORE).unwrap());
        let after = Arc::new(SyntaxTree::parse(after).unwrap());
        let found = ChangeSignatureDetector.detect(&before, &after, &DetectionSettings::default());
        let Refactoring::ChangeSignature(change) = &found[0] else {
            panic!("expected change-signature");
        };
        let outcome = check(
            Inspected::new(&a),
            &found[0],
            change,
            before_snapshot.timestamp(),
            &ctx,
        )
        .unwrap();
        Fixture { store, outcome }
    }

    fn updated_lib() -> String {
        AFTER.replace("transfer(3, 4, 50)", "transfer(50, 3, 4)")
    }

    fn latest(store: &MemorySnapshotStore, doc: &DocumentKey) -> String {
        store.latest(doc).unwrap().unwrap().text().to_string()
    }

    #[test]
    fn stale_call_sites_in_every_document() {
        let Fixture { store, outcome } = fixture(AFTER, &[(MAIN_OLD, 1)]);
        let CheckOutcome::Issue(computer) = outcome else {
            panic!("expected an issue");
        };
        assert_eq!(computer.message(), "2 call(s) to `transfer` still use the old parameter order");

        let tree = SyntaxTree::parse(AFTER).unwrap();
        let calls = tree.invocations();
        assert!(computer.compute_issues(&lib(), calls[0]).is_empty());

        let issues = computer.compute_issues(&lib(), calls[1]);
        assert_eq!(issues.len(), 1);
        let here = TextEdit::apply_all(&issues[0].actions[0].edits_for(&lib()), AFTER).unwrap();
        assert!(here.contains("transfer(50, 3, 4);"));

        let everywhere = &issues[0].actions[1];
        assert_eq!(everywhere.edits_for(&lib()).len(), 1);
        let main_text = latest(&store, &main_rs());
        let fixed = TextEdit::apply_all(&everywhere.edits_for(&main_rs()), &main_text).unwrap();
        assert!(fixed.contains("transfer(90, 7, 8);"));
    }

    #[test]
    fn stale_call_in_another_document_is_an_issue() {
        let Fixture { store, outcome } = fixture(&updated_lib(), &[(MAIN_OLD, 1)]);
        let CheckOutcome::Issue(computer) = outcome else {
            panic!("expected an issue");
        };
        assert_eq!(computer.message(), "1 call(s) to `transfer` still use the old parameter order");
        assert!(!computer.applies_to(&lib()));
        assert!(computer.applies_to(&main_rs()));

        let main_text = latest(&store, &main_rs());
        let tree = SyntaxTree::parse(&main_text).unwrap();
        let issues = computer.compute_issues(&main_rs(), tree.invocations()[0]);
        assert_eq!(issues.len(), 1);
        let fixed = TextEdit::apply_all(&issues[0].actions[0].edits_for(&main_rs()), &main_text).unwrap();
        assert!(fixed.contains("transfer(90, 7, 8);"));
    }

    #[test]
    fn updated_call_in_another_document_is_correct() {
        let outcome = fixture(&updated_lib(), &[(MAIN_OLD, 1), (MAIN_NEW, 3)]).outcome;
        assert!(outcome.is_correct());
    }

    #[test]
    fn updated_call_in_another_document_is_left_alone() {
        let Fixture { store, outcome } = fixture(AFTER, &[(MAIN_OLD, 1), (MAIN_NEW, 3)]);
        let CheckOutcome::Issue(computer) = outcome else {
            panic!("expected an issue");
        };
        assert_eq!(computer.message(), "1 call(s) to `transfer` still use the old parameter order");

        let main_text = latest(&store, &main_rs());
        let tree = SyntaxTree::parse(&main_text).unwrap();
        assert!(computer.compute_issues(&main_rs(), tree.invocations()[0]).is_empty());

        let lib_tree = SyntaxTree::parse(AFTER).unwrap();
        let issues = computer.compute_issues(&lib(), lib_tree.invocations()[1]);
        let everywhere = &issues[0].actions[1];
        assert!(everywhere.edits_for(&main_rs()).is_empty());
        assert_eq!(everywhere.edits_for(&lib()).len(), 1);
    }

    #[test]
    fn document_written_after_the_change_is_not_stale() {
        let outcome = fixture(&updated_lib(), &[(MAIN_OLD, 3)]).outcome;
        assert!(outcome.is_correct());
    }

    #[test]
    fn updated_call_sites_are_correct() {
        assert!(fixture(&updated_lib(), &[]).outcome.is_correct());
    }
}
