use super::{
    CheckOutcome, CodeAction, CodeIssue, ConditionKind, Inspected, IssueComputer, IssueKey,
    Revision,
};
use crate::edit::TextEdit;
use crate::refactoring::{Refactoring, Rename};
use crate::snapshot::DocumentKey;
use crate::ts::{Node, IDENTIFIER_KINDS};
use std::sync::Arc;

/// A rename is complete when no identifier in the edited document still
/// spells the old name.
pub fn check(inspected: Inspected<'_>, refactoring: &Refactoring, rename: &Rename) -> CheckOutcome {
    let leftovers = rename
        .after
        .identifiers()
        .into_iter()
        .filter(|n| n.text() == rename.old_name)
        .count();

    if leftovers == 0 {
        return inspected.correct(refactoring, ConditionKind::References);
    }

    CheckOutcome::Issue(Arc::new(StaleReferences {
        key: inspected.key(refactoring, ConditionKind::References),
        revision: inspected.revision,
        old_name: rename.old_name.clone(),
        new_name: rename.new_name.clone(),
        leftovers,
    }))
}

#[derive(Debug)]
pub struct StaleReferences {
    key: IssueKey,
    revision: Revision,
    old_name: String,
    new_name: String,
    leftovers: usize,
}

impl IssueComputer for StaleReferences {
    fn key(&self) -> &IssueKey {
        &self.key
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn message(&self) -> String {
        format!(
            "`{}` was renamed to `{}` but {} reference(s) still use the old name",
            self.old_name, self.new_name, self.leftovers
        )
    }

    fn compute_issues(&self, document: &DocumentKey, node: Node<'_>) -> Vec<CodeIssue> {
        if !self.applies_to(document)
            || !IDENTIFIER_KINDS.contains(&node.kind())
            || node.text() != self.old_name
        {
            return Vec::new();
        }

        let rename = |n: Node<'_>| {
            let range = n.byte_range();
            TextEdit::new(range.start, range.end, self.new_name.as_str(), n.text())
        };

        let one = CodeAction::new(format!("Rename to `{}`", self.new_name)).edit(document, rename(node));
        let all = node
            .tree()
            .identifiers()
            .into_iter()
            .filter(|n| n.text() == self.old_name)
            .fold(
                CodeAction::new(format!("Rename every `{}` to `{}`", self.old_name, self.new_name)),
                |action, n| action.edit(document, rename(n)),
            );

        vec![CodeIssue {
            key: self.key.clone(),
            document: document.clone(),
            span: node.byte_range(),
            message: format!("`{}` still uses the old name of `{}`", self.old_name, self.new_name),
            actions: vec![one, all],
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactoring::{DetectionSettings, Detector, RenameDetector};
    use crate::snapshot::MemorySnapshotStore;
    use crate::ts::SyntaxTree;

    const BEFORE: &str = "fn area(w: u32) -> u32 { w * w }\nfn main() { area(2); area(3); }\n";

    fn outcome(after: &str) -> CheckOutcome {
        let store = MemorySnapshotStore::new();
        let doc = DocumentKey::new("s", "n", "geo.rs");
        store.create_next_at(&doc, BEFORE, 1).unwrap();
        let a = store.create_next_at(&doc, after, 2).unwrap();

        let before = Arc::new(SyntaxTree::parse(BEFORE).unwrap());
        let after = Arc::new(SyntaxTree::parse(after).unwrap());
        let found = RenameDetector.detect(&before, &after, &DetectionSettings::default());
        let Refactoring::Rename(rename) = &found[0] else {
            panic!("expected rename");
        };
        check(Inspected::new(&a), &found[0], rename)
    }

    #[test]
    fn leftover_references_are_an_issue() {
        let after = BEFORE.replacen("fn area", "fn surface", 1);
        let CheckOutcome::Issue(computer) = outcome(&after) else {
            panic!("expected an issue");
        };
        assert_eq!(computer.key().declaration, "area");

        let doc = DocumentKey::new("s", "n", "geo.rs");
        let tree = SyntaxTree::parse(&after).unwrap();
        let leftover = tree
            .identifiers()
            .into_iter()
            .find(|n| n.text() == "area")
            .unwrap();
        let issues = computer.compute_issues(&doc, leftover);
        assert_eq!(issues.len(), 1);

        let fixed = TextEdit::apply_all(&issues[0].actions[1].edits_for(&doc), &after).unwrap();
        assert_eq!(fixed, BEFORE.replace("area", "surface"));
    }

    #[test]
    fn renaming_the_last_reference_is_correct() {
        let before = "fn f() { let total = 1; g(total); }\n";
        let after = "fn f() { let total = 1; g(sum); }\n";
        let store = MemorySnapshotStore::new();
        let doc = DocumentKey::new("s", "n", "f.rs");
        let a = store.create_next_at(&doc, after, 1).unwrap();

        let before = Arc::new(SyntaxTree::parse(before).unwrap());
        let after = Arc::new(SyntaxTree::parse(after).unwrap());
        let found = RenameDetector.detect(&before, &after, &DetectionSettings::default());
        let Refactoring::Rename(rename) = &found[0] else {
            panic!("expected rename");
        };
        // `total` is still declared, so the rename is incomplete.
        assert!(!check(Inspected::new(&a), &found[0], rename).is_correct());

        let after = Arc::new(SyntaxTree::parse("fn f() { let sum = 1; g(sum); }\n").unwrap());
        let whole = Rename {
            after,
            ..rename.clone()
        };
        let refactoring = Refactoring::Rename(whole.clone());
        assert!(check(Inspected::new(&a), &refactoring, &whole).is_correct());
    }
}
