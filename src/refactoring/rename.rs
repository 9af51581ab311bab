use crate::refactoring::{DetectionSettings, Detector, Refactoring, RefactoringKind};
use crate::ts::{Node, NodeId, SyntaxTree};
use std::sync::Arc;

/// A single identifier whose spelling changed.
#[derive(Debug, Clone)]
pub struct Rename {
    pub before: Arc<SyntaxTree>,
    pub after: Arc<SyntaxTree>,
    pub before_node: NodeId,
    pub after_node: NodeId,
    pub old_name: String,
    pub new_name: String,
}

impl Rename {
    pub fn renamed_node(&self) -> Node<'_> {
        self.after.node(self.after_node)
    }

    /// Kind of the renamed identifier's parent, e.g. `function_item` or
    /// `let_declaration`.
    pub fn context_kind(&self) -> &'static str {
        self.renamed_node().parent().map_or("source_file", |p| p.kind())
    }

    pub fn summary(&self) -> String {
        format!(
            "renamed `{}` to `{}` ({})",
            self.old_name,
            self.new_name,
            self.context_kind()
        )
    }
}

/// Compares identifier sequences position by position.
///
/// More than one differing position is ambiguous and yields nothing; so does
/// a change in the number of identifiers.
pub struct RenameDetector;

impl Detector for RenameDetector {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::Rename
    }

    fn detect(
        &self,
        before: &Arc<SyntaxTree>,
        after: &Arc<SyntaxTree>,
        _settings: &DetectionSettings,
    ) -> Vec<Refactoring> {
        let old_ids = before.identifiers();
        let new_ids = after.identifiers();
        if old_ids.len() != new_ids.len() {
            return Vec::new();
        }

        let mut differing = old_ids
            .iter()
            .zip(&new_ids)
            .filter(|(old, new)| old.text() != new.text());

        let (Some((old, new)), None) = (differing.next(), differing.next()) else {
            return Vec::new();
        };

        vec![Refactoring::Rename(Rename {
            before: Arc::clone(before),
            after: Arc::clone(after),
            before_node: old.id(),
            after_node: new.id(),
            old_name: old.text().to_string(),
            new_name: new.text().to_string(),
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(before: &str, after: &str) -> Vec<Refactoring> {
        let before = Arc::new(SyntaxTree::parse(before).unwrap());
        let after = Arc::new(SyntaxTree::parse(after).unwrap());
        RenameDetector.detect(&before, &after, &DetectionSettings::default())
    }

    #[test]
    fn single_changed_identifier_is_a_rename() {
        let found = detect(
            "fn area(w: u32) -> u32 { w * w }\nfn main() { area(2); }\n",
            "fn surface(w: u32) -> u32 { w * w }\nfn main() { area(2); }\n",
        );
        assert_eq!(found.len(), 1);

        let Refactoring::Rename(rename) = &found[0] else {
            panic!("expected rename");
        };
        assert_eq!(rename.old_name, "area");
        assert_eq!(rename.new_name, "surface");
        assert_eq!(rename.renamed_node().text(), "surface");
        assert_eq!(rename.context_kind(), "function_item");
    }

    #[test]
    fn changed_node_is_at_the_differing_position() {
        let before = Arc::new(SyntaxTree::parse("fn f() { let a = b + c; }").unwrap());
        let after = Arc::new(SyntaxTree::parse("fn f() { let a = b + d; }").unwrap());
        let found = RenameDetector.detect(&before, &after, &DetectionSettings::default());

        let position = after
            .identifiers()
            .iter()
            .position(|n| n.text() == "d")
            .unwrap();
        let Refactoring::Rename(rename) = &found[0] else {
            panic!("expected rename");
        };
        assert_eq!(after.identifiers()[position].id(), rename.after_node);
    }

    #[test]
    fn two_changed_identifiers_are_ambiguous() {
        let found = detect(
            "fn f() { let a = b + c; }",
            "fn f() { let x = b + y; }",
        );
        assert!(found.is_empty());
    }

    #[test]
    fn different_identifier_counts_are_not_a_rename() {
        let found = detect("fn f() { g(a); }", "fn f() { g(a, b); }");
        assert!(found.is_empty());
    }
}
