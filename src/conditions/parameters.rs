use super::dataflow::{declared_before, reads, Declared};
use super::{
    CheckError, CheckOutcome, CodeAction, CodeIssue, ConditionKind, Inspected, IssueComputer,
    IssueKey, Revision,
};
use crate::edit::TextEdit;
use crate::matcher::stripped;
use crate::refactoring::{ExtractMethod, Refactoring};
use crate::snapshot::DocumentKey;
use crate::ts::{call_arguments, callee_name, DeclarationHandle, Node};
use std::sync::Arc;

/// Every name the extracted code reads from the original method's scope must
/// arrive as a parameter of the extracted method.
pub fn check(
    inspected: Inspected<'_>,
    refactoring: &Refactoring,
    extract: &ExtractMethod,
) -> Result<CheckOutcome, CheckError> {
    let original = extract
        .original()
        .ok_or(CheckError::MissingNode("original method"))?;
    let extracted = extract
        .extracted_method()
        .ok_or(CheckError::MissingNode("extracted method"))?;

    let declared = declared_before(original, extract.region_span().start);
    let received = extracted.parameter_names();
    let missing: Vec<Declared> = reads(&extract.region_nodes())
        .into_iter()
        .filter(|name| !received.contains(&name.as_str()))
        .filter_map(|name| declared.iter().rev().find(|d| d.name == name).cloned())
        .collect();

    if missing.is_empty() {
        return Ok(inspected.correct(refactoring, ConditionKind::Parameters));
    }

    tracing::debug!(
        method = %extract.extracted,
        missing = missing.len(),
        "extracted method lacks parameters"
    );
    Ok(CheckOutcome::Issue(Arc::new(MissingParameters {
        key: inspected.key(refactoring, ConditionKind::Parameters),
        revision: inspected.revision,
        extracted: extract.extracted.clone(),
        missing,
    })))
}

#[derive(Debug)]
pub struct MissingParameters {
    key: IssueKey,
    revision: Revision,
    extracted: DeclarationHandle,
    missing: Vec<Declared>,
}

impl MissingParameters {
    pub fn missing_names(&self) -> Vec<&str> {
        self.missing.iter().map(|d| d.name.as_str()).collect()
    }

    fn declaration_action(&self, document: &DocumentKey, call: Node<'_>, pass: &TextEdit) -> Option<CodeAction> {
        let typed: Vec<String> = self
            .missing
            .iter()
            .map(|d| d.ty.as_ref().map(|ty| format!("{}: {ty}", d.name)))
            .collect::<Option<_>>()?;

        let method = call
            .tree()
            .find_method(self.extracted.owner.as_deref(), &self.extracted.name)?;
        let list = method.node.child_by_field("parameters")?;
        let close = list.byte_range().end.checked_sub(1)?;
        let separator = if list.named_children().next().is_some() { ", " } else { "" };

        Some(
            CodeAction::new(format!(
                "Add parameter(s) `{}` to `{}`",
                typed.join(", "),
                self.extracted.qualified_name()
            ))
            .edit(document, TextEdit::insert(close, format!("{separator}{}", typed.join(", "))))
            .edit(document, pass.clone()),
        )
    }
}

impl IssueComputer for MissingParameters {
    fn key(&self) -> &IssueKey {
        &self.key
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn message(&self) -> String {
        format!(
            "extracted method `{}` does not receive {}",
            self.extracted.qualified_name(),
            quoted(&self.missing_names())
        )
    }

    fn compute_issues(&self, document: &DocumentKey, node: Node<'_>) -> Vec<CodeIssue> {
        if !self.applies_to(document)
            || node.kind() != "call_expression"
            || callee_name(node) != Some(self.extracted.name.as_str())
        {
            return Vec::new();
        }

        let arguments = call_arguments(node);
        let passed: Vec<String> = arguments.iter().map(|a| a.stripped_text()).collect();
        let absent: Vec<&str> = self
            .missing_names()
            .into_iter()
            .filter(|name| !passed.contains(&stripped(name)))
            .collect();
        if absent.is_empty() {
            return Vec::new();
        }
        let Some(close) = node
            .child_by_field("arguments")
            .and_then(|list| list.byte_range().end.checked_sub(1))
        else {
            return Vec::new();
        };

        let separator = if arguments.is_empty() { "" } else { ", " };
        let pass = TextEdit::insert(close, format!("{separator}{}", absent.join(", ")));
        let mut actions = vec![CodeAction::new(format!("Pass {} here", quoted(&absent)))
            .edit(document, pass.clone())];
        if let Some(action) = self.declaration_action(document, node, &pass) {
            actions.push(action);
        }

        vec![CodeIssue {
            key: self.key.clone(),
            document: document.clone(),
            span: node.byte_range(),
            message: format!(
                "call to `{}` does not pass {}",
                self.extracted.qualified_name(),
                quoted(&absent)
            ),
            actions,
        }]
    }
}

fn quoted(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("`{n}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactoring::{DetectionSettings, Detector, ExtractMethodDetector};
    use crate::snapshot::{MemorySnapshotStore, SnapshotProvider};
    use crate::ts::SyntaxTree;

    const BEFORE: &str = r#"
struct Report { rows: Vec<u32> }

impl Report {
    fn render(&self, factor: u32) -> u32 {
        let mut total = 0;
        for row in &self.rows {
            total += row;
        }
        let scaled = total * factor;
        scaled + 1
    }
}
"#;

    const AFTER: &str = r#"
struct Report { rows: Vec<u32> }

impl Report {
    fn render(&self, factor: u32) -> u32 {
        let scaled = self.scaled_total();
        scaled + 1
    }

    fn scaled_total(&self) -> u32 {
        let mut total = 0;
        for row in &self.rows {
            total += row;
        }
        let scaled = total * factor;
        scaled
    }
}
"#;

    fn outcome(before: &str, after: &str) -> CheckOutcome {
        let store = MemorySnapshotStore::new();
        let doc = DocumentKey::new("s", "n", "report.rs");
        let b = store.create_next_at(&doc, before, 1).unwrap();
        let a = store.create_next_at(&doc, after, 2).unwrap();
        assert!(store.has_snapshot(&doc));

        let before_tree = Arc::new(SyntaxTree::parse(b.text()).unwrap());
        let after_tree = Arc::new(SyntaxTree::parse(a.text()).unwrap());
        let found = ExtractMethodDetector.detect(&before_tree, &after_tree, &DetectionSettings::default());
        let Refactoring::ExtractMethod(extract) = &found[0] else {
            panic!("expected extract-method");
        };
        check(Inspected::new(&a), &found[0], extract).unwrap()
    }

    #[test]
    fn missing_parameter_is_reported() {
        let CheckOutcome::Issue(computer) = outcome(BEFORE, AFTER) else {
            panic!("expected an issue");
        };
        assert_eq!(computer.key().condition, ConditionKind::Parameters);
        assert_eq!(computer.key().declaration, "Report::scaled_total");
        assert_eq!(
            computer.message(),
            "extracted method `Report::scaled_total` does not receive `factor`"
        );
    }

    #[test]
    fn issue_offers_argument_and_parameter_fixes() {
        let CheckOutcome::Issue(computer) = outcome(BEFORE, AFTER) else {
            panic!("expected an issue");
        };
        let doc = DocumentKey::new("s", "n", "report.rs");
        let tree = SyntaxTree::parse(AFTER).unwrap();
        let call = tree.invocations()[0];

        let issues = computer.compute_issues(&doc, call);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].actions.len(), 2);

        let fixed = TextEdit::apply_all(&issues[0].actions[1].edits_for(&doc), AFTER).unwrap();
        assert!(fixed.contains("self.scaled_total(factor)"));
        assert!(fixed.contains("fn scaled_total(&self, factor: u32)"));

        let other = DocumentKey::new("s", "n", "other.rs");
        assert!(computer.compute_issues(&other, call).is_empty());
    }

    #[test]
    fn passed_parameter_is_correct() {
        let after = AFTER
            .replace("self.scaled_total()", "self.scaled_total(factor)")
            .replace("fn scaled_total(&self)", "fn scaled_total(&self, factor: u32)");
        assert!(outcome(BEFORE, &after).is_correct());
    }
}
