use super::{
    CheckError, CheckOutcome, CodeAction, CodeIssue, ConditionKind, Inspected, IssueComputer,
    IssueKey, Revision,
};
use crate::edit::TextEdit;
use crate::refactoring::{InlineMethod, Refactoring};
use crate::snapshot::DocumentKey;
use crate::ts::{call_arguments, callee_name, read_identifiers, DeclarationHandle, Method, Node};
use std::ops::Range;
use std::sync::Arc;

/// An inlined method must not be called anywhere in the edited document.
pub fn check(
    inspected: Inspected<'_>,
    refactoring: &Refactoring,
    inline: &InlineMethod,
) -> Result<CheckOutcome, CheckError> {
    let remaining = inline
        .after
        .invocations_named(inline.after.root(), &inline.removed.name)
        .len();
    if remaining == 0 {
        return Ok(inspected.correct(refactoring, ConditionKind::Invocations));
    }

    let removed = inline
        .removed_method()
        .ok_or(CheckError::MissingNode("removed method"))?;
    Ok(CheckOutcome::Issue(Arc::new(RemainingInvocations {
        key: inspected.key(refactoring, ConditionKind::Invocations),
        revision: inspected.revision,
        removed: inline.removed.clone(),
        body: InlineBody::from_method(removed),
        remaining,
    })))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hole {
    Parameter(usize),
    Receiver,
}

/// Statements of the removed method with the spans that refer to its
/// parameters or its receiver.
#[derive(Debug, Clone, Default)]
struct InlineBody {
    statements: Vec<(String, Vec<(Range<usize>, Hole)>)>,
}

impl InlineBody {
    fn from_method(method: Method<'_>) -> Self {
        let params = method.parameter_names();
        let Some(body) = method.body() else {
            return Self::default();
        };

        let statements = body
            .statements()
            .into_iter()
            .map(|statement| {
                let base = statement.byte_range().start;
                let mut holes: Vec<(Range<usize>, Hole)> = read_identifiers(statement)
                    .into_iter()
                    .filter_map(|ident| {
                        let index = params.iter().position(|p| *p == ident.text())?;
                        Some((relative(ident.byte_range(), base), Hole::Parameter(index)))
                    })
                    .collect();
                holes.extend(
                    statement
                        .descendants()
                        .filter(|n| n.kind() == "self")
                        .map(|n| (relative(n.byte_range(), base), Hole::Receiver)),
                );
                holes.sort_by_key(|(range, _)| range.start);
                (statement.text().to_string(), holes)
            })
            .collect();
        Self { statements }
    }

    /// Body statements with arguments substituted for parameters, or `None`
    /// when the call does not supply every argument.
    fn instantiate(&self, arguments: &[&str], receiver: &str) -> Option<Vec<String>> {
        self.statements
            .iter()
            .map(|(text, holes)| {
                let mut out = String::with_capacity(text.len());
                let mut cursor = 0;
                for (range, hole) in holes {
                    out.push_str(&text[cursor..range.start]);
                    match hole {
                        Hole::Parameter(i) => out.push_str(arguments.get(*i)?),
                        Hole::Receiver => out.push_str(receiver),
                    }
                    cursor = range.end;
                }
                out.push_str(&text[cursor..]);
                Some(out)
            })
            .collect()
    }
}

fn relative(range: Range<usize>, base: usize) -> Range<usize> {
    range.start - base..range.end - base
}

#[derive(Debug)]
pub struct RemainingInvocations {
    key: IssueKey,
    revision: Revision,
    removed: DeclarationHandle,
    body: InlineBody,
    remaining: usize,
}

impl RemainingInvocations {
    fn inline_action(&self, document: &DocumentKey, call: Node<'_>) -> Option<CodeAction> {
        let statement = call.parent().filter(|p| p.kind() == "expression_statement")?;
        let receiver = match call.child_by_field("function") {
            Some(callee) if callee.kind() == "field_expression" => callee.child_by_field("value")?.text(),
            _ => "self",
        };
        let arguments: Vec<&str> = call_arguments(call).iter().map(|a| a.text()).collect();
        let statements = self.body.instantiate(&arguments, receiver)?;
        if statements.is_empty() {
            return None;
        }

        let line_start = call.tree().source()[..statement.byte_range().start]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        let indent: String = call.tree().source()[line_start..statement.byte_range().start]
            .chars()
            .take_while(|c| c.is_whitespace())
            .collect();

        Some(
            CodeAction::new(format!("Inline `{}` here", self.removed.qualified_name())).edit(
                document,
                TextEdit::new(
                    statement.byte_range().start,
                    statement.byte_range().end,
                    statements.join(&format!("\n{indent}")),
                    statement.text(),
                ),
            ),
        )
    }
}

impl IssueComputer for RemainingInvocations {
    fn key(&self) -> &IssueKey {
        &self.key
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn message(&self) -> String {
        format!(
            "`{}` was inlined but is still called {} time(s)",
            self.removed.qualified_name(),
            self.remaining
        )
    }

    fn compute_issues(&self, document: &DocumentKey, node: Node<'_>) -> Vec<CodeIssue> {
        if !self.applies_to(document)
            || node.kind() != "call_expression"
            || callee_name(node) != Some(self.removed.name.as_str())
        {
            return Vec::new();
        }

        vec![CodeIssue {
            key: self.key.clone(),
            document: document.clone(),
            span: node.byte_range(),
            message: format!("call to inlined method `{}`", self.removed.qualified_name()),
            actions: self.inline_action(document, node).into_iter().collect(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactoring::{DetectionSettings, Detector, InlineMethodDetector};
    use crate::snapshot::MemorySnapshotStore;
    use crate::ts::SyntaxTree;

    const BEFORE: &str = r#"
struct Shop { stock: u32 }

impl Shop {
    fn sell(&mut self, n: u32) {
        self.check(n);
        self.stock -= n;
    }

    fn restock(&mut self, n: u32) {
        self.check(n);
        self.stock += n;
    }

    fn check(&self, n: u32) {
        let available = self.stock;
        assert!(available >= n);
    }
}
"#;

    const HALF_INLINED: &str = r#"
struct Shop { stock: u32 }

impl Shop {
    fn sell(&mut self, n: u32) {
        let available = self.stock;
        assert!(available >= n);
        self.stock -= n;
    }

    fn restock(&mut self, n: u32) {
        self.check(n + 1);
        self.stock += n;
    }
}
"#;

    fn outcome(after: &str) -> CheckOutcome {
        let store = MemorySnapshotStore::new();
        let doc = DocumentKey::new("s", "n", "shop.rs");
        store.create_next_at(&doc, BEFORE, 1).unwrap();
        let a = store.create_next_at(&doc, after, 2).unwrap();

        let before = Arc::new(SyntaxTree::parse(BEFORE).unwrap());
        let after = Arc::new(SyntaxTree::parse(after).unwrap());
        let found = InlineMethodDetector.detect(&before, &after, &DetectionSettings::default());
        let Refactoring::InlineMethod(inline) = &found[0] else {
            panic!("expected inline-method");
        };
        check(Inspected::new(&a), &found[0], inline).unwrap()
    }

    #[test]
    fn remaining_call_is_an_issue_with_inline_fix() {
        let CheckOutcome::Issue(computer) = outcome(HALF_INLINED) else {
            panic!("expected an issue");
        };
        assert_eq!(computer.key().declaration, "Shop::check");

        let doc = DocumentKey::new("s", "n", "shop.rs");
        let tree = SyntaxTree::parse(HALF_INLINED).unwrap();
        let call = tree.invocations()[0];
        let issues = computer.compute_issues(&doc, call);
        assert_eq!(issues.len(), 1);

        let fixed =
            TextEdit::apply_all(&issues[0].actions[0].edits_for(&doc), HALF_INLINED).unwrap();
        assert!(fixed.contains(
            "        let available = self.stock;\n        assert!(available >= n + 1);\n        self.stock += n;"
        ));
    }

    #[test]
    fn fully_inlined_is_correct() {
        let after = HALF_INLINED.replace(
            "        self.check(n + 1);\n",
            "        let available = self.stock;\n        assert!(available >= n + 1);\n",
        );
        assert!(outcome(&after).is_correct());
    }
}
