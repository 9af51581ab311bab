use super::dataflow::{reads_after, written};
use super::{
    CheckError, CheckOutcome, CodeAction, CodeIssue, ConditionKind, Inspected, IssueComputer,
    IssueKey, Revision,
};
use crate::edit::TextEdit;
use crate::refactoring::{ExtractMethod, Refactoring};
use crate::snapshot::DocumentKey;
use crate::ts::{callee_name, DeclarationHandle, Node};
use std::sync::Arc;

/// Values the extracted code produces and the original method still uses
/// afterwards must come back through the extracted method's return value.
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
    let body = original
        .body()
        .ok_or(CheckError::MissingNode("original body"))?;

    let used_after = reads_after(body, extract.region_span().end);
    let required: Vec<String> = written(&extract.region_nodes())
        .into_iter()
        .filter(|name| used_after.contains(name))
        .collect();

    let returned = extracted.return_type().is_some() && !result_discarded(extract.call_site());
    if required.is_empty() || returned {
        return Ok(inspected.correct(refactoring, ConditionKind::ReturnValue));
    }

    Ok(CheckOutcome::Issue(Arc::new(LostReturnValue {
        key: inspected.key(refactoring, ConditionKind::ReturnValue),
        revision: inspected.revision,
        extracted: extract.extracted.clone(),
        required,
    })))
}

/// The call is a statement of its own.
fn result_discarded(call: Node<'_>) -> bool {
    call.parent()
        .is_some_and(|parent| parent.kind() == "expression_statement")
}

#[derive(Debug)]
pub struct LostReturnValue {
    key: IssueKey,
    revision: Revision,
    extracted: DeclarationHandle,
    required: Vec<String>,
}

impl IssueComputer for LostReturnValue {
    fn key(&self) -> &IssueKey {
        &self.key
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn message(&self) -> String {
        format!(
            "`{}` must return `{}` to its caller",
            self.extracted.qualified_name(),
            self.required.join("`, `")
        )
    }

    fn compute_issues(&self, document: &DocumentKey, node: Node<'_>) -> Vec<CodeIssue> {
        if !self.applies_to(document)
            || node.kind() != "call_expression"
            || callee_name(node) != Some(self.extracted.name.as_str())
        {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if let ([name], Some(statement)) = (
            self.required.as_slice(),
            node.parent().filter(|p| p.kind() == "expression_statement"),
        ) {
            actions.push(
                CodeAction::new(format!("Bind the result to `{name}`")).edit(
                    document,
                    TextEdit::new(
                        statement.byte_range().start,
                        statement.byte_range().end,
                        format!("let {name} = {};", node.text()),
                        statement.text(),
                    ),
                ),
            );
        }

        vec![CodeIssue {
            key: self.key.clone(),
            document: document.clone(),
            span: node.byte_range(),
            message: self.message(),
            actions,
        }]
    }
}
