use crate::matcher::longest_contiguous_run;
use crate::refactoring::{
    DetectionSettings, Detector, InlineFidelity, Refactoring, RefactoringKind,
};
use crate::ts::{DeclarationHandle, Method, Node, NodeId, SyntaxTree};
use std::sync::Arc;

/// An inline-method occurrence.
#[derive(Debug, Clone)]
pub struct InlineMethod {
    pub before: Arc<SyntaxTree>,
    pub after: Arc<SyntaxTree>,
    /// The method that disappeared (before tree).
    pub removed_method: NodeId,
    pub removed: DeclarationHandle,
    /// Caller in the before tree.
    pub caller_before: NodeId,
    /// Caller in the after tree.
    pub caller_after: NodeId,
    /// First invocation of the removed method inside the caller (before tree).
    pub invocation: NodeId,
    /// Statements of the caller that took the removed body (after tree).
    /// Empty for detections made with [`InlineFidelity::Fast`].
    pub inlined_statements: Vec<NodeId>,
}

impl InlineMethod {
    pub fn removed_method(&self) -> Option<Method<'_>> {
        self.before.method_at(self.before.get(self.removed_method)?)
    }

    pub fn caller(&self) -> Option<Method<'_>> {
        self.after.method_at(self.after.get(self.caller_after)?)
    }

    pub fn inlined_nodes(&self) -> Vec<Node<'_>> {
        self.inlined_statements
            .iter()
            .map(|id| self.after.node(*id))
            .collect()
    }

    pub fn summary(&self) -> String {
        let into = self
            .caller()
            .map(|m| m.handle().qualified_name())
            .unwrap_or_default();
        format!(
            "inlined `{}` into `{into}` ({} statement(s))",
            self.removed.qualified_name(),
            self.inlined_statements.len()
        )
    }
}

/// Class-level phase: pair classes by name, find removed methods, and check
/// every surviving method that used to call one of them.
pub struct InlineMethodDetector;

impl Detector for InlineMethodDetector {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::InlineMethod
    }

    fn detect(
        &self,
        before: &Arc<SyntaxTree>,
        after: &Arc<SyntaxTree>,
        settings: &DetectionSettings,
    ) -> Vec<Refactoring> {
        let after_classes = after.classes();
        let mut found = Vec::new();

        for before_class in before.classes() {
            let Some(after_class) = after_classes.iter().find(|c| c.name == before_class.name)
            else {
                continue;
            };

            let (removed, common): (Vec<Method<'_>>, Vec<Method<'_>>) = before_class
                .methods
                .iter()
                .partition(|m| after_class.method(m.name).is_none());

            for removed_method in &removed {
                for caller_before in &common {
                    let Some(caller_after) = after_class.method(caller_before.name) else {
                        continue;
                    };
                    let Some(invocation) = before
                        .invocations_named(caller_before.node, removed_method.name)
                        .into_iter()
                        .next()
                    else {
                        continue;
                    };

                    if let Some(descriptor) = detect_inlining(
                        before,
                        after,
                        *removed_method,
                        *caller_before,
                        *caller_after,
                        invocation,
                        settings,
                    ) {
                        found.push(Refactoring::InlineMethod(descriptor));
                    }
                }
            }
        }

        found
    }
}

/// In-method phase: match the caller's after-body statements against the
/// removed method's body and require a long enough contiguous run.
pub fn detect_inlining(
    before: &Arc<SyntaxTree>,
    after: &Arc<SyntaxTree>,
    removed: Method<'_>,
    caller_before: Method<'_>,
    caller_after: Method<'_>,
    invocation: Node<'_>,
    settings: &DetectionSettings,
) -> Option<InlineMethod> {
    let inlined_statements = match settings.inline_fidelity {
        InlineFidelity::Fast => Vec::new(),
        InlineFidelity::Structural => {
            let removed_statements: Vec<Node<'_>> = removed
                .body()?
                .descendants()
                .filter(|n| n.is_statement())
                .collect();

            let matched: Vec<Node<'_>> = caller_after
                .body()?
                .descendants()
                .filter(|n| n.is_statement())
                .filter(|n| {
                    removed_statements
                        .iter()
                        .any(|s| settings.matcher.matches(*n, *s))
                })
                .collect();

            let run = longest_contiguous_run(&matched);
            if run.len() <= settings.min_inlined_statements {
                return None;
            }
            run.iter().map(|n| n.id()).collect()
        }
    };

    Some(InlineMethod {
        before: Arc::clone(before),
        after: Arc::clone(after),
        removed_method: removed.node.id(),
        removed: removed.handle(),
        caller_before: caller_before.node.id(),
        caller_after: caller_after.node.id(),
        invocation: invocation.id(),
        inlined_statements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEFORE: &str = r#"
struct Shop { stock: u32 }

impl Shop {
    fn sell(&mut self, n: u32) {
        self.check(n);
        self.stock -= n;
    }

    fn check(&self, n: u32) {
        let available = self.stock;
        assert!(available >= n);
    }
}
"#;

    const AFTER: &str = r#"
struct Shop { stock: u32 }

impl Shop {
    fn sell(&mut self, n: u32) {
        let available = self.stock;
        assert!(available >= n);
        self.stock -= n;
    }
}
"#;

    fn trees(before: &str, after: &str) -> (Arc<SyntaxTree>, Arc<SyntaxTree>) {
        (
            Arc::new(SyntaxTree::parse(before).unwrap()),
            Arc::new(SyntaxTree::parse(after).unwrap()),
        )
    }

    #[test]
    fn detects_inlined_method() {
        let (before, after) = trees(BEFORE, AFTER);
        let found = InlineMethodDetector.detect(&before, &after, &DetectionSettings::default());
        assert_eq!(found.len(), 1);

        let Refactoring::InlineMethod(inline) = &found[0] else {
            panic!("expected inline-method");
        };
        assert_eq!(inline.removed.qualified_name(), "Shop::check");
        assert_eq!(inline.caller().unwrap().name, "sell");
        assert_eq!(inline.inlined_statements.len(), 2);
        assert_eq!(before.node(inline.invocation).text(), "self.check(n)");
    }

    #[test]
    fn single_statement_run_is_below_minimum() {
        let after = AFTER.replace("        assert!(available >= n);\n", "");
        let (before, after) = trees(BEFORE, &after);
        assert!(!InlineMethodDetector.has_refactoring(&before, &after, &DetectionSettings::default()));
    }

    #[test]
    fn fast_fidelity_skips_structural_proof() {
        let after = "struct Shop { stock: u32 }\n\nimpl Shop {\n    fn sell(&mut self, n: u32) {\n        self.stock -= n;\n    }\n}\n";
        let (before, after) = trees(BEFORE, after);
        let settings = DetectionSettings {
            inline_fidelity: InlineFidelity::Fast,
            ..DetectionSettings::default()
        };
        let found = InlineMethodDetector.detect(&before, &after, &settings);
        assert_eq!(found.len(), 1);
        assert!(!InlineMethodDetector.has_refactoring(&before, &after, &DetectionSettings::default()));
    }

    #[test]
    fn removed_method_without_callers_is_not_inlined() {
        let before = "fn a() {\n    let x = 1;\n    let y = 2;\n}\n\nfn b() {\n    let x = 1;\n    let y = 2;\n}\n";
        let after = "fn a() {\n    let x = 1;\n    let y = 2;\n}\n";
        let (before, after) = trees(before, after);
        assert!(InlineMethodDetector
            .detect(&before, &after, &DetectionSettings::default())
            .is_empty());
    }
}
