use crate::matcher::{longest_contiguous_run, NodeMatcher};
use crate::refactoring::{DetectionSettings, Detector, Refactoring, RefactoringKind};
use crate::ts::{DeclarationHandle, Method, Node, NodeId, SyntaxTree};
use std::sync::Arc;

/// Code of the original method that moved into the extracted method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedRegion {
    /// Sibling-adjacent statements of one block, in order.
    Statements(Vec<NodeId>),
    /// A single expression.
    Expression(NodeId),
}

/// An extract-method occurrence.
#[derive(Debug, Clone)]
pub struct ExtractMethod {
    pub before: Arc<SyntaxTree>,
    pub after: Arc<SyntaxTree>,
    /// Method the code was extracted from (before tree).
    pub original_method: NodeId,
    /// The new method (after tree).
    pub extracted_method: NodeId,
    pub extracted: DeclarationHandle,
    /// First invocation of the new method (after tree).
    pub call_site: NodeId,
    /// Extracted code (before tree).
    pub region: ExtractedRegion,
}

impl ExtractMethod {
    pub fn original(&self) -> Option<Method<'_>> {
        self.before.method_at(self.before.get(self.original_method)?)
    }

    pub fn extracted_method(&self) -> Option<Method<'_>> {
        self.after.method_at(self.after.get(self.extracted_method)?)
    }

    pub fn call_site(&self) -> Node<'_> {
        self.after.node(self.call_site)
    }

    /// Region nodes in the before tree.
    pub fn region_nodes(&self) -> Vec<Node<'_>> {
        match &self.region {
            ExtractedRegion::Statements(ids) => ids.iter().map(|id| self.before.node(*id)).collect(),
            ExtractedRegion::Expression(id) => vec![self.before.node(*id)],
        }
    }

    /// Byte span covered by the region in the before tree.
    pub fn region_span(&self) -> std::ops::Range<usize> {
        let nodes = self.region_nodes();
        let start = nodes.first().map_or(0, |n| n.byte_range().start);
        let end = nodes.last().map_or(0, |n| n.byte_range().end);
        start..end
    }

    pub fn summary(&self) -> String {
        let what = match &self.region {
            ExtractedRegion::Statements(ids) => format!("{} statement(s)", ids.len()),
            ExtractedRegion::Expression(_) => "an expression".to_string(),
        };
        let from = self
            .original()
            .map(|m| m.handle().qualified_name())
            .unwrap_or_default();
        format!(
            "extracted {what} from `{from}` into `{}`",
            self.extracted.qualified_name()
        )
    }
}

/// Finds methods that appeared in the after tree and were called from a
/// method that existed before, then proves the extraction structurally.
pub struct ExtractMethodDetector;

impl Detector for ExtractMethodDetector {
    fn kind(&self) -> RefactoringKind {
        RefactoringKind::ExtractMethod
    }

    fn detect(
        &self,
        before: &Arc<SyntaxTree>,
        after: &Arc<SyntaxTree>,
        settings: &DetectionSettings,
    ) -> Vec<Refactoring> {
        let after_methods = after.methods();
        let mut found = Vec::new();

        for extracted in &after_methods {
            if before.find_method(extracted.owner, extracted.name).is_some() {
                continue;
            }

            let caller = after_methods.iter().find_map(|candidate| {
                if candidate.node == extracted.node {
                    return None;
                }
                let original = before.find_method(candidate.owner, candidate.name)?;
                let call = after
                    .invocations_named(candidate.node, extracted.name)
                    .into_iter()
                    .next()?;
                Some((original, call))
            });

            let Some((original, call_site)) = caller else {
                continue;
            };
            if let Some(descriptor) =
                detect_extraction(before, after, original, *extracted, call_site, &settings.matcher)
            {
                found.push(Refactoring::ExtractMethod(descriptor));
            }
        }

        found
    }
}

/// In-method phase: prove that `extracted` holds code taken from `original`.
///
/// Descendants of the original body are classified into statement matches and
/// expression matches against the extracted body. Statement matches win: the
/// longest contiguous run becomes the region. Otherwise the longest matching
/// expression does.
pub fn detect_extraction(
    before: &Arc<SyntaxTree>,
    after: &Arc<SyntaxTree>,
    original: Method<'_>,
    extracted: Method<'_>,
    call_site: Node<'_>,
    matcher: &NodeMatcher,
) -> Option<ExtractMethod> {
    let original_body = original.body()?;
    let extracted_body = extracted.body()?;

    let extracted_statements: Vec<String> = extracted_body
        .descendants()
        .filter(|n| n.is_statement())
        .map(|n| n.stripped_text())
        .collect();
    let extracted_expressions: Vec<String> = extracted_body
        .descendants()
        .filter(|n| n.is_expression())
        .map(|n| n.stripped_text())
        .collect();

    let mut statement_matches = Vec::new();
    let mut expression_matches = Vec::new();
    for node in original_body.descendants() {
        if node.is_statement() {
            let text = node.stripped_text();
            if extracted_statements.iter().any(|s| matcher.matches_text(&text, s)) {
                statement_matches.push(node);
                continue;
            }
        }
        if node.is_expression() {
            let text = node.stripped_text();
            if extracted_expressions.iter().any(|s| matcher.matches_text(&text, s)) {
                expression_matches.push((node, text.len()));
            }
        }
    }

    let region = if !statement_matches.is_empty() {
        let run = longest_contiguous_run(&statement_matches);
        ExtractedRegion::Statements(run.iter().map(|n| n.id()).collect())
    } else {
        let mut longest: Option<(Node<'_>, usize)> = None;
        for (node, len) in expression_matches {
            match longest {
                Some((_, best)) if len <= best => {}
                _ => longest = Some((node, len)),
            }
        }
        ExtractedRegion::Expression(longest?.0.id())
    };

    Some(ExtractMethod {
        before: Arc::clone(before),
        after: Arc::clone(after),
        original_method: original.node.id(),
        extracted_method: extracted.node.id(),
        extracted: extracted.handle(),
        call_site: call_site.id(),
        region,
    })
}
